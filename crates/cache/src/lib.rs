//! Request fingerprinting, single-flight result memoization, and
//! execution statistics.

pub mod cache;
pub mod fingerprint;
pub mod stats;

pub use cache::Cache;
pub use fingerprint::compute_fingerprint;
pub use stats::StatsAggregator;
