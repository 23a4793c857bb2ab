//! Registry of named, long-lived execution environments with three
//! checkout concurrency policies.

pub mod manager;

pub use manager::{Checkout, EnvironmentManager};
