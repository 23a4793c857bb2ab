//! Request/response data model shared by every crate in the service.

mod environment;
mod fingerprint;
mod request;
mod result;
mod stats;

pub use environment::{ConcurrencyMode, EnvironmentSpec};
pub use fingerprint::Fingerprint;
pub use request::{CommandStep, Commands, ExecutionRequest, FilePayload, StdinValue};
pub use result::{EnvironmentInfo, ExecutionId, ExecutionResult, StepOutcome, StoredResult};
pub use stats::{CacheStats, CommandsStats, DurationStats, StatsSnapshot};
