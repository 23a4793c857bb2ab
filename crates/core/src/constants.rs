//! Constants shared across the execution service.

use std::time::Duration;

/// Timeout applied to a command step when the request doesn't specify one.
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Grace period between SIGTERM and SIGKILL when a command overruns its
/// timeout.
pub const TERMINATION_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Shell used to run every command (`sh -c "<command>"`).
pub const COMMAND_SHELL: &str = "sh";

/// Default bound on the number of cached results kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Environment variable carrying the log filter, matching `tracing_subscriber::EnvFilter`.
pub const LOG_FILTER_VAR: &str = "RUST_LOG";
