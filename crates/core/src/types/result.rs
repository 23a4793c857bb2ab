use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, globally unique identifier assigned to every execution response,
/// cache hit or miss alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        ExecutionId(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step's transcript, as recorded in a chain's `commands[]` and as the
/// source of a single-command response's top-level fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub cmd: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: f64,
    pub timed_out: bool,
    pub required: bool,
}

/// The part of an execution's outcome that is cached verbatim per
/// fingerprint — everything except the per-request `id` and `cached` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: f64,
    pub timed_out: bool,
    /// Present only when the request named `track` patterns and harvesting
    /// produced at least the empty-but-present set; absent means no
    /// harvesting was requested at all.
    pub files: Option<BTreeMap<String, String>>,
    /// Present only when the request's `command` was a chain (array form).
    pub commands: Option<Vec<StepOutcome>>,
}

/// Full response body for `POST /v1/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub id: ExecutionId,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: f64,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<StepOutcome>>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentInfo>,
}

/// Echoes which named environment this execution ran against, and whether
/// its writes are visible to the next checkout of that environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub name: String,
    pub committed: bool,
}

impl ExecutionResult {
    pub fn from_stored(id: ExecutionId, stored: StoredResult, cached: bool) -> Self {
        ExecutionResult {
            id,
            stdout: stored.stdout,
            stderr: stored.stderr,
            exit_code: stored.exit_code,
            duration: stored.duration,
            timed_out: stored.timed_out,
            files: stored.files,
            commands: stored.commands,
            cached,
            environment: None,
        }
    }

    pub fn with_environment(mut self, info: EnvironmentInfo) -> Self {
        self.environment = Some(info);
        self
    }
}
