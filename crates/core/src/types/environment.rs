use serde::{Deserialize, Serialize};

/// Concurrency policy for a named persistent environment, selected at
/// creation time via `POST /v1/environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One checkout at a time; the base directory itself is the workspace
    /// and mutations persist across executions.
    Never,
    /// Copy-on-checkout; many concurrent checkouts; writes are discarded on
    /// release.
    Fork,
    /// Same isolation as `Fork`; named separately because later executions
    /// are guaranteed to never observe a previous execution's writes (the
    /// base is conceptually re-copied fresh every time, whereas `Fork`
    /// leaves room for a faster shared-base optimization).
    Base,
}

impl ConcurrencyMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "never" => Some(ConcurrencyMode::Never),
            "fork" => Some(ConcurrencyMode::Fork),
            "base" => Some(ConcurrencyMode::Base),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::Never => "never",
            ConcurrencyMode::Fork => "fork",
            ConcurrencyMode::Base => "base",
        }
    }

    /// Whether writes made during a checkout are visible to the next
    /// checkout of the same environment.
    pub fn commits_writes(&self) -> bool {
        matches!(self, ConcurrencyMode::Never)
    }
}

/// Metadata recorded for a named environment, echoed back from
/// `POST /v1/environment` and consulted by the dispatcher on each execution
/// that names an `environment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    pub concurrency_mode: ConcurrencyMode,
}
