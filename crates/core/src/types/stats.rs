use serde::{Deserialize, Serialize};

/// `duration` statistics over non-cached executions; all fields are `null`
/// when the sample is empty.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DurationStats {
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub stddev: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Snapshot body returned by `GET /v1/stats/execution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ran: u64,
    pub duration: DurationStats,
    pub commands: CommandsStats,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommandsStats {
    pub total: u64,
}
