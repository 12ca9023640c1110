use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Performance monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Records kept per backend shard
    pub buffer_capacity: usize,
    /// Records older than this are evicted
    pub retention_hours: u64,
    /// Evaluate alert rules synchronously on every ingest
    pub evaluate_on_ingest: bool,
    /// Period of the background evaluation task
    pub evaluation_interval_seconds: u64,
    /// Capacity of the outcome broadcast channel
    pub outcome_channel_capacity: usize,
    /// Records considered "recent" in current stats
    pub recent_window: usize,
    /// Successful latencies per backend used in comparisons
    pub comparison_window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            retention_hours: 24,
            evaluate_on_ingest: true,
            evaluation_interval_seconds: 60,
            outcome_channel_capacity: 1024,
            recent_window: 20,
            comparison_window: 50,
        }
    }
}

impl MonitorConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }
}
