//! Configuration for health tracking and probing.

use serde::{Deserialize, Serialize};

/// Configuration for backend health tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Whether the background health prober runs
    pub probe_enabled: bool,
    /// Seconds between probe cycles
    pub probe_interval_seconds: u64,
    /// Timeout for each probe call
    pub probe_timeout_seconds: u64,
    /// Number of recent successful latencies kept per backend
    pub latency_window: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_enabled: false,
            probe_interval_seconds: 60,
            probe_timeout_seconds: 5,
            latency_window: 10,
        }
    }
}
