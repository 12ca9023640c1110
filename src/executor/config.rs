//! SLA and fallback execution settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service-level target for a single backend attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Latency an attempt must meet to count as a qualifying success
    pub target_seconds: f64,
    /// Extra time granted on top of the target before an attempt is cut off
    pub timeout_slack_seconds: f64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            target_seconds: 5.0,
            timeout_slack_seconds: 2.0,
        }
    }
}

impl SlaConfig {
    /// SLA target as a `Duration`.
    pub fn target(&self) -> Duration {
        Duration::try_from_secs_f64(self.target_seconds).unwrap_or(Duration::ZERO)
    }

    /// Hard per-attempt ceiling: target plus slack.
    pub fn attempt_budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.target_seconds + self.timeout_slack_seconds)
            .unwrap_or(Duration::ZERO)
    }
}

/// Fallback executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum backend attempts per request
    pub max_attempts: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
