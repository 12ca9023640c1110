//! Per-backend health state tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// The orchestrator's current belief about a backend's reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Succeeding within its SLA budget
    Healthy,
    /// Succeeding, but slowly or reported sub-par by a probe
    Degraded,
    /// Raised an error or timed out; only an explicit reset or a forced
    /// attempt brings it back
    Failed,
    /// No data yet (treated as eligible)
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Failed => write!(f, "failed"),
            HealthState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Observation that can move a backend between health states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    /// Attempt returned output; `within_sla` is false when it missed the SLA budget
    Success { within_sla: bool },
    /// A health probe answered but reported sub-par condition
    ProbeDegraded,
    /// Attempt exceeded its hard time budget
    Timeout,
    /// Attempt raised an error
    Error,
}

impl HealthState {
    /// Next state after `signal`.
    ///
    /// `forced` marks a last-resort attempt made against a Failed backend;
    /// only such an attempt may lift a backend out of Failed.
    pub fn transition(self, signal: HealthSignal, forced: bool) -> HealthState {
        match (self, signal) {
            (_, HealthSignal::Timeout) | (_, HealthSignal::Error) => HealthState::Failed,

            (HealthState::Failed, HealthSignal::Success { within_sla }) if forced => {
                if within_sla {
                    HealthState::Healthy
                } else {
                    HealthState::Degraded
                }
            }
            (HealthState::Failed, _) => HealthState::Failed,

            (_, HealthSignal::Success { within_sla: true }) => HealthState::Healthy,
            (_, HealthSignal::Success { within_sla: false }) => HealthState::Degraded,

            (HealthState::Healthy, HealthSignal::ProbeDegraded)
            | (HealthState::Unknown, HealthSignal::ProbeDegraded)
            | (HealthState::Degraded, HealthSignal::ProbeDegraded) => HealthState::Degraded,
        }
    }
}

/// Tracks health and attempt history for a single backend.
#[derive(Debug, Clone)]
pub struct BackendHealthState {
    /// Current health state
    pub state: HealthState,
    /// Count of consecutive failed attempts
    pub consecutive_failures: u32,
    /// Lifetime attempts recorded against this backend
    pub total_attempts: u64,
    /// Lifetime successful attempts
    pub successful_attempts: u64,
    /// Most recent successful latencies in seconds (oldest first)
    pub recent_latencies: VecDeque<f64>,
    /// Mean of `recent_latencies`
    pub average_latency_seconds: f64,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// When the last observation was applied
    pub last_updated: Option<DateTime<Utc>>,
    /// When the state last changed
    pub last_transition: Option<DateTime<Utc>>,
}

impl Default for BackendHealthState {
    fn default() -> Self {
        Self {
            state: HealthState::Unknown,
            consecutive_failures: 0,
            total_attempts: 0,
            successful_attempts: 0,
            recent_latencies: VecDeque::new(),
            average_latency_seconds: 0.0,
            last_error: None,
            last_updated: None,
            last_transition: None,
        }
    }
}

impl BackendHealthState {
    /// Apply a signal and return `Some(new_state)` if a transition occurred.
    pub fn apply_signal(&mut self, signal: HealthSignal, forced: bool) -> Option<HealthState> {
        let now = Utc::now();
        let next = self.state.transition(signal, forced);
        self.last_updated = Some(now);

        if next == self.state {
            return None;
        }

        self.state = next;
        self.last_transition = Some(now);
        Some(next)
    }

    /// Count one attempt and fold its latency into the rolling history.
    pub fn record_attempt(
        &mut self,
        signal: HealthSignal,
        latency: Duration,
        error: Option<String>,
        latency_window: usize,
    ) {
        self.total_attempts += 1;

        match signal {
            HealthSignal::Success { .. } => {
                self.successful_attempts += 1;
                self.consecutive_failures = 0;
                self.recent_latencies.push_back(latency.as_secs_f64());
                while self.recent_latencies.len() > latency_window.max(1) {
                    self.recent_latencies.pop_front();
                }
                self.average_latency_seconds = self.recent_latencies.iter().sum::<f64>()
                    / self.recent_latencies.len() as f64;
            }
            HealthSignal::Timeout | HealthSignal::Error => {
                self.consecutive_failures += 1;
                self.last_error = error;
            }
            HealthSignal::ProbeDegraded => {}
        }
    }
}
