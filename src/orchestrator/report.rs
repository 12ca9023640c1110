//! Operator-facing health report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::{BackendHealthState, HealthState};
use crate::registry::{BackendDescriptor, Tier};

/// Attempt history of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptHistory {
    pub total_attempts: u64,
    pub successful_attempts: u64,
    /// Mean of `recent_latencies`
    pub average_latency_seconds: f64,
    pub recent_latencies: Vec<f64>,
}

/// Health and static description of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealthReport {
    pub id: String,
    pub status: HealthState,
    pub tier: Tier,
    pub priority: i32,
    pub expected_latency_seconds: f64,
    pub capabilities: Vec<String>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub performance: AttemptHistory,
}

impl BackendHealthReport {
    pub(crate) fn new(descriptor: &BackendDescriptor, state: Option<BackendHealthState>) -> Self {
        let state = state.unwrap_or_default();
        Self {
            id: descriptor.id.clone(),
            status: state.state,
            tier: descriptor.tier,
            priority: descriptor.priority,
            expected_latency_seconds: descriptor.expected_latency_seconds,
            capabilities: descriptor.capabilities.iter().cloned().collect(),
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error,
            performance: AttemptHistory {
                total_attempts: state.total_attempts,
                successful_attempts: state.successful_attempts,
                average_latency_seconds: state.average_latency_seconds,
                recent_latencies: state.recent_latencies.into_iter().collect(),
            },
        }
    }
}

/// Backend counts per health state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_backends: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub failed: usize,
    pub unknown: usize,
}

/// Point-in-time health of every registered backend, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub backends: Vec<BackendHealthReport>,
    pub summary: HealthSummary,
}

impl HealthReport {
    pub(crate) fn new(backends: Vec<BackendHealthReport>) -> Self {
        let mut summary = HealthSummary {
            total_backends: backends.len(),
            ..HealthSummary::default()
        };
        for backend in &backends {
            match backend.status {
                HealthState::Healthy => summary.healthy += 1,
                HealthState::Degraded => summary.degraded += 1,
                HealthState::Failed => summary.failed += 1,
                HealthState::Unknown => summary.unknown += 1,
            }
        }

        Self {
            timestamp: Utc::now(),
            backends,
            summary,
        }
    }

    /// Report for one backend.
    pub fn backend(&self, id: &str) -> Option<&BackendHealthReport> {
        self.backends.iter().find(|b| b.id == id)
    }
}
