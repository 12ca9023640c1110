//! Performance report assembled from current stats and backend comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::stats::{BackendPerformance, CurrentStats};

/// Success rate the pipeline is expected to meet.
pub const SUCCESS_TARGET: f64 = 0.95;

/// Share of successful requests expected to finish under the SLA target.
pub const SLA_HIT_TARGET: f64 = 0.9;

/// Fraction of the SLA target at which latency counts as degraded.
const WARNING_FRACTION: f64 = 0.8;

/// A fastest/slowest backend spread above this ratio is worth a note.
const SPREAD_RATIO: f64 = 1.5;

/// Overall condition of the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ReportHealth {
    /// Judge pipeline health from running totals. No traffic reads as healthy.
    pub fn assess(stats: &CurrentStats, sla: Duration) -> Self {
        if stats.total_requests == 0 {
            return ReportHealth::Healthy;
        }
        let sla_seconds = sla.as_secs_f64();
        if stats.success_rate < SUCCESS_TARGET || stats.average_latency_seconds > sla_seconds {
            ReportHealth::Unhealthy
        } else if stats.average_latency_seconds > sla_seconds * WARNING_FRACTION
            || stats.sla_hit_rate < SLA_HIT_TARGET
        {
            ReportHealth::Degraded
        } else {
            ReportHealth::Healthy
        }
    }
}

/// Headline numbers of a performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub meets_sla_target: bool,
    pub meets_success_target: bool,
    pub average_latency_seconds: f64,
    pub success_rate: f64,
    pub sla_hit_rate: f64,
}

/// Point-in-time performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub health_status: ReportHealth,
    pub summary: PerformanceSummary,
    pub stats: CurrentStats,
    pub backends: Vec<BackendPerformance>,
    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    pub fn build(stats: CurrentStats, backends: Vec<BackendPerformance>, sla: Duration) -> Self {
        let health_status = ReportHealth::assess(&stats, sla);
        let summary = PerformanceSummary {
            meets_sla_target: stats.sla_hit_rate >= SLA_HIT_TARGET,
            meets_success_target: stats.success_rate >= SUCCESS_TARGET,
            average_latency_seconds: stats.average_latency_seconds,
            success_rate: stats.success_rate,
            sla_hit_rate: stats.sla_hit_rate,
        };
        let recommendations = recommendations(&stats, &backends, sla);

        Self {
            timestamp: Utc::now(),
            health_status,
            summary,
            stats,
            backends,
            recommendations,
        }
    }
}

fn recommendations(stats: &CurrentStats, backends: &[BackendPerformance], sla: Duration) -> Vec<String> {
    let mut notes = Vec::new();
    let sla_seconds = sla.as_secs_f64();

    if stats.total_requests > 0 {
        if stats.sla_hit_rate < SLA_HIT_TARGET {
            notes.push(format!(
                "CRITICAL: fewer than {:.0}% of requests complete under {:.1}s. \
                 Consider optimizing preprocessing or preferring faster backends.",
                SLA_HIT_TARGET * 100.0,
                sla_seconds
            ));
        }
        if stats.success_rate < SUCCESS_TARGET {
            notes.push(format!(
                "CRITICAL: success rate below {:.0}% target. \
                 Review error patterns and fallback ordering.",
                SUCCESS_TARGET * 100.0
            ));
        }
    }

    let fastest = backends
        .iter()
        .min_by(|a, b| a.average_seconds.total_cmp(&b.average_seconds));
    let slowest = backends
        .iter()
        .max_by(|a, b| a.average_seconds.total_cmp(&b.average_seconds));
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        if slowest.average_seconds > fastest.average_seconds * SPREAD_RATIO {
            notes.push(format!(
                "Consider prioritizing {} (avg: {:.2}s) over {} (avg: {:.2}s).",
                fastest.backend, fastest.average_seconds, slowest.backend, slowest.average_seconds
            ));
        }
    }

    if stats
        .recent_max_seconds
        .is_some_and(|max| max > sla_seconds * 2.0)
    {
        notes.push(format!(
            "Some recent requests took longer than {:.1}s. Review attempt budgets.",
            sla_seconds * 2.0
        ));
    }

    notes
}
