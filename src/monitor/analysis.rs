//! Experiment variant analytics.
//!
//! "Significance" here is only a sample-size threshold, and the confidence
//! interval is a normal approximation at any sample size. Both are known
//! approximations and are kept as such.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::OutcomeRecord;
use crate::experiment::{ExperimentConfig, Variant};

use super::stats::{self, ratio};

/// Relative change in SLA-hit rate vs control that triggers a recommendation.
const CONTROL_DELTA: f64 = 0.1;

/// SLA-hit rate below which a variant is called out as a poor performer.
const POOR_SLA_HIT_RATE: f64 = 0.8;

/// Derived performance of one variant over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPerformance {
    pub variant: Variant,
    pub sample_count: usize,
    pub success_rate: f64,
    pub mean_latency_seconds: f64,
    pub median_latency_seconds: f64,
    pub p95_latency_seconds: f64,
    /// Successful samples strictly under the SLA target, over successful samples
    pub sla_hit_rate: f64,
    pub error_rate: f64,
    pub confidence_interval: (f64, f64),
    /// `sample_count >= minimum_sample_size`
    pub significant: bool,
}

impl VariantPerformance {
    /// Compute performance from the variant's records; `None` if there are none.
    pub fn from_records(
        variant: Variant,
        records: &[&OutcomeRecord],
        minimum_sample_size: usize,
        sla: Duration,
    ) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let sample_count = records.len();
        let latencies = stats::successful_latencies(records.iter().copied());
        let success_rate = ratio(latencies.len(), sample_count);
        let sla_seconds = sla.as_secs_f64();

        Some(Self {
            variant,
            sample_count,
            success_rate,
            mean_latency_seconds: stats::mean(&latencies),
            median_latency_seconds: stats::median(&latencies),
            p95_latency_seconds: stats::percentile(&latencies, 95.0),
            sla_hit_rate: ratio(
                latencies.iter().filter(|l| **l < sla_seconds).count(),
                latencies.len(),
            ),
            error_rate: 1.0 - success_rate,
            confidence_interval: stats::confidence_interval(&latencies),
            significant: sample_count >= minimum_sample_size,
        })
    }

    /// `0.5 * sla_hit_rate + 0.3 * success_rate + 0.2 * max(0, (SLA - mean) / SLA)`
    pub fn composite_score(&self, sla: Duration) -> f64 {
        let sla_seconds = sla.as_secs_f64();
        let speed = if sla_seconds > 0.0 {
            ((sla_seconds - self.mean_latency_seconds) / sla_seconds).max(0.0)
        } else {
            0.0
        };
        0.5 * self.sla_hit_rate + 0.3 * self.success_rate + 0.2 * speed
    }
}

/// Highest-scoring variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerSelection {
    pub variant: Variant,
    pub composite_score: f64,
}

/// Highest composite score wins; ties keep the earlier variant.
pub fn select_winner(performances: &[VariantPerformance], sla: Duration) -> Option<WinnerSelection> {
    let mut best: Option<WinnerSelection> = None;
    for perf in performances {
        let score = perf.composite_score(sla);
        if best.as_ref().map_or(true, |b| score > b.composite_score) {
            best = Some(WinnerSelection {
                variant: perf.variant,
                composite_score: score,
            });
        }
    }
    best
}

/// Actionable notes derived from variant performance.
pub fn recommendations(performances: &[VariantPerformance], minimum_sample_size: usize) -> Vec<String> {
    let mut notes = Vec::new();

    if let Some(control) = performances.iter().find(|p| p.variant == Variant::Control) {
        for perf in performances.iter().filter(|p| p.variant != Variant::Control) {
            let change = if control.sla_hit_rate > 0.0 {
                (perf.sla_hit_rate - control.sla_hit_rate) / control.sla_hit_rate
            } else {
                0.0
            };
            if change > CONTROL_DELTA {
                notes.push(format!(
                    "Consider switching to {}: {:.1}% improvement in SLA completion rate",
                    perf.variant,
                    change * 100.0
                ));
            } else if change < -CONTROL_DELTA {
                notes.push(format!(
                    "Reduce traffic to {}: {:.1}% degradation in SLA completion rate",
                    perf.variant,
                    change.abs() * 100.0
                ));
            }
        }
    }

    let lacking = performances.iter().filter(|p| !p.significant).count();
    if lacking > 0 {
        notes.push(format!(
            "Collect more data: {} variant(s) need more samples for significance (min: {})",
            lacking, minimum_sample_size
        ));
    }

    let poor: Vec<String> = performances
        .iter()
        .filter(|p| p.sla_hit_rate < POOR_SLA_HIT_RATE)
        .map(|p| p.variant.to_string())
        .collect();
    if !poor.is_empty() {
        notes.push(format!(
            "Poor performance detected in {}. Consider removing or optimizing these variants.",
            poor.join(", ")
        ));
    }

    notes
}

/// Full comparison of an experiment's variants over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAnalysis {
    pub experiment_id: String,
    pub experiment_name: String,
    pub window_hours: u64,
    pub timestamp: DateTime<Utc>,
    /// Variants with data, in declaration order
    pub performances: Vec<VariantPerformance>,
    pub winner: Option<WinnerSelection>,
    pub recommendations: Vec<String>,
    /// Every variant with data reached the minimum sample size
    pub statistically_confident: bool,
}

impl VariantAnalysis {
    /// Analyze `records` (already restricted to the window) for `experiment`.
    pub fn compute(
        experiment: &ExperimentConfig,
        records: &[OutcomeRecord],
        window_hours: u64,
        sla: Duration,
    ) -> Self {
        let performances: Vec<VariantPerformance> = experiment
            .variants
            .iter()
            .filter_map(|allocation| {
                let variant_records: Vec<&OutcomeRecord> = records
                    .iter()
                    .filter(|r| {
                        r.variant.as_ref().is_some_and(|tag| {
                            tag.experiment_id == experiment.id && tag.variant == allocation.variant
                        })
                    })
                    .collect();
                VariantPerformance::from_records(
                    allocation.variant,
                    &variant_records,
                    experiment.minimum_sample_size,
                    sla,
                )
            })
            .collect();

        let winner = select_winner(&performances, sla);
        let recommendations = recommendations(&performances, experiment.minimum_sample_size);
        let statistically_confident =
            !performances.is_empty() && performances.iter().all(|p| p.significant);

        Self {
            experiment_id: experiment.id.clone(),
            experiment_name: experiment.name.clone(),
            window_hours,
            timestamp: Utc::now(),
            performances,
            winner,
            recommendations,
            statistically_confident,
        }
    }

    /// Performance of one variant, if it had data.
    pub fn performance(&self, variant: Variant) -> Option<&VariantPerformance> {
        self.performances.iter().find(|p| p.variant == variant)
    }
}
