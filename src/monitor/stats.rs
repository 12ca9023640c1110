//! Descriptive statistics over outcome records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::OutcomeRecord;

/// Arithmetic mean, zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median, averaging the two middle values for even lengths.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile: the value at rank `ceil(p / 100 * n)`.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted(values);
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Sample standard deviation (n - 1), zero below two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Normal-approximation 95% interval on the mean: `mean ± 1.96 * sd / sqrt(n)`.
///
/// Returns `(0, 0)` below two values. This is an approximation regardless of
/// sample size; no t-distribution correction is applied.
pub fn confidence_interval(values: &[f64]) -> (f64, f64) {
    if values.len() < 2 {
        return (0.0, 0.0);
    }
    let m = mean(values);
    let margin = 1.96 * std_dev(values) / (values.len() as f64).sqrt();
    (m - margin, m + margin)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Latencies in seconds of the successful records.
pub fn successful_latencies<'a, I>(records: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a OutcomeRecord>,
{
    records
        .into_iter()
        .filter(|r| r.success)
        .map(|r| r.latency_seconds())
        .collect()
}

/// Aggregate view of the records inside one evaluation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub window_minutes: u64,
    pub total: usize,
    pub successes: usize,
    pub success_rate: f64,
    /// Mean latency of successful records (zero when there are none)
    pub mean_latency_seconds: f64,
    pub max_latency_seconds: f64,
    /// Share of successful records strictly under the SLA target
    pub sla_hit_rate: f64,
}

impl WindowStats {
    pub fn from_records(records: &[OutcomeRecord], window_minutes: u64, sla: Duration) -> Self {
        let latencies = successful_latencies(records);
        let total = records.len();
        let successes = latencies.len();
        let sla_seconds = sla.as_secs_f64();

        Self {
            window_minutes,
            total,
            successes,
            success_rate: ratio(successes, total),
            mean_latency_seconds: mean(&latencies),
            max_latency_seconds: latencies.iter().copied().fold(0.0, f64::max),
            sla_hit_rate: ratio(
                latencies.iter().filter(|l| **l < sla_seconds).count(),
                successes,
            ),
        }
    }
}

/// Running totals plus a view of the most recent records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub sla_hits: u64,
    pub success_rate: f64,
    /// SLA hits over successful requests
    pub sla_hit_rate: f64,
    /// Long-run mean latency of successful requests
    pub average_latency_seconds: f64,
    pub recent_average_seconds: Option<f64>,
    pub recent_max_seconds: Option<f64>,
    pub recent_min_seconds: Option<f64>,
    pub buffered_records: usize,
}

/// Letter grade for a backend's mean latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// A under 2 s, B under 4 s, C under 6 s, D otherwise.
    pub fn from_mean_seconds(mean: f64) -> Self {
        if mean < 2.0 {
            Grade::A
        } else if mean < 4.0 {
            Grade::B
        } else if mean < 6.0 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

/// Latency profile of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendPerformance {
    pub backend: String,
    pub sample_count: usize,
    pub average_seconds: f64,
    pub median_seconds: f64,
    pub min_seconds: f64,
    pub max_seconds: f64,
    pub std_dev_seconds: f64,
    pub sla_hit_rate: f64,
    pub grade: Grade,
}

impl BackendPerformance {
    /// Profile from successful latencies; `None` when there are none.
    pub fn from_latencies(backend: &str, latencies: &[f64], sla: Duration) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        let average = mean(latencies);
        let sla_seconds = sla.as_secs_f64();
        Some(Self {
            backend: backend.to_string(),
            sample_count: latencies.len(),
            average_seconds: average,
            median_seconds: median(latencies),
            min_seconds: latencies.iter().copied().fold(f64::INFINITY, f64::min),
            max_seconds: latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev_seconds: std_dev(latencies),
            sla_hit_rate: ratio(
                latencies.iter().filter(|l| **l < sla_seconds).count(),
                latencies.len(),
            ),
            grade: Grade::from_mean_seconds(average),
        })
    }
}

pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
