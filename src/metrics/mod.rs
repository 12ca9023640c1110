//! # Metrics Collection Module
//!
//! Prometheus export for the orchestration core.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `cutout_attempts_total{backend, outcome}` - Backend attempts by outcome
//! - `cutout_fallbacks_total` - Attempts beyond the first within a request
//! - `cutout_alerts_fired_total{alert_id}` - Fired alerts
//!
//! **Histograms:**
//! - `cutout_attempt_duration_seconds{backend}` - Attempt latency
//!
//! **Gauges:**
//! - `cutout_backends_total` - Registered backends
//! - `cutout_backends{state}` - Backends per health state
//! - `cutout_backend_up{backend}` - 1 when Healthy or Degraded, else 0

pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::{HealthState, HealthTracker};
use crate::registry::Registry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

const HEALTH_STATES: [HealthState; 4] = [
    HealthState::Healthy,
    HealthState::Degraded,
    HealthState::Failed,
    HealthState::Unknown,
];

/// Computes health gauges from the registry and tracker and renders metrics.
pub struct MetricsCollector {
    registry: Arc<Registry>,
    health: Arc<HealthTracker>,
    start_time: Instant,
    /// Cache for sanitized Prometheus labels
    label_cache: DashMap<String, String>,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<Registry>,
        health: Arc<HealthTracker>,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            health,
            start_time: Instant::now(),
            label_cache: DashMap::new(),
            prometheus_handle,
        }
    }

    /// Get sanitized Prometheus label (cached).
    ///
    /// Prometheus label names must match regex: `[a-zA-Z_][a-zA-Z0-9_]*`
    pub fn sanitize_label(&self, label: &str) -> String {
        if let Some(cached) = self.label_cache.get(label) {
            return cached.clone();
        }

        let mut sanitized = label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();

        if sanitized.chars().next().map_or(true, |c| c.is_ascii_digit()) {
            sanitized.insert(0, '_');
        }

        self.label_cache
            .insert(label.to_string(), sanitized.clone());
        sanitized
    }

    /// Update health gauges from the registry and tracker.
    pub fn update_health_gauges(&self) {
        let descriptors = self.registry.list();
        let snapshot = self.health.snapshot();

        metrics::gauge!("cutout_backends_total").set(descriptors.len() as f64);

        for state in HEALTH_STATES {
            let count = descriptors
                .iter()
                .filter(|d| snapshot.get(&d.id) == state)
                .count();
            metrics::gauge!("cutout_backends", "state" => state.to_string()).set(count as f64);
        }

        for descriptor in &descriptors {
            let up = matches!(
                snapshot.get(&descriptor.id),
                HealthState::Healthy | HealthState::Degraded
            );
            metrics::gauge!(
                "cutout_backend_up",
                "backend" => self.sanitize_label(&descriptor.id)
            )
            .set(if up { 1.0 } else { 0.0 });
        }
    }

    /// Seconds since the collector was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.update_health_gauges();
        self.prometheus_handle.render()
    }
}

/// Install the Prometheus recorder with latency buckets sized around the
/// five second processing target.
///
/// Buckets: [0.25, 0.5, 1, 1.5, 2, 3, 4, 5, 7, 10, 15, 30] seconds.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let duration_buckets = &[
        0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 30.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("cutout_attempt_duration_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
