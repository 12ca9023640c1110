//! Threshold alert rules and sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::stats::{CurrentStats, WindowStats};

/// Minimum successful records before degradation is judged.
pub const DEGRADATION_MIN_SUCCESSES: usize = 5;

/// Metric an alert rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    /// Mean latency of successful records, in seconds, above the threshold
    MeanLatencyExceeds,
    /// Fraction of successful records below the threshold
    SuccessRateBelow,
    /// Window mean relative to the long-run mean increased by more than the threshold
    DegradationVsBaseline,
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::MeanLatencyExceeds => write!(f, "mean_latency_exceeds"),
            AlertCondition::SuccessRateBelow => write!(f, "success_rate_below"),
            AlertCondition::DegradationVsBaseline => write!(f, "degradation_vs_baseline"),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Stateless alert definition, evaluated on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub window_minutes: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        condition: AlertCondition,
        threshold: f64,
        window_minutes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            condition,
            threshold,
            window_minutes,
            enabled: true,
        }
    }

    /// Whether the rule fires for `window`, given the long-run mean latency.
    pub fn fires(&self, window: &WindowStats, baseline_seconds: f64) -> bool {
        if !self.enabled || window.total == 0 {
            return false;
        }
        match self.condition {
            AlertCondition::MeanLatencyExceeds => {
                window.successes > 0 && window.mean_latency_seconds > self.threshold
            }
            AlertCondition::SuccessRateBelow => window.success_rate < self.threshold,
            AlertCondition::DegradationVsBaseline => {
                window.successes >= DEGRADATION_MIN_SUCCESSES
                    && baseline_seconds > 0.0
                    && (window.mean_latency_seconds - baseline_seconds) / baseline_seconds
                        > self.threshold
            }
        }
    }
}

/// Default rules for a processing pipeline with a 5 second target.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "processing_time_critical",
            AlertCondition::MeanLatencyExceeds,
            5.0,
            5,
        ),
        AlertRule::new(
            "processing_time_warning",
            AlertCondition::MeanLatencyExceeds,
            4.0,
            3,
        ),
        AlertRule::new(
            "success_rate_critical",
            AlertCondition::SuccessRateBelow,
            0.95,
            10,
        ),
        AlertRule::new(
            "performance_degradation",
            AlertCondition::DegradationVsBaseline,
            0.2,
            15,
        ),
    ]
}

/// Payload delivered to alert sinks when a rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_id: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub window_minutes: u64,
    pub timestamp: DateTime<Utc>,
    pub window: WindowStats,
    pub current_stats: CurrentStats,
}

impl AlertEvent {
    /// Critical alerts are the ones whose identity says so.
    pub fn is_critical(&self) -> bool {
        self.alert_id.contains("critical")
    }
}

/// Receiver of fired alerts.
///
/// Invoked inline from alert evaluation; implementations must not block and
/// must not fail. Deduplication belongs to whatever sits behind the sink.
pub trait AlertSink: Send + Sync {
    fn notify(&self, event: &AlertEvent);
}

/// Writes fired alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAlertSink;

impl AlertSink for LoggingAlertSink {
    fn notify(&self, event: &AlertEvent) {
        if event.is_critical() {
            tracing::error!(
                alert_id = %event.alert_id,
                condition = %event.condition,
                threshold = event.threshold,
                window_minutes = event.window_minutes,
                window_total = event.window.total,
                window_success_rate = event.window.success_rate,
                window_mean_seconds = event.window.mean_latency_seconds,
                "Performance alert fired"
            );
        } else {
            tracing::warn!(
                alert_id = %event.alert_id,
                condition = %event.condition,
                threshold = event.threshold,
                window_minutes = event.window_minutes,
                window_total = event.window.total,
                window_success_rate = event.window.success_rate,
                window_mean_seconds = event.window.mean_latency_seconds,
                "Performance alert fired"
            );
        }
    }
}

/// Forwards fired alerts into a bounded channel, dropping them when full.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::Sender<AlertEvent>,
}

impl ChannelAlertSink {
    pub fn new(tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn notify(&self, event: &AlertEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            tracing::debug!(alert_id = %event.alert_id, error = %e, "Dropped alert event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(total: usize, successes: usize, mean: f64) -> WindowStats {
        WindowStats {
            window_minutes: 10,
            total,
            successes,
            success_rate: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64
            },
            mean_latency_seconds: mean,
            max_latency_seconds: mean,
            sla_hit_rate: 1.0,
        }
    }

    fn rule(condition: AlertCondition, threshold: f64) -> AlertRule {
        AlertRule::new("test", condition, threshold, 10)
    }

    #[test]
    fn success_rate_below_threshold() {
        let rule = rule(AlertCondition::SuccessRateBelow, 0.95);
        assert!(rule.fires(&window(100, 90, 1.0), 0.0));
        assert!(!rule.fires(&window(100, 96, 1.0), 0.0));
        assert!(!rule.fires(&window(0, 0, 0.0), 0.0));
    }

    #[test]
    fn mean_latency_needs_successes() {
        let rule = rule(AlertCondition::MeanLatencyExceeds, 5.0);
        assert!(rule.fires(&window(10, 10, 5.5), 0.0));
        assert!(!rule.fires(&window(10, 10, 5.0), 0.0));
        assert!(!rule.fires(&window(10, 0, 0.0), 0.0));
    }

    #[test]
    fn degradation_needs_five_successes_and_baseline() {
        let rule = rule(AlertCondition::DegradationVsBaseline, 0.2);
        assert!(rule.fires(&window(5, 5, 1.3), 1.0));
        assert!(!rule.fires(&window(5, 5, 1.1), 1.0));
        assert!(!rule.fires(&window(4, 4, 3.0), 1.0));
        assert!(!rule.fires(&window(5, 5, 3.0), 0.0));
    }

    #[test]
    fn disabled_rule_never_fires() {
        let mut rule = rule(AlertCondition::SuccessRateBelow, 0.95);
        rule.enabled = false;
        assert!(!rule.fires(&window(10, 0, 0.0), 0.0));
    }

    #[test]
    fn default_rules_match_pipeline_targets() {
        let rules = default_rules();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].id, "processing_time_critical");
        assert_eq!(rules[2].condition, AlertCondition::SuccessRateBelow);
        assert_eq!(rules[3].window_minutes, 15);
        assert!(rules.iter().all(|r| r.enabled));
    }

    #[test]
    fn alert_rule_from_toml() {
        let toml = r#"
            id = "slow"
            condition = "mean_latency_exceeds"
            threshold = 3.5
            window_minutes = 2
        "#;
        let rule: AlertRule = toml::from_str(toml).unwrap();
        assert_eq!(rule.condition, AlertCondition::MeanLatencyExceeds);
        assert!(rule.enabled);
    }

    #[tokio::test]
    async fn channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelAlertSink::channel(1);
        let event = AlertEvent {
            alert_id: "a".into(),
            condition: AlertCondition::SuccessRateBelow,
            threshold: 0.95,
            window_minutes: 10,
            timestamp: Utc::now(),
            window: window(10, 5, 1.0),
            current_stats: CurrentStats::default(),
        };

        sink.notify(&event);
        sink.notify(&event);

        assert_eq!(rx.recv().await.unwrap().alert_id, "a");
        assert!(rx.try_recv().is_err());
    }
}
