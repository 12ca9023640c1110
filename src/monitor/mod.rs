//! Performance monitoring, alerting and variant analytics.
//!
//! The monitor keeps a bounded rolling buffer of outcome records, sharded per
//! backend so concurrent writers for different backends never contend, plus
//! lock-free running aggregates. Alert rules and reports are evaluated
//! against whole-record snapshots of that buffer.
//!
//! Every ingested record is re-broadcast on the outcome stream. The stream is
//! best-effort: slow subscribers lag and miss records rather than slowing the
//! request path.

pub mod alerts;
pub mod analysis;
mod config;
pub mod report;
pub mod stats;


pub use alerts::{
    default_rules, AlertCondition, AlertEvent, AlertRule, AlertSink, ChannelAlertSink,
    LoggingAlertSink,
};
pub use analysis::{VariantAnalysis, VariantPerformance, WinnerSelection};
pub use config::MonitorConfig;
pub use report::{PerformanceReport, PerformanceSummary, ReportHealth};
pub use stats::{BackendPerformance, CurrentStats, Grade, WindowStats};

use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::{OutcomeRecord, OutcomeSink};
use crate::experiment::ExperimentConfig;

/// Lifetime counters over every ingested record.
#[derive(Default)]
struct Aggregates {
    total: AtomicU64,
    successes: AtomicU64,
    sla_hits: AtomicU64,
    /// Sum of successful latencies in microseconds
    latency_micros: AtomicU64,
}

impl Aggregates {
    fn add(&self, record: &OutcomeRecord, sla: Duration) {
        self.total.fetch_add(1, Ordering::Release);
        if record.success {
            let micros = u64::try_from(record.latency.as_micros()).unwrap_or(u64::MAX);
            self.latency_micros.fetch_add(micros, Ordering::Relaxed);
            self.successes.fetch_add(1, Ordering::Release);
            if record.hit_sla(sla) {
                self.sla_hits.fetch_add(1, Ordering::Release);
            }
        }
    }

    /// Long-run mean latency of successful records, in seconds.
    fn mean_seconds(&self) -> f64 {
        let successes = self.successes.load(Ordering::Relaxed);
        if successes == 0 {
            return 0.0;
        }
        self.latency_micros.load(Ordering::Relaxed) as f64 / successes as f64 / 1_000_000.0
    }
}

/// `part / whole`, zero for an empty whole and never above one.
fn clamped_ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64).min(1.0)
    }
}

/// Rolling performance monitor.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    sla: Duration,
    shards: DashMap<String, VecDeque<OutcomeRecord>>,
    aggregates: Aggregates,
    rules: RwLock<Vec<AlertRule>>,
    sinks: RwLock<Vec<Arc<dyn AlertSink>>>,
    outcomes: broadcast::Sender<OutcomeRecord>,
}

impl PerformanceMonitor {
    /// Create a monitor with the given rules and no alert sinks.
    pub fn new(config: MonitorConfig, sla: Duration, rules: Vec<AlertRule>) -> Self {
        let (outcomes, _) = broadcast::channel(config.outcome_channel_capacity.max(1));
        Self {
            config,
            sla,
            shards: DashMap::new(),
            aggregates: Aggregates::default(),
            rules: RwLock::new(rules),
            sinks: RwLock::new(Vec::new()),
            outcomes,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sla(&self) -> Duration {
        self.sla
    }

    /// Register a sink that receives every fired alert.
    pub fn add_sink(&self, sink: Arc<dyn AlertSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Add an alert rule, replacing any rule with the same identity.
    pub fn add_rule(&self, rule: AlertRule) {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        rules.retain(|r| r.id != rule.id);
        tracing::info!(alert_id = %rule.id, condition = %rule.condition, "Added alert rule");
        rules.push(rule);
    }

    /// Current alert rules.
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to the outcome stream.
    pub fn subscribe(&self) -> broadcast::Receiver<OutcomeRecord> {
        self.outcomes.subscribe()
    }

    /// Ingest one outcome record.
    ///
    /// Returns the alerts fired by the synchronous evaluation, if enabled.
    pub fn ingest(&self, record: OutcomeRecord) -> Vec<AlertEvent> {
        self.aggregates.add(&record, self.sla);

        {
            let mut shard = self.shards.entry(record.backend.clone()).or_default();
            shard.push_back(record.clone());
            while shard.len() > self.config.buffer_capacity.max(1) {
                shard.pop_front();
            }
            Self::evict_expired(&mut shard, self.retention_cutoff());
        }

        tracing::trace!(
            backend_id = %record.backend,
            success = record.success,
            latency_seconds = record.latency_seconds(),
            "Ingested outcome record"
        );

        // No subscribers is fine
        let _ = self.outcomes.send(record);

        if self.config.evaluate_on_ingest {
            self.evaluate_alerts()
        } else {
            Vec::new()
        }
    }

    fn retention_cutoff(&self) -> chrono::DateTime<Utc> {
        let retention =
            chrono::Duration::from_std(self.config.retention()).unwrap_or(chrono::Duration::MAX);
        Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
    }

    fn evict_expired(shard: &mut VecDeque<OutcomeRecord>, cutoff: chrono::DateTime<Utc>) {
        while shard.front().is_some_and(|r| r.timestamp < cutoff) {
            shard.pop_front();
        }
    }

    /// Drop expired records from every shard.
    pub fn prune(&self) {
        let cutoff = self.retention_cutoff();
        for mut shard in self.shards.iter_mut() {
            Self::evict_expired(&mut shard, cutoff);
        }
    }

    /// All buffered records at or after `since`, oldest first.
    fn records_since(&self, since: chrono::DateTime<Utc>) -> Vec<OutcomeRecord> {
        let mut records: Vec<OutcomeRecord> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .iter()
                    .filter(|r| r.timestamp >= since)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        records.sort_by_key(|r| r.timestamp);
        records
    }

    fn window_start(now: chrono::DateTime<Utc>, minutes: u64) -> chrono::DateTime<Utc> {
        let span = chrono::Duration::try_minutes(i64::try_from(minutes).unwrap_or(i64::MAX))
            .unwrap_or(chrono::Duration::MAX);
        now.checked_sub_signed(span)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
    }

    /// Records inside the last `minutes`.
    pub fn window(&self, minutes: u64) -> Vec<OutcomeRecord> {
        self.records_since(Self::window_start(Utc::now(), minutes))
    }

    /// Aggregate stats over the last `minutes`.
    pub fn window_stats(&self, minutes: u64) -> WindowStats {
        WindowStats::from_records(&self.window(minutes), minutes, self.sla)
    }

    /// Number of records currently buffered across all shards.
    pub fn buffered_len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Running totals plus the most recent records.
    pub fn current_stats(&self) -> CurrentStats {
        // Sub-counts first: a racing ingest can only make the totals larger
        let sla_hits = self.aggregates.sla_hits.load(Ordering::Acquire);
        let successes = self.aggregates.successes.load(Ordering::Acquire);
        let total = self.aggregates.total.load(Ordering::Acquire);

        let all = self.records_since(chrono::DateTime::<Utc>::MIN_UTC);
        let recent_start = all.len().saturating_sub(self.config.recent_window);
        let recent = stats::successful_latencies(&all[recent_start..]);

        let (recent_average, recent_max, recent_min) = if recent.is_empty() {
            (None, None, None)
        } else {
            (
                Some(stats::mean(&recent)),
                Some(recent.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                Some(recent.iter().copied().fold(f64::INFINITY, f64::min)),
            )
        };

        CurrentStats {
            total_requests: total,
            successful_requests: successes,
            sla_hits,
            success_rate: clamped_ratio(successes, total),
            sla_hit_rate: clamped_ratio(sla_hits, successes),
            average_latency_seconds: self.aggregates.mean_seconds(),
            recent_average_seconds: recent_average,
            recent_max_seconds: recent_max,
            recent_min_seconds: recent_min,
            buffered_records: all.len(),
        }
    }

    /// Evaluate every enabled rule and notify sinks for each that fires.
    ///
    /// One sorted snapshot of the widest rule window is taken per pass and
    /// every rule reads its own suffix of it.
    pub fn evaluate_alerts(&self) -> Vec<AlertEvent> {
        let rules = self.rules();
        let enabled: Vec<&AlertRule> = rules.iter().filter(|r| r.enabled).collect();
        let Some(widest) = enabled.iter().map(|r| r.window_minutes).max() else {
            return Vec::new();
        };

        let now = Utc::now();
        let records = self.records_since(Self::window_start(now, widest));
        let baseline = self.aggregates.mean_seconds();
        let mut current: Option<CurrentStats> = None;
        let mut fired = Vec::new();

        for rule in enabled {
            let start = Self::window_start(now, rule.window_minutes);
            let from = records.partition_point(|r| r.timestamp < start);
            let window = WindowStats::from_records(&records[from..], rule.window_minutes, self.sla);
            if !rule.fires(&window, baseline) {
                continue;
            }

            metrics::counter!("cutout_alerts_fired_total", "alert_id" => rule.id.clone())
                .increment(1);

            fired.push(AlertEvent {
                alert_id: rule.id.clone(),
                condition: rule.condition,
                threshold: rule.threshold,
                window_minutes: rule.window_minutes,
                timestamp: Utc::now(),
                window,
                current_stats: current
                    .get_or_insert_with(|| self.current_stats())
                    .clone(),
            });
        }

        if !fired.is_empty() {
            let sinks: Vec<Arc<dyn AlertSink>> = self
                .sinks
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for event in &fired {
                for sink in &sinks {
                    sink.notify(event);
                }
            }
        }

        fired
    }

    /// Per-backend latency comparison over recent successful records.
    pub fn backend_comparison(&self) -> Vec<BackendPerformance> {
        let mut comparison: Vec<BackendPerformance> = self
            .shards
            .iter()
            .filter_map(|shard| {
                let latencies = stats::successful_latencies(shard.iter());
                let start = latencies.len().saturating_sub(self.config.comparison_window);
                BackendPerformance::from_latencies(shard.key(), &latencies[start..], self.sla)
            })
            .collect();
        comparison.sort_by(|a, b| a.backend.cmp(&b.backend));
        comparison
    }

    /// Variant comparison for an experiment over the last `window_hours`.
    pub fn variant_analysis(&self, experiment: &ExperimentConfig, window_hours: u64) -> VariantAnalysis {
        let span = chrono::Duration::try_hours(i64::try_from(window_hours).unwrap_or(i64::MAX))
            .unwrap_or(chrono::Duration::MAX);
        let since = Utc::now()
            .checked_sub_signed(span)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let records = self.records_since(since);
        VariantAnalysis::compute(experiment, &records, window_hours, self.sla)
    }

    /// Health assessment, summary, backend comparison and recommendations.
    pub fn performance_report(&self) -> PerformanceReport {
        PerformanceReport::build(self.current_stats(), self.backend_comparison(), self.sla)
    }
}

impl OutcomeSink for PerformanceMonitor {
    fn record(&self, record: OutcomeRecord) {
        self.ingest(record);
    }
}

/// Background task that periodically prunes the buffer and evaluates alerts.
pub struct MonitorTask {
    monitor: Arc<PerformanceMonitor>,
    interval: Duration,
}

impl MonitorTask {
    pub fn new(monitor: Arc<PerformanceMonitor>) -> Self {
        let interval = Duration::from_secs(monitor.config().evaluation_interval_seconds.max(1));
        Self { monitor, interval }
    }

    /// Start the evaluation loop.
    /// Returns a JoinHandle that resolves when the task stops.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.interval.as_secs(),
                "Performance monitor task started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Performance monitor task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.monitor.prune();
                        let fired = self.monitor.evaluate_alerts();
                        tracing::debug!(
                            alerts_fired = fired.len(),
                            buffered = self.monitor.buffered_len(),
                            "Alert evaluation cycle completed"
                        );
                    }
                }
            }
        })
    }
}
