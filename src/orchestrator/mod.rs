//! Orchestrator facade.
//!
//! Wires the registry, health tracker, ordering policy, fallback executor,
//! experiment assigner and performance monitor from a [`CutoutConfig`] and
//! runs the per-request control flow:
//!
//! 1. bucket the session into the request's experiment (if any)
//! 2. resolve the variant to its backend and that backend's tier
//! 3. rank every registered backend against current health
//! 4. attempt candidates in order until one qualifies
//!
//! The executor reports every attempt to the monitor, which keeps the rolling
//! stats, evaluates alerts and re-broadcasts the record on the outcome stream.

mod error;
mod report;

#[cfg(test)]
mod tests;

pub use error::ProcessError;
pub use report::{AttemptHistory, BackendHealthReport, HealthReport, HealthSummary};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{ConfigError, CutoutConfig};
use crate::executor::{FallbackExecutor, OutcomeRecord, OutcomeSink, RequestContext, VariantTag};
use crate::experiment::{ExperimentAssigner, ExperimentConfig, ExperimentError, Variant};
use crate::health::{HealthProber, HealthState, HealthTracker};
use crate::monitor::{
    AlertSink, CurrentStats, LoggingAlertSink, MonitorTask, PerformanceMonitor, PerformanceReport,
    VariantAnalysis,
};
use crate::processor::ProcessingBackend;
use crate::registry::Registry;
use crate::routing::{recommended_backend, ImageComplexity, OrderingPolicy, OrderingRequest, ProcessingMode};

/// One background-removal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub payload: Vec<u8>,
    pub session_id: String,
    pub mode: ProcessingMode,
    /// Experiment the session takes part in
    pub experiment_id: Option<String>,
    /// Hint used to prefer a backend when no experiment applies
    pub complexity: Option<ImageComplexity>,
}

impl ProcessingRequest {
    pub fn new(payload: Vec<u8>, session_id: impl Into<String>) -> Self {
        Self {
            payload,
            session_id: session_id.into(),
            mode: ProcessingMode::default(),
            experiment_id: None,
            complexity: None,
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_experiment(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    pub fn with_complexity(mut self, complexity: ImageComplexity) -> Self {
        self.complexity = Some(complexity);
        self
    }
}

/// Result of a processed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResponse {
    pub request_id: Uuid,
    pub output: Vec<u8>,
    /// Backend that produced `output`
    pub backend: String,
    pub elapsed: Duration,
    /// Succeeded, but slower than the SLA target
    pub over_sla: bool,
    pub attempts: usize,
    /// Experiment arm the request was served under
    pub variant: Option<VariantTag>,
}

/// Entry point tying every orchestration component together.
pub struct Orchestrator {
    config: CutoutConfig,
    registry: Arc<Registry>,
    health: Arc<HealthTracker>,
    policy: OrderingPolicy,
    executor: FallbackExecutor,
    assigner: ExperimentAssigner,
    monitor: Arc<PerformanceMonitor>,
}

impl Orchestrator {
    /// Build every component from configuration.
    ///
    /// `backends` maps backend identity to its processing capability. Every
    /// configured backend needs a handle; handles without a descriptor are
    /// ignored. Fired alerts are logged by default.
    ///
    /// # Errors
    ///
    /// Validation errors from [`CutoutConfig::validate`], a missing handle, or
    /// a registration or experiment failure.
    pub fn from_config(
        config: CutoutConfig,
        mut backends: HashMap<String, Arc<dyn ProcessingBackend>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(Registry::new());
        for (i, descriptor) in config.backends.iter().enumerate() {
            let handle = backends
                .remove(&descriptor.id)
                .ok_or_else(|| ConfigError::Validation {
                    field: format!("backends[{}].id", i),
                    message: format!("no processing handle for backend '{}'", descriptor.id),
                })?;
            registry.register(descriptor.clone(), handle)?;
        }
        for unused in backends.keys() {
            tracing::warn!(backend_id = %unused, "Processing handle has no configured backend");
        }

        let health = Arc::new(HealthTracker::new(config.health.clone()));
        let sla = config.sla.target();

        let monitor = Arc::new(PerformanceMonitor::new(
            config.monitor.clone(),
            sla,
            config.alerts.clone(),
        ));
        monitor.add_sink(Arc::new(LoggingAlertSink));

        let executor = FallbackExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            Arc::clone(&monitor) as Arc<dyn OutcomeSink>,
            sla,
        );

        let assigner = ExperimentAssigner::new(config.variant_backends.clone());
        for experiment in &config.experiments {
            assigner.register_experiment(experiment.clone())?;
        }

        tracing::info!(
            backends = registry.len(),
            experiments = config.experiments.len(),
            sla_seconds = sla.as_secs_f64(),
            max_attempts = config.executor.max_attempts,
            "Orchestrator ready"
        );

        Ok(Self {
            policy: OrderingPolicy::new(config.ordering.clone()),
            config,
            registry,
            health,
            executor,
            assigner,
            monitor,
        })
    }

    /// Run one request through assignment, ordering and fallback execution.
    ///
    /// # Errors
    ///
    /// `ProcessError::Experiment` if an assigned non-control variant has no
    /// backend binding, `ProcessError::Execution` if every attempt failed.
    /// An unbound control variant falls back to default ordering.
    pub async fn process(&self, request: ProcessingRequest) -> Result<ProcessingResponse, ProcessError> {
        let mut ctx = RequestContext::new();
        let mut ordering = OrderingRequest::new(request.mode);

        if let Some(experiment_id) = request.experiment_id.as_deref() {
            let variant = self.assigner.assign(&request.session_id, experiment_id);
            match self.assigner.resolve_backend(variant) {
                Ok(backend_id) => {
                    let descriptor = self.registry.get(&backend_id)?;
                    ordering = ordering
                        .with_preferred_tier(descriptor.tier)
                        .with_preferred_backend(backend_id);
                }
                Err(ExperimentError::UnknownVariant(Variant::Control)) => {
                    tracing::debug!(experiment_id, "Control variant unbound, using default ordering");
                }
                Err(e) => return Err(e.into()),
            }

            if self.experiment_is_active(experiment_id) {
                ctx = ctx.with_variant(VariantTag::new(experiment_id, variant));
            }
        } else if let Some(complexity) = request.complexity {
            let backend_id = recommended_backend(complexity, request.mode);
            if self.registry.contains(backend_id) {
                ordering = ordering.with_preferred_backend(backend_id);
            }
        }

        let candidates = self
            .policy
            .order(&self.registry, &ordering, &self.health.snapshot());

        let result = self
            .executor
            .execute(
                &ctx,
                &request.payload,
                &candidates,
                self.config.sla.attempt_budget(),
                self.config.executor.max_attempts,
            )
            .await?;

        tracing::info!(
            request_id = %ctx.request_id,
            backend_id = %result.backend,
            elapsed_seconds = result.elapsed.as_secs_f64(),
            attempts = result.attempts,
            over_sla = result.over_sla,
            "Processed request"
        );

        Ok(ProcessingResponse {
            request_id: ctx.request_id,
            output: result.output,
            backend: result.backend,
            elapsed: result.elapsed,
            over_sla: result.over_sla,
            attempts: result.attempts,
            variant: ctx.variant,
        })
    }

    fn experiment_is_active(&self, experiment_id: &str) -> bool {
        self.assigner
            .experiment(experiment_id)
            .is_ok_and(|e| e.is_active(Utc::now()))
    }

    /// Run the init hook of every backend that declares one.
    ///
    /// A failing hook marks the backend Failed; it recovers through a forced
    /// attempt or an operator reset.
    pub async fn initialize_all(&self) -> Vec<(String, HealthState)> {
        let mut results = Vec::new();
        for entry in self
            .registry
            .entries()
            .into_iter()
            .filter(|e| e.descriptor.requires_init)
        {
            let id = entry.descriptor.id.clone();
            let outcome = entry.backend.initialize().await.map_err(|e| e.to_string());
            if let Err(error) = &outcome {
                tracing::error!(backend_id = %id, error = %error, "Backend init hook failed");
            } else {
                tracing::info!(backend_id = %id, "Backend initialized");
            }
            let state = self.health.record_init(&id, outcome);
            results.push((id, state));
        }
        results
    }

    /// Probe every backend once.
    pub async fn probe_backends(&self) -> Vec<(String, HealthState)> {
        HealthProber::new(Arc::clone(&self.registry), Arc::clone(&self.health))
            .probe_all()
            .await
    }

    /// Operator reset of one backend (or all) to Unknown.
    pub fn reset_health(&self, backend_id: Option<&str>) {
        self.health.reset(backend_id);
    }

    /// Start the monitor's evaluation task and, when enabled, the health prober.
    pub fn start_background(&self, cancel_token: CancellationToken) -> Vec<JoinHandle<()>> {
        let monitor_task = MonitorTask::new(Arc::clone(&self.monitor));
        let mut handles = vec![monitor_task.start(cancel_token.clone())];
        if self.config.health.probe_enabled {
            let prober = HealthProber::new(Arc::clone(&self.registry), Arc::clone(&self.health));
            handles.push(prober.start(cancel_token));
        }
        handles
    }

    /// Stream of every outcome record, best-effort.
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<OutcomeRecord> {
        self.monitor.subscribe()
    }

    pub fn add_alert_sink(&self, sink: Arc<dyn AlertSink>) {
        self.monitor.add_sink(sink);
    }

    /// Register or replace an experiment at runtime.
    pub fn register_experiment(&self, experiment: ExperimentConfig) -> Result<(), ExperimentError> {
        for allocation in &experiment.variants {
            self.assigner.resolve_backend(allocation.variant)?;
        }
        self.assigner.register_experiment(experiment)
    }

    /// Variant for a session without processing anything.
    pub fn assign_variant(&self, session_id: &str, experiment_id: &str) -> Variant {
        self.assigner.assign(session_id, experiment_id)
    }

    pub fn current_stats(&self) -> CurrentStats {
        self.monitor.current_stats()
    }

    /// Variant comparison for a registered experiment.
    pub fn variant_analysis(
        &self,
        experiment_id: &str,
        window_hours: u64,
    ) -> Result<VariantAnalysis, ExperimentError> {
        let experiment = self.assigner.experiment(experiment_id)?;
        Ok(self.monitor.variant_analysis(&experiment, window_hours))
    }

    /// Health of every backend, in registration order.
    pub fn health_report(&self) -> HealthReport {
        let backends = self
            .registry
            .list()
            .iter()
            .map(|d| BackendHealthReport::new(d, self.health.backend_state(&d.id)))
            .collect();
        HealthReport::new(backends)
    }

    pub fn performance_report(&self) -> PerformanceReport {
        self.monitor.performance_report()
    }

    pub fn config(&self) -> &CutoutConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }
}
