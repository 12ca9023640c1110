//! Fallback execution across ranked processing backends.
//!
//! Candidates are attempted strictly one after another; a request never
//! dispatches to two backends at once. Every attempt produces exactly one
//! [`OutcomeRecord`] and one health update, whatever its result.

mod config;
mod error;
mod outcome;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::*;
pub use outcome::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::health::{HealthSignal, HealthState, HealthTracker};
use crate::processor::ProcessingBackend;
use crate::registry::Registry;

/// Output of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub output: Vec<u8>,
    /// Backend that produced `output`
    pub backend: String,
    /// Wall-clock time across all attempts
    pub elapsed: Duration,
    /// The returned attempt succeeded but missed the SLA target
    pub over_sla: bool,
    /// Attempts made, including the returned one
    pub attempts: usize,
}

/// A slow success held back while better candidates are tried.
struct SlowSuccess {
    output: Vec<u8>,
    backend: String,
    latency: Duration,
}

enum AttemptOutcome {
    WithinSla(Vec<u8>),
    OverSla(Vec<u8>, Duration),
    Failed(AttemptError),
}

/// Walks a ranked candidate list until one backend qualifies.
pub struct FallbackExecutor {
    registry: Arc<Registry>,
    health: Arc<HealthTracker>,
    sink: Arc<dyn OutcomeSink>,
    sla: Duration,
}

impl FallbackExecutor {
    /// Create an executor. `sla` is the latency a success must meet to end
    /// the search immediately.
    pub fn new(
        registry: Arc<Registry>,
        health: Arc<HealthTracker>,
        sink: Arc<dyn OutcomeSink>,
        sla: Duration,
    ) -> Self {
        Self {
            registry,
            health,
            sink,
            sla,
        }
    }

    pub fn sla(&self) -> Duration {
        self.sla
    }

    /// Attempt `candidates` in order under a hard per-attempt `budget`.
    ///
    /// Candidates currently Failed are skipped. If that leaves nothing to
    /// try, every candidate is attempted as a forced last resort, which is
    /// the only way a Failed backend can recover without a reset.
    ///
    /// A success within the SLA returns immediately. A slower success is
    /// kept (the fastest one wins) and returned only if no later candidate
    /// qualifies before attempts run out.
    ///
    /// Dropping the returned future cancels the in-flight backend call.
    /// Records already emitted are not retracted.
    ///
    /// # Errors
    ///
    /// `ExecutionError::Registry` if any candidate is unregistered (checked
    /// before the first attempt); `ExecutionError::AllBackendsExhausted` if
    /// no attempt produced output.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        payload: &[u8],
        candidates: &[String],
        budget: Duration,
        max_attempts: usize,
    ) -> Result<ExecutionResult, ExecutionError> {
        let mut resolved = Vec::with_capacity(candidates.len());
        for id in candidates {
            resolved.push((id.as_str(), self.registry.backend(id)?));
        }

        let max_attempts = max_attempts.max(1);
        let started = Instant::now();
        let mut attempts = 0usize;
        let mut last_error: Option<AttemptError> = None;
        let mut slow: Option<SlowSuccess> = None;

        let eligible: Vec<_> = resolved
            .iter()
            .filter(|(id, _)| self.health.state(id) != HealthState::Failed)
            .collect();
        let forced = eligible.is_empty() && !resolved.is_empty();
        let pass: Vec<_> = if forced {
            tracing::warn!(
                request_id = %ctx.request_id,
                candidates = resolved.len(),
                "All candidates failed, attempting last resort"
            );
            resolved.iter().collect()
        } else {
            eligible
        };

        for (backend_id, backend) in pass {
            if attempts >= max_attempts {
                break;
            }
            if attempts > 0 {
                metrics::counter!("cutout_fallbacks_total").increment(1);
            }
            attempts += 1;

            match self
                .attempt(ctx, backend_id, backend, payload, budget, forced, attempts)
                .await
            {
                AttemptOutcome::WithinSla(output) => {
                    return Ok(ExecutionResult {
                        output,
                        backend: backend_id.to_string(),
                        elapsed: started.elapsed(),
                        over_sla: false,
                        attempts,
                    });
                }
                AttemptOutcome::OverSla(output, latency) => {
                    if slow.as_ref().map_or(true, |s| latency < s.latency) {
                        slow = Some(SlowSuccess {
                            output,
                            backend: backend_id.to_string(),
                            latency,
                        });
                    }
                }
                AttemptOutcome::Failed(error) => last_error = Some(error),
            }
        }

        if let Some(slow) = slow {
            tracing::info!(
                request_id = %ctx.request_id,
                backend_id = %slow.backend,
                latency_seconds = slow.latency.as_secs_f64(),
                attempts,
                "Returning over-SLA result"
            );
            return Ok(ExecutionResult {
                output: slow.output,
                backend: slow.backend,
                elapsed: started.elapsed(),
                over_sla: true,
                attempts,
            });
        }

        tracing::error!(
            request_id = %ctx.request_id,
            attempts,
            last_error = ?last_error.as_ref().map(|e| e.to_string()),
            "All backends exhausted"
        );
        Err(ExecutionError::AllBackendsExhausted {
            attempts,
            last_error,
        })
    }

    /// Run one attempt and emit its health update and outcome record.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        ctx: &RequestContext,
        backend_id: &str,
        backend: &Arc<dyn ProcessingBackend>,
        payload: &[u8],
        budget: Duration,
        forced: bool,
        attempt: usize,
    ) -> AttemptOutcome {
        tracing::debug!(
            request_id = %ctx.request_id,
            backend_id,
            attempt,
            forced,
            "Attempting backend"
        );

        let started = Instant::now();
        let result = tokio::time::timeout(budget, backend.process(payload)).await;
        let latency = started.elapsed();

        metrics::histogram!("cutout_attempt_duration_seconds", "backend" => backend_id.to_string())
            .record(latency.as_secs_f64());

        let (outcome, record, signal, error_message) = match result {
            Ok(Ok(output)) => {
                let over_sla = latency > self.sla;
                let record = OutcomeRecord::success(
                    ctx,
                    backend_id,
                    latency,
                    over_sla,
                    payload.len(),
                    output.len(),
                );
                let signal = HealthSignal::Success {
                    within_sla: !over_sla,
                };
                let outcome = if over_sla {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        backend_id,
                        latency_seconds = latency.as_secs_f64(),
                        sla_seconds = self.sla.as_secs_f64(),
                        "Backend succeeded over SLA"
                    );
                    AttemptOutcome::OverSla(output, latency)
                } else {
                    AttemptOutcome::WithinSla(output)
                };
                (outcome, record, signal, None)
            }
            Ok(Err(source)) => {
                let error = AttemptError::Backend {
                    backend: backend_id.to_string(),
                    source,
                };
                tracing::warn!(
                    request_id = %ctx.request_id,
                    backend_id,
                    error = %error,
                    "Backend attempt failed"
                );
                let record =
                    OutcomeRecord::failure(ctx, backend_id, latency, payload.len(), error.class());
                let message = error.to_string();
                (AttemptOutcome::Failed(error), record, HealthSignal::Error, Some(message))
            }
            Err(_) => {
                let error = AttemptError::Timeout {
                    backend: backend_id.to_string(),
                    budget,
                };
                tracing::warn!(
                    request_id = %ctx.request_id,
                    backend_id,
                    budget_seconds = budget.as_secs_f64(),
                    "Backend attempt timed out"
                );
                let record =
                    OutcomeRecord::failure(ctx, backend_id, latency, payload.len(), error.class());
                let message = error.to_string();
                (AttemptOutcome::Failed(error), record, HealthSignal::Timeout, Some(message))
            }
        };

        let label = match &outcome {
            AttemptOutcome::WithinSla(_) => "success",
            AttemptOutcome::OverSla(..) => "over_sla",
            AttemptOutcome::Failed(AttemptError::Timeout { .. }) => "timeout",
            AttemptOutcome::Failed(AttemptError::Backend { .. }) => "error",
        };
        metrics::counter!(
            "cutout_attempts_total",
            "backend" => backend_id.to_string(),
            "outcome" => label
        )
        .increment(1);

        self.health
            .record_attempt(backend_id, signal, latency, error_message, forced);
        self.sink.record(record);

        outcome
    }
}
