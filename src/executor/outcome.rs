//! Outcome records emitted once per backend attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::experiment::Variant;
use crate::processor::ErrorClass;

/// Experiment arm a request was served under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantTag {
    pub experiment_id: String,
    pub variant: Variant,
}

impl VariantTag {
    pub fn new(experiment_id: impl Into<String>, variant: Variant) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            variant,
        }
    }
}

/// Per-request context carried into every outcome record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub variant: Option<VariantTag>,
}

impl RequestContext {
    /// Context for a request outside any experiment.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: VariantTag) -> Self {
        self.variant = Some(variant);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

mod latency_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(latency.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}

/// One immutable fact about a single backend attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub request_id: Uuid,
    pub backend: String,
    pub variant: Option<VariantTag>,
    #[serde(rename = "latency_seconds", with = "latency_seconds")]
    pub latency: Duration,
    pub success: bool,
    /// Succeeded, but slower than the SLA target
    pub over_sla: bool,
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub timestamp: DateTime<Utc>,
    pub error_class: Option<ErrorClass>,
}

impl OutcomeRecord {
    /// Record for a successful attempt.
    pub fn success(
        ctx: &RequestContext,
        backend: impl Into<String>,
        latency: Duration,
        over_sla: bool,
        input_bytes: usize,
        output_bytes: usize,
    ) -> Self {
        Self {
            request_id: ctx.request_id,
            backend: backend.into(),
            variant: ctx.variant.clone(),
            latency,
            success: true,
            over_sla,
            input_bytes,
            output_bytes,
            timestamp: Utc::now(),
            error_class: None,
        }
    }

    /// Record for a failed or timed-out attempt.
    pub fn failure(
        ctx: &RequestContext,
        backend: impl Into<String>,
        latency: Duration,
        input_bytes: usize,
        error_class: ErrorClass,
    ) -> Self {
        Self {
            request_id: ctx.request_id,
            backend: backend.into(),
            variant: ctx.variant.clone(),
            latency,
            success: false,
            over_sla: false,
            input_bytes,
            output_bytes: 0,
            timestamp: Utc::now(),
            error_class: Some(error_class),
        }
    }

    pub fn latency_seconds(&self) -> f64 {
        self.latency.as_secs_f64()
    }

    /// Whether the attempt succeeded strictly under `sla`.
    pub fn hit_sla(&self, sla: Duration) -> bool {
        self.success && self.latency < sla
    }

    /// Builder used by tests and replay tooling to backdate a record.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Consumer of outcome records.
///
/// Called synchronously from the request path, so implementations must not
/// block.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, record: OutcomeRecord);
}
