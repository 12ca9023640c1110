//! Scoring function for candidate ordering

use serde::{Deserialize, Serialize};

use crate::health::HealthState;
use crate::registry::{BackendDescriptor, Tier};

use super::{OrderingRequest, ProcessingMode};

/// Adjustments applied to a backend's priority when ordering candidates.
///
/// Bonuses are subtracted and penalties added, so a lower score is tried
/// earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingWeights {
    /// Bonus when the backend's tier matches the request's preferred tier
    pub preferred_tier_bonus: i64,

    /// Bonus for the experiment-assigned backend
    pub preferred_backend_bonus: i64,

    /// Quality mode: bonus for every HighQuality-tier backend
    pub quality_tier_bonus: i64,

    /// Quality mode: extra bonus for the flagship backend
    pub flagship_bonus: i64,

    /// Speed mode: bonus for backends at or under `fast_threshold_seconds`
    pub speed_bonus: i64,

    /// Expected latency considered fast in speed mode
    pub fast_threshold_seconds: f64,

    /// Penalty for Degraded backends
    pub degraded_penalty: i64,

    /// Penalty for Failed backends (kept as a last resort, never removed)
    pub failed_penalty: i64,

    /// Explicit flagship identity; defaults to the best-priority HighQuality backend
    pub quality_flagship: Option<String>,
}

impl Default for OrderingWeights {
    fn default() -> Self {
        Self {
            preferred_tier_bonus: 10,
            preferred_backend_bonus: 20,
            quality_tier_bonus: 5,
            flagship_bonus: 3,
            speed_bonus: 3,
            fast_threshold_seconds: 2.0,
            degraded_penalty: 5,
            failed_penalty: 100,
            quality_flagship: None,
        }
    }
}

impl OrderingWeights {
    /// Validate that no adjustment is negative
    pub fn validate(&self) -> Result<(), String> {
        let adjustments = [
            ("preferred_tier_bonus", self.preferred_tier_bonus),
            ("preferred_backend_bonus", self.preferred_backend_bonus),
            ("quality_tier_bonus", self.quality_tier_bonus),
            ("flagship_bonus", self.flagship_bonus),
            ("speed_bonus", self.speed_bonus),
            ("degraded_penalty", self.degraded_penalty),
            ("failed_penalty", self.failed_penalty),
        ];
        if let Some((name, value)) = adjustments.iter().find(|(_, v)| *v < 0) {
            return Err(format!("{} must not be negative, got {}", name, value));
        }
        if !self.fast_threshold_seconds.is_finite() || self.fast_threshold_seconds < 0.0 {
            return Err(format!(
                "fast_threshold_seconds must be a non-negative number, got {}",
                self.fast_threshold_seconds
            ));
        }
        Ok(())
    }
}

/// Score one candidate. Lower is tried first.
///
/// `flagship` is the identity of the single highest-quality backend, if any.
pub fn score_candidate(
    descriptor: &BackendDescriptor,
    request: &OrderingRequest,
    health: HealthState,
    flagship: Option<&str>,
    weights: &OrderingWeights,
) -> i64 {
    let mut score = i64::from(descriptor.priority);

    if request.preferred_tier == Some(descriptor.tier) {
        score -= weights.preferred_tier_bonus;
    }

    if request.preferred_backend.as_deref() == Some(descriptor.id.as_str()) {
        score -= weights.preferred_backend_bonus;
    }

    match request.mode {
        ProcessingMode::Quality => {
            if descriptor.tier == Tier::HighQuality {
                score -= weights.quality_tier_bonus;
                if flagship == Some(descriptor.id.as_str()) {
                    score -= weights.flagship_bonus;
                }
            }
        }
        ProcessingMode::Speed => {
            if descriptor.expected_latency_seconds <= weights.fast_threshold_seconds {
                score -= weights.speed_bonus;
            }
        }
    }

    match health {
        HealthState::Degraded => score += weights.degraded_penalty,
        HealthState::Failed => score += weights.failed_penalty,
        HealthState::Healthy | HealthState::Unknown => {}
    }

    score
}
