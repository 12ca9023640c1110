//! Candidate ordering for processing requests
//!
//! This module turns a request's mode preference, the experiment's preferred
//! backend and the current health snapshot into a ranked list of backend
//! identities. Ordering is a pure function of its inputs: it never reads
//! shared state on its own and never removes a backend from the list, so a
//! registry where every backend has failed still yields candidates.

pub mod mode;
pub mod scoring;


pub use mode::{recommended_backend, ImageComplexity, ProcessingMode};
pub use scoring::{score_candidate, OrderingWeights};

use crate::health::HealthSnapshot;
use crate::registry::{BackendDescriptor, Registry, Tier};

/// Per-request inputs to candidate ordering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderingRequest {
    /// Speed or quality preference
    pub mode: ProcessingMode,

    /// Tier hint, typically derived from the assigned experiment variant
    pub preferred_tier: Option<Tier>,

    /// Backend bound to the assigned experiment variant
    pub preferred_backend: Option<String>,
}

impl OrderingRequest {
    pub fn new(mode: ProcessingMode) -> Self {
        Self {
            mode,
            preferred_tier: None,
            preferred_backend: None,
        }
    }

    pub fn with_preferred_tier(mut self, tier: Tier) -> Self {
        self.preferred_tier = Some(tier);
        self
    }

    pub fn with_preferred_backend(mut self, backend_id: impl Into<String>) -> Self {
        self.preferred_backend = Some(backend_id.into());
        self
    }
}

/// Identity of the single highest-quality backend.
///
/// An explicitly configured flagship wins when it is registered; otherwise
/// the HighQuality backend with the lowest priority number is used, ties
/// going to the earlier registration.
pub fn resolve_flagship<'a>(
    descriptors: &'a [BackendDescriptor],
    weights: &'a OrderingWeights,
) -> Option<&'a str> {
    if let Some(configured) = weights.quality_flagship.as_deref() {
        if descriptors.iter().any(|d| d.id == configured) {
            return Some(configured);
        }
    }

    descriptors
        .iter()
        .filter(|d| d.tier == Tier::HighQuality)
        .min_by_key(|d| d.priority)
        .map(|d| d.id.as_str())
}

/// Rank `descriptors` (given in registration order) for one request.
///
/// Sorts ascending by [`score_candidate`]; the sort is stable so equal
/// scores keep registration order.
pub fn order_candidates(
    descriptors: &[BackendDescriptor],
    request: &OrderingRequest,
    health: &HealthSnapshot,
    weights: &OrderingWeights,
) -> Vec<String> {
    let flagship = resolve_flagship(descriptors, weights);

    let mut scored: Vec<(i64, &BackendDescriptor)> = descriptors
        .iter()
        .map(|d| {
            let score = score_candidate(d, request, health.get(&d.id), flagship, weights);
            (score, d)
        })
        .collect();

    scored.sort_by_key(|(score, _)| *score);

    scored.into_iter().map(|(_, d)| d.id.clone()).collect()
}

/// Ordering policy bound to a fixed set of weights.
#[derive(Debug, Clone, Default)]
pub struct OrderingPolicy {
    weights: OrderingWeights,
}

impl OrderingPolicy {
    pub fn new(weights: OrderingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &OrderingWeights {
        &self.weights
    }

    /// Rank every registered backend for one request.
    pub fn order(
        &self,
        registry: &Registry,
        request: &OrderingRequest,
        health: &HealthSnapshot,
    ) -> Vec<String> {
        let descriptors = registry.list();
        let order = order_candidates(&descriptors, request, health, &self.weights);
        tracing::debug!(
            mode = %request.mode,
            preferred_backend = ?request.preferred_backend,
            candidates = ?order,
            "Ordered processing candidates"
        );
        order
    }
}
