//! Experiment assignment module.
//!
//! Buckets sessions into experiment variants with a stable hash and resolves
//! each variant to the backend it exercises. Assignments are memoized per
//! `(experiment, session)` so a session keeps its variant for the life of the
//! process even if allocations change afterwards. The memo is only a cache:
//! recomputing an assignment from the hash always yields the same variant for
//! unchanged allocations.

mod config;
mod error;
pub mod hash;


pub use config::*;
pub use error::*;

use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;

/// Deterministic session-to-variant assigner.
pub struct ExperimentAssigner {
    experiments: DashMap<String, ExperimentConfig>,
    bindings: HashMap<Variant, String>,
    assignments: DashMap<(String, String), Variant>,
}

impl ExperimentAssigner {
    /// Create an assigner with the given variant bindings and no experiments.
    ///
    /// A variant bound twice keeps its last binding.
    pub fn new(bindings: Vec<VariantBinding>) -> Self {
        Self {
            experiments: DashMap::new(),
            bindings: bindings
                .into_iter()
                .map(|b| (b.variant, b.backend))
                .collect(),
            assignments: DashMap::new(),
        }
    }

    /// Register (or replace) an experiment after validating its allocation.
    ///
    /// Existing assignments are kept, so replacing an experiment never moves a
    /// session that was already bucketed.
    pub fn register_experiment(&self, config: ExperimentConfig) -> Result<(), ExperimentError> {
        config.validate()?;
        tracing::info!(
            experiment_id = %config.id,
            variants = config.variants.len(),
            enabled = config.enabled,
            "Registered experiment"
        );
        self.experiments.insert(config.id.clone(), config);
        Ok(())
    }

    /// Variant for a session.
    ///
    /// Unknown, disabled or ended experiments yield [`Variant::Control`]
    /// without recording an assignment.
    pub fn assign(&self, session_id: &str, experiment_id: &str) -> Variant {
        let computed = {
            let Some(experiment) = self.experiments.get(experiment_id) else {
                tracing::debug!(experiment_id, "Unknown experiment, using control");
                return Variant::Control;
            };
            if !experiment.is_active(Utc::now()) {
                return Variant::Control;
            }

            let key = (experiment_id.to_string(), session_id.to_string());
            if let Some(existing) = self.assignments.get(&key) {
                return *existing;
            }

            experiment.variant_at(hash::bucket(session_id, experiment_id))
        };

        let key = (experiment_id.to_string(), session_id.to_string());
        let variant = *self.assignments.entry(key).or_insert(computed);
        tracing::debug!(
            experiment_id,
            session = %hash::anonymize(session_id),
            variant = %variant,
            "Assigned session to variant"
        );
        variant
    }

    /// Memoized assignment, if the session has one.
    pub fn assignment(&self, session_id: &str, experiment_id: &str) -> Option<Variant> {
        self.assignments
            .get(&(experiment_id.to_string(), session_id.to_string()))
            .map(|v| *v)
    }

    /// Number of memoized assignments for an experiment.
    pub fn assignment_count(&self, experiment_id: &str) -> usize {
        self.assignments
            .iter()
            .filter(|entry| entry.key().0 == experiment_id)
            .count()
    }

    /// Backend bound to a variant.
    pub fn resolve_backend(&self, variant: Variant) -> Result<String, ExperimentError> {
        self.bindings
            .get(&variant)
            .cloned()
            .ok_or(ExperimentError::UnknownVariant(variant))
    }

    /// Look up an experiment by identity.
    pub fn experiment(&self, experiment_id: &str) -> Result<ExperimentConfig, ExperimentError> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.clone())
            .ok_or_else(|| ExperimentError::UnknownExperiment(experiment_id.to_string()))
    }

    /// All experiments, sorted by identity.
    pub fn experiments(&self) -> Vec<ExperimentConfig> {
        let mut all: Vec<ExperimentConfig> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Variant bindings, sorted by variant.
    pub fn bindings(&self) -> Vec<VariantBinding> {
        let mut all: Vec<VariantBinding> = self
            .bindings
            .iter()
            .map(|(variant, backend)| VariantBinding::new(*variant, backend.clone()))
            .collect();
        all.sort_by_key(|b| b.variant);
        all
    }
}

impl Default for ExperimentAssigner {
    fn default() -> Self {
        Self::new(default_variant_bindings())
    }
}
