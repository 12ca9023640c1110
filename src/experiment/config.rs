//! Experiment definitions and variant bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ExperimentError;

/// Tolerance for allocation weights summing to one.
pub const ALLOCATION_EPSILON: f64 = 1e-6;

/// One arm of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Control,
    VariantA,
    VariantB,
    VariantC,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Control,
        Variant::VariantA,
        Variant::VariantB,
        Variant::VariantC,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Control => "control",
            Variant::VariantA => "variant_a",
            Variant::VariantB => "variant_b",
            Variant::VariantC => "variant_c",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic share of one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAllocation {
    pub variant: Variant,
    pub weight: f64,
}

impl VariantAllocation {
    pub fn new(variant: Variant, weight: f64) -> Self {
        Self { variant, weight }
    }
}

/// Maps a variant to the backend it exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantBinding {
    pub variant: Variant,
    pub backend: String,
}

impl VariantBinding {
    pub fn new(variant: Variant, backend: impl Into<String>) -> Self {
        Self {
            variant,
            backend: backend.into(),
        }
    }
}

fn default_minimum_sample_size() -> usize {
    100
}

fn default_confidence_level() -> f64 {
    0.95
}

fn default_enabled() -> bool {
    true
}

/// An A/B experiment over processing backends.
///
/// Variants are walked in declaration order when bucketing sessions, so the
/// order of `variants` is part of the experiment's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub variants: Vec<VariantAllocation>,
    /// Samples a variant needs before its results count as significant
    #[serde(default = "default_minimum_sample_size")]
    pub minimum_sample_size: usize,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl ExperimentConfig {
    /// Create an enabled experiment with default sample size and confidence.
    pub fn new(id: impl Into<String>, variants: Vec<VariantAllocation>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            variants,
            minimum_sample_size: default_minimum_sample_size(),
            confidence_level: default_confidence_level(),
            enabled: true,
            start_time: None,
            end_time: None,
        }
    }

    /// The built-in comparison across the production matting engines.
    pub fn library_performance_comparison() -> Self {
        Self {
            name: "Background Removal Library Performance Comparison".to_string(),
            description: "Compare processing time and success rate across matting engines"
                .to_string(),
            ..Self::new(
                "library_performance_comparison",
                vec![
                    VariantAllocation::new(Variant::Control, 0.4),
                    VariantAllocation::new(Variant::VariantA, 0.3),
                    VariantAllocation::new(Variant::VariantB, 0.2),
                    VariantAllocation::new(Variant::VariantC, 0.1),
                ],
            )
        }
    }

    /// Whether sessions should currently be bucketed into this experiment.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.start_time.map_or(true, |start| start <= now)
            && self.end_time.map_or(true, |end| now < end)
    }

    /// Declared weight of a variant (zero if absent).
    pub fn weight_of(&self, variant: Variant) -> f64 {
        self.variants
            .iter()
            .find(|a| a.variant == variant)
            .map_or(0.0, |a| a.weight)
    }

    /// Check allocation weights: non-empty, no duplicates, non-negative and
    /// summing to one within [`ALLOCATION_EPSILON`].
    pub fn validate(&self) -> Result<(), ExperimentError> {
        let invalid = |message: String| ExperimentError::InvalidAllocation {
            experiment: self.id.clone(),
            message,
        };

        if self.variants.is_empty() {
            return Err(invalid("no variants declared".to_string()));
        }

        let mut seen = HashSet::new();
        for allocation in &self.variants {
            if !seen.insert(allocation.variant) {
                return Err(invalid(format!(
                    "variant {} declared more than once",
                    allocation.variant
                )));
            }
            if !allocation.weight.is_finite() || allocation.weight < 0.0 {
                return Err(invalid(format!(
                    "variant {} has invalid weight {}",
                    allocation.variant, allocation.weight
                )));
            }
        }

        let total: f64 = self.variants.iter().map(|a| a.weight).sum();
        if (total - 1.0).abs() > ALLOCATION_EPSILON {
            return Err(invalid(format!("weights sum to {}, expected 1.0", total)));
        }

        if !(0.0..1.0).contains(&self.confidence_level) || self.confidence_level == 0.0 {
            return Err(invalid(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }

        Ok(())
    }

    /// Variant covering `position` in `[0, 1)`.
    ///
    /// Walks variants in declaration order and returns the first whose
    /// cumulative weight exceeds `position`. Floating-point residue at the
    /// top of the range falls back to control.
    pub fn variant_at(&self, position: f64) -> Variant {
        let mut cumulative = 0.0;
        for allocation in &self.variants {
            cumulative += allocation.weight;
            if position < cumulative {
                return allocation.variant;
            }
        }
        Variant::Control
    }
}

/// Default variant bindings for the production engines.
pub fn default_variant_bindings() -> Vec<VariantBinding> {
    vec![
        VariantBinding::new(Variant::Control, "rembg_isnet"),
        VariantBinding::new(Variant::VariantA, "rembg_u2net"),
        VariantBinding::new(Variant::VariantB, "modnet"),
        VariantBinding::new(Variant::VariantC, "bgmatting_v2"),
    ]
}
