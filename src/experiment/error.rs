use thiserror::Error;

use super::Variant;

/// Errors from experiment configuration and variant resolution.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExperimentError {
    /// No backend is bound to the variant
    #[error("no backend bound to variant {0}")]
    UnknownVariant(Variant),

    /// No experiment with this identity is registered
    #[error("unknown experiment: {0}")]
    UnknownExperiment(String),

    /// Traffic allocation is malformed
    #[error("invalid allocation for experiment {experiment}: {message}")]
    InvalidAllocation { experiment: String, message: String },
}
