use thiserror::Error;

use crate::executor::ExecutionError;
use crate::experiment::ExperimentError;
use crate::registry::RegistryError;

/// Failure of a single processing request.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Variant resolution failed; configuration error, never retried
    #[error(transparent)]
    Experiment(#[from] ExperimentError),

    /// A variant is bound to an unregistered backend
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
