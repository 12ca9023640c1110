//! Error types for fallback execution.

use std::time::Duration;
use thiserror::Error;

use crate::processor::{ErrorClass, ProcessorError};
use crate::registry::RegistryError;

/// Why a single backend attempt did not produce output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttemptError {
    /// Attempt ran past its hard budget and was cancelled
    #[error("backend {backend} timed out after {budget:?}")]
    Timeout { backend: String, budget: Duration },

    /// Backend raised an error
    #[error("backend {backend} failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: ProcessorError,
    },
}

impl AttemptError {
    /// Identity of the backend that produced this error.
    pub fn backend(&self) -> &str {
        match self {
            AttemptError::Timeout { backend, .. } | AttemptError::Backend { backend, .. } => {
                backend
            }
        }
    }

    /// Category recorded on the outcome record.
    pub fn class(&self) -> ErrorClass {
        match self {
            AttemptError::Timeout { .. } => ErrorClass::Timeout,
            AttemptError::Backend { source, .. } => source.class(),
        }
    }
}

/// Errors surfaced to the caller of the fallback executor.
#[derive(Debug, Error, PartialEq)]
pub enum ExecutionError {
    /// No attempt produced output
    #[error("all backends exhausted after {attempts} attempt(s){}", last_error_suffix(.last_error))]
    AllBackendsExhausted {
        attempts: usize,
        last_error: Option<AttemptError>,
    },

    /// A candidate identity is not registered
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn last_error_suffix(last_error: &Option<AttemptError>) -> String {
    match last_error {
        Some(e) => format!(": {}", e),
        None => String::new(),
    }
}
