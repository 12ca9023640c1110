//! Error types for processing backends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a processing backend may raise while handling a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// Backend ran out of memory (model too large for the image, GPU OOM, ...).
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Input could not be decoded.
    #[error("invalid image format: {0}")]
    InvalidFormat(String),

    /// Input dimensions or byte size rejected by the engine.
    #[error("invalid image size: {0}")]
    InvalidSize(String),

    /// Remote engine unreachable.
    #[error("network error: {0}")]
    Network(String),

    /// Engine refused access to a resource (model file, device).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Engine is not initialized or has been unloaded.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Any other failure, carrying the engine's message.
    #[error("processing failed: {0}")]
    Failed(String),
}

/// Coarse error category attached to outcome records.
///
/// Categories never carry the underlying message so they are safe to export
/// as metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    Memory,
    FormatError,
    SizeError,
    Network,
    Permission,
    Unknown,
}

impl ErrorClass {
    /// Classify a free-form error message by keyword.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("timeout") || lower.contains("time") {
            ErrorClass::Timeout
        } else if lower.contains("memory") || lower.contains("oom") {
            ErrorClass::Memory
        } else if lower.contains("format") || lower.contains("decode") {
            ErrorClass::FormatError
        } else if lower.contains("size") || lower.contains("dimension") {
            ErrorClass::SizeError
        } else if lower.contains("network") || lower.contains("connection") {
            ErrorClass::Network
        } else if lower.contains("permission") || lower.contains("access") {
            ErrorClass::Permission
        } else {
            ErrorClass::Unknown
        }
    }

    /// Stable lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::Memory => "memory",
            ErrorClass::FormatError => "format_error",
            ErrorClass::SizeError => "size_error",
            ErrorClass::Network => "network",
            ErrorClass::Permission => "permission",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessorError {
    /// Category of this error for outcome records.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProcessorError::OutOfMemory(_) => ErrorClass::Memory,
            ProcessorError::InvalidFormat(_) => ErrorClass::FormatError,
            ProcessorError::InvalidSize(_) => ErrorClass::SizeError,
            ProcessorError::Network(_) => ErrorClass::Network,
            ProcessorError::PermissionDenied(_) => ErrorClass::Permission,
            ProcessorError::Unavailable(message) | ProcessorError::Failed(message) => {
                ErrorClass::from_message(message)
            }
        }
    }
}
