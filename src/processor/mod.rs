//! Processing backend abstraction.
//!
//! A processing backend turns input image bytes into output image bytes. The
//! orchestrator treats every engine (rembg, MODNet, BackgroundMattingV2, ...)
//! as an opaque capability behind the [`ProcessingBackend`] trait and imposes
//! its own time budget on every call.

use async_trait::async_trait;

pub mod error;

pub use error::{ErrorClass, ProcessorError};

/// Unified interface for all background-removal engines.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn ProcessingBackend>`.
///
/// # Cancellation Safety
///
/// `process` has no built-in timeout. The executor wraps it in
/// `tokio::time::timeout` and drops the future on expiry, so implementations
/// must release their resources when dropped mid-flight.
#[async_trait]
pub trait ProcessingBackend: Send + Sync + 'static {
    /// Process one payload.
    async fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessorError>;

    /// Init hook, run once at startup for backends registered with `requires_init`.
    async fn initialize(&self) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Lightweight probe. `Ok(false)` means the engine answered but reports
    /// sub-par condition.
    async fn health_check(&self) -> Result<bool, ProcessorError> {
        Ok(true)
    }
}
