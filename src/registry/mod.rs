//! Backend Registry module.
//!
//! Provides thread-safe in-memory storage of processing backends and their
//! static descriptors. Topology is fixed once registered: there is no update or
//! removal path, so a restart is required to change tiers or priorities.

mod backend;
mod error;
#[cfg(test)]
mod tests;

pub use backend::*;
pub use error::*;

use crate::processor::ProcessingBackend;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The Backend Registry stores all known processing backends.
///
/// Uses a concurrent map (DashMap) so lookups on the request path never
/// contend on a single lock.
///
/// # Examples
///
/// ```
/// use cutout::processor::{ProcessingBackend, ProcessorError};
/// use cutout::registry::{BackendDescriptor, Registry, Tier};
/// use std::sync::Arc;
///
/// struct Passthrough;
///
/// #[async_trait::async_trait]
/// impl ProcessingBackend for Passthrough {
///     async fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessorError> {
///         Ok(input.to_vec())
///     }
/// }
///
/// let registry = Registry::new();
/// let descriptor = BackendDescriptor::new("rembg_isnet", Tier::Primary, 1, 2.0);
///
/// registry.register(descriptor, Arc::new(Passthrough)).unwrap();
/// assert_eq!(registry.len(), 1);
/// ```
pub struct Registry {
    backends: DashMap<String, RegisteredBackend>,
    next_index: AtomicUsize,
}

impl Registry {
    /// Create a new empty Registry.
    pub fn new() -> Self {
        Self {
            backends: DashMap::new(),
            next_index: AtomicUsize::new(0),
        }
    }

    /// Register a backend.
    ///
    /// Re-registering an identity with an identical descriptor is a no-op, so
    /// configuration collaborators may replay their registrations safely.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateBackend` if the identity is already
    /// registered with a different descriptor.
    pub fn register(
        &self,
        descriptor: BackendDescriptor,
        backend: Arc<dyn ProcessingBackend>,
    ) -> Result<(), RegistryError> {
        match self.backends.entry(descriptor.id.clone()) {
            Entry::Occupied(existing) => {
                if existing.get().descriptor == descriptor {
                    tracing::debug!(
                        backend_id = %descriptor.id,
                        "Backend re-registered with unchanged descriptor"
                    );
                    Ok(())
                } else {
                    Err(RegistryError::DuplicateBackend(descriptor.id))
                }
            }
            Entry::Vacant(slot) => {
                let registration_index = self.next_index.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    backend_id = %descriptor.id,
                    tier = %descriptor.tier,
                    priority = descriptor.priority,
                    "Registered processing backend"
                );
                slot.insert(RegisteredBackend {
                    descriptor,
                    backend,
                    registration_index,
                });
                Ok(())
            }
        }
    }

    /// Get a backend descriptor by identity.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownBackend` if no backend with the given ID exists.
    pub fn get(&self, id: &str) -> Result<BackendDescriptor, RegistryError> {
        self.backends
            .get(id)
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| RegistryError::UnknownBackend(id.to_string()))
    }

    /// Get the processing capability for a backend.
    pub fn backend(&self, id: &str) -> Result<Arc<dyn ProcessingBackend>, RegistryError> {
        self.backends
            .get(id)
            .map(|entry| Arc::clone(&entry.backend))
            .ok_or_else(|| RegistryError::UnknownBackend(id.to_string()))
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> Vec<BackendDescriptor> {
        self.entries().into_iter().map(|e| e.descriptor).collect()
    }

    /// All registered backends in registration order.
    pub fn entries(&self) -> Vec<RegisteredBackend> {
        let mut entries: Vec<RegisteredBackend> = self
            .backends
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|e| e.registration_index);
        entries
    }

    /// Whether an identity is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    /// Get the number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns true if no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
