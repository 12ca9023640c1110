use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::processor::ProcessingBackend;

/// Coarse quality/speed bucket a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Fast, reliable default processing
    Primary,
    /// Quality over speed (complex backgrounds, edge detail)
    HighQuality,
    /// Low-latency interactive refinement
    Interactive,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Primary => write!(f, "primary"),
            Tier::HighQuality => write!(f, "high_quality"),
            Tier::Interactive => write!(f, "interactive"),
        }
    }
}

/// Static description of a processing backend.
///
/// Descriptors are created at startup and never mutated, which keeps ordering
/// decisions reproducible for the lifetime of the process.
///
/// # Examples
///
/// ```
/// use cutout::registry::{BackendDescriptor, Tier};
///
/// let descriptor = BackendDescriptor::new("modnet", Tier::Primary, 2, 1.5);
/// assert_eq!(descriptor.id, "modnet");
/// assert_eq!(descriptor.expected_latency().as_millis(), 1500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique identity (e.g. "rembg_isnet")
    pub id: String,
    /// Quality/speed tier
    pub tier: Tier,
    /// Routing priority (lower = tried first)
    pub priority: i32,
    /// Typical processing time in seconds
    pub expected_latency_seconds: f64,
    /// Free-form capability tags (e.g. "portrait", "edge-detail")
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Run the backend's init hook at startup
    #[serde(default)]
    pub requires_init: bool,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

impl BackendDescriptor {
    /// Create a descriptor with no capability tags and no init hook.
    pub fn new(id: impl Into<String>, tier: Tier, priority: i32, expected_latency_seconds: f64) -> Self {
        Self {
            id: id.into(),
            tier,
            priority,
            expected_latency_seconds,
            capabilities: BTreeSet::new(),
            requires_init: false,
            description: String::new(),
        }
    }

    /// Add capability tags.
    pub fn with_capabilities<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Mark the backend as requiring its init hook at startup.
    pub fn with_init_hook(mut self) -> Self {
        self.requires_init = true;
        self
    }

    /// Expected latency as a `Duration` (zero for invalid values).
    pub fn expected_latency(&self) -> Duration {
        Duration::try_from_secs_f64(self.expected_latency_seconds).unwrap_or(Duration::ZERO)
    }
}

/// A descriptor paired with its processing capability.
#[derive(Clone)]
pub struct RegisteredBackend {
    pub descriptor: BackendDescriptor,
    pub backend: Arc<dyn ProcessingBackend>,
    /// Position in registration order (ordering tie-breaker)
    pub registration_index: usize,
}

impl std::fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("descriptor", &self.descriptor)
            .field("registration_index", &self.registration_index)
            .finish_non_exhaustive()
    }
}
