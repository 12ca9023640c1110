//! Health tracking module for processing backends.
//!
//! [`HealthTracker`] owns one [`HealthState`] per backend and moves it only in
//! response to attempt outcomes, probe results, init results or an explicit
//! operator reset. [`HealthProber`] is an optional background task that
//! periodically calls each backend's probe.

mod config;
mod state;


pub use config::*;
pub use state::*;

use crate::registry::{RegisteredBackend, Registry};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Point-in-time copy of every backend's health state.
///
/// Backends without any observation read as [`HealthState::Unknown`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    states: HashMap<String, HealthState>,
}

impl HealthSnapshot {
    /// State of a backend in this snapshot.
    pub fn get(&self, backend_id: &str) -> HealthState {
        self.states
            .get(backend_id)
            .copied()
            .unwrap_or(HealthState::Unknown)
    }

    /// Builder used by callers that assemble snapshots by hand.
    pub fn with(mut self, backend_id: impl Into<String>, state: HealthState) -> Self {
        self.states.insert(backend_id.into(), state);
        self
    }

    /// Number of backends with an explicit state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no backend has been observed.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl FromIterator<(String, HealthState)> for HealthSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, HealthState)>>(iter: T) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}

/// Per-backend health state map.
///
/// Each backend's state lives in its own map entry; writes lock only that
/// entry, so outcomes for independent backends never serialize on each other.
pub struct HealthTracker {
    state: DashMap<String, BackendHealthState>,
    config: HealthConfig,
}

impl HealthTracker {
    /// Create an empty tracker.
    pub fn new(config: HealthConfig) -> Self {
        Self {
            state: DashMap::new(),
            config,
        }
    }

    /// Record one backend attempt and apply its health signal.
    ///
    /// Returns the backend's state after the update.
    pub fn record_attempt(
        &self,
        backend_id: &str,
        signal: HealthSignal,
        latency: Duration,
        error: Option<String>,
        forced: bool,
    ) -> HealthState {
        let mut entry = self.state.entry(backend_id.to_string()).or_default();
        let previous = entry.state;

        entry.record_attempt(signal, latency, error, self.config.latency_window);
        if let Some(new_state) = entry.apply_signal(signal, forced) {
            tracing::info!(
                backend_id = backend_id,
                old_state = %previous,
                new_state = %new_state,
                forced,
                "Backend health changed"
            );
        }

        entry.state
    }

    /// Apply a probe result. Probes never count as attempts.
    pub fn record_probe(&self, backend_id: &str, healthy: bool) -> HealthState {
        let mut entry = self.state.entry(backend_id.to_string()).or_default();
        if healthy {
            return entry.state;
        }

        let previous = entry.state;
        if let Some(new_state) = entry.apply_signal(HealthSignal::ProbeDegraded, false) {
            tracing::warn!(
                backend_id = backend_id,
                old_state = %previous,
                new_state = %new_state,
                "Health probe reported sub-par backend"
            );
        }
        entry.state
    }

    /// Apply the result of a backend's init hook.
    pub fn record_init(&self, backend_id: &str, result: Result<(), String>) -> HealthState {
        let mut entry = self.state.entry(backend_id.to_string()).or_default();
        match result {
            Ok(()) => {
                entry.apply_signal(HealthSignal::Success { within_sla: true }, false);
            }
            Err(error) => {
                entry.last_error = Some(error);
                entry.apply_signal(HealthSignal::Error, false);
            }
        }
        entry.state
    }

    /// Reset one backend (or all, with `None`) to `Unknown`.
    ///
    /// Attempt history is kept; only the health belief is cleared.
    pub fn reset(&self, backend_id: Option<&str>) {
        match backend_id {
            Some(id) => {
                if let Some(mut entry) = self.state.get_mut(id) {
                    entry.state = HealthState::Unknown;
                    entry.consecutive_failures = 0;
                    entry.last_transition = Some(chrono::Utc::now());
                    tracing::info!(backend_id = id, "Reset backend health");
                }
            }
            None => {
                for mut entry in self.state.iter_mut() {
                    entry.state = HealthState::Unknown;
                    entry.consecutive_failures = 0;
                    entry.last_transition = Some(chrono::Utc::now());
                }
                tracing::info!("Reset health for all backends");
            }
        }
    }

    /// Current state of one backend.
    pub fn state(&self, backend_id: &str) -> HealthState {
        self.state
            .get(backend_id)
            .map(|entry| entry.state)
            .unwrap_or(HealthState::Unknown)
    }

    /// Copy of the full tracking state for one backend.
    pub fn backend_state(&self, backend_id: &str) -> Option<BackendHealthState> {
        self.state.get(backend_id).map(|entry| entry.clone())
    }

    /// Snapshot of every backend's state.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.state
            .iter()
            .map(|entry| (entry.key().clone(), entry.state))
            .collect()
    }

    /// Tracker configuration.
    pub fn config(&self) -> &HealthConfig {
        &self.config
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

/// Background service that periodically probes backend health.
pub struct HealthProber {
    registry: Arc<Registry>,
    tracker: Arc<HealthTracker>,
    config: HealthConfig,
}

impl HealthProber {
    /// Create a prober over the given registry and tracker.
    pub fn new(registry: Arc<Registry>, tracker: Arc<HealthTracker>) -> Self {
        let config = tracker.config().clone();
        Self {
            registry,
            tracker,
            config,
        }
    }

    /// Probe a single backend under the configured timeout.
    ///
    /// Returns `None` when the probe itself failed or timed out; such results
    /// are logged but never change health, since only live outcomes may fail
    /// a backend.
    pub async fn check_backend(&self, entry: &RegisteredBackend) -> Option<bool> {
        let timeout = Duration::from_secs(self.config.probe_timeout_seconds);
        match tokio::time::timeout(timeout, entry.backend.health_check()).await {
            Ok(Ok(healthy)) => Some(healthy),
            Ok(Err(e)) => {
                tracing::warn!(
                    backend_id = %entry.descriptor.id,
                    error = %e,
                    "Health probe failed"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    backend_id = %entry.descriptor.id,
                    timeout_seconds = self.config.probe_timeout_seconds,
                    "Health probe timed out"
                );
                None
            }
        }
    }

    /// Probe all registered backends concurrently and apply the results.
    ///
    /// Results come back in registration order.
    pub async fn probe_all(&self) -> Vec<(String, HealthState)> {
        let entries = self.registry.entries();
        let probes = entries.iter().map(|entry| async move {
            let id = entry.descriptor.id.clone();
            let state = match self.check_backend(entry).await {
                Some(healthy) => self.tracker.record_probe(&id, healthy),
                None => self.tracker.state(&id),
            };
            (id, state)
        });

        futures::future::join_all(probes).await
    }

    /// Start the prober background task.
    /// Returns a JoinHandle that resolves when the prober stops.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.probe_interval_seconds.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.config.probe_interval_seconds,
                "Health prober started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health prober shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let results = self.probe_all().await;
                        tracing::debug!(
                            backends_probed = results.len(),
                            "Health probe cycle completed"
                        );
                    }
                }
            }
        })
    }
}
