//! Configuration module for the cutout orchestrator
//!
//! Provides layered configuration loading from a TOML file, environment
//! variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. Environment variables (`CUTOUT_*`)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! # Example
//!
//! ```rust
//! use cutout::config::CutoutConfig;
//!
//! let config = CutoutConfig::default();
//! assert_eq!(config.sla.target_seconds, 5.0);
//! assert_eq!(config.backends.len(), 5);
//!
//! let toml = r#"
//! [executor]
//! max_attempts = 2
//! "#;
//! let config: CutoutConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.executor.max_attempts, 2);
//! ```

pub mod error;
pub mod logging;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};

pub use crate::executor::{ExecutorConfig, SlaConfig};
pub use crate::health::HealthConfig;
pub use crate::monitor::MonitorConfig;
pub use crate::routing::OrderingWeights;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::experiment::{default_variant_bindings, ExperimentConfig, Variant, VariantBinding};
use crate::monitor::{default_rules, AlertRule};
use crate::registry::{BackendDescriptor, Tier};

/// Unified configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoutConfig {
    /// Latency target and attempt budget
    pub sla: SlaConfig,
    /// Fallback execution limits
    pub executor: ExecutorConfig,
    /// Candidate ordering weights
    pub ordering: OrderingWeights,
    /// Health tracking and background probing
    pub health: HealthConfig,
    /// Rolling buffer and alert evaluation
    pub monitor: MonitorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Backend descriptors, in registration order
    pub backends: Vec<BackendDescriptor>,
    /// A/B experiments
    pub experiments: Vec<ExperimentConfig>,
    /// Variant to backend lookup table
    pub variant_backends: Vec<VariantBinding>,
    /// Alert rules
    pub alerts: Vec<AlertRule>,
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            sla: SlaConfig::default(),
            executor: ExecutorConfig::default(),
            ordering: OrderingWeights::default(),
            health: HealthConfig::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
            backends: default_backends(),
            experiments: vec![ExperimentConfig::library_performance_comparison()],
            variant_backends: default_variant_bindings(),
            alerts: default_rules(),
        }
    }
}

/// The production matting engines, in registration order.
pub fn default_backends() -> Vec<BackendDescriptor> {
    vec![
        BackendDescriptor::new("rembg_isnet", Tier::Primary, 1, 2.0)
            .with_capabilities(["fast", "reliable", "character-optimized"])
            .with_init_hook(),
        BackendDescriptor::new("modnet", Tier::Primary, 2, 1.5)
            .with_capabilities(["very-fast", "portrait", "trimap-free"]),
        BackendDescriptor::new("bgmatting_v2", Tier::HighQuality, 3, 3.0)
            .with_capabilities(["high-quality", "complex-backgrounds", "edge-detail"]),
        BackendDescriptor::new("fast_bgmatting", Tier::HighQuality, 4, 2.5)
            .with_capabilities(["good-quality", "fast-matting"]),
        BackendDescriptor::new("rembg_u2net", Tier::Primary, 5, 2.5)
            .with_capabilities(["reliable", "baseline"])
            .with_init_hook(),
    ]
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        message: message.into(),
    }
}

impl CutoutConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports CUTOUT_* environment variables for common settings.
    /// Invalid values are ignored and the current value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("CUTOUT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CUTOUT_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(sla) = std::env::var("CUTOUT_SLA_SECONDS") {
            if let Ok(seconds) = sla.parse() {
                self.sla.target_seconds = seconds;
            }
        }
        if let Ok(attempts) = std::env::var("CUTOUT_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.executor.max_attempts = n;
            }
        }
        if let Ok(probe) = std::env::var("CUTOUT_HEALTH_PROBE") {
            self.health.probe_enabled = probe.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sla.target_seconds.is_finite() && self.sla.target_seconds > 0.0) {
            return Err(invalid("sla.target_seconds", "must be a positive number"));
        }
        if !(self.sla.timeout_slack_seconds.is_finite() && self.sla.timeout_slack_seconds >= 0.0) {
            return Err(invalid("sla.timeout_slack_seconds", "must not be negative"));
        }
        if self.executor.max_attempts == 0 {
            return Err(invalid("executor.max_attempts", "must be at least 1"));
        }
        self.ordering
            .validate()
            .map_err(|message| invalid("ordering", message))?;
        if self.monitor.buffer_capacity == 0 {
            return Err(invalid("monitor.buffer_capacity", "must be at least 1"));
        }
        self.logging
            .validate()
            .map_err(|message| invalid("logging", message))?;

        let mut backend_ids = HashSet::new();
        for (i, backend) in self.backends.iter().enumerate() {
            if backend.id.is_empty() {
                return Err(invalid(format!("backends[{}].id", i), "id cannot be empty"));
            }
            if !(backend.expected_latency_seconds.is_finite()
                && backend.expected_latency_seconds >= 0.0)
            {
                return Err(invalid(
                    format!("backends[{}].expected_latency_seconds", i),
                    "must be a non-negative number",
                ));
            }
            if !backend_ids.insert(backend.id.as_str()) {
                return Err(invalid(
                    format!("backends[{}].id", i),
                    format!("duplicate backend '{}'", backend.id),
                ));
            }
        }

        if let Some(flagship) = &self.ordering.quality_flagship {
            if !backend_ids.contains(flagship.as_str()) {
                return Err(invalid(
                    "ordering.quality_flagship",
                    format!("unknown backend '{}'", flagship),
                ));
            }
        }

        let mut experiment_ids = HashSet::new();
        for (i, experiment) in self.experiments.iter().enumerate() {
            experiment.validate()?;
            if !experiment_ids.insert(experiment.id.as_str()) {
                return Err(invalid(
                    format!("experiments[{}].id", i),
                    format!("duplicate experiment '{}'", experiment.id),
                ));
            }
        }

        let mut bound = HashSet::new();
        for (i, binding) in self.variant_backends.iter().enumerate() {
            if !backend_ids.contains(binding.backend.as_str()) {
                return Err(invalid(
                    format!("variant_backends[{}].backend", i),
                    format!("unknown backend '{}'", binding.backend),
                ));
            }
            if !bound.insert(binding.variant) {
                return Err(invalid(
                    format!("variant_backends[{}].variant", i),
                    format!("variant {} bound twice", binding.variant),
                ));
            }
        }

        // Unknown and inactive experiments are served as control
        if !self.experiments.is_empty() && !bound.contains(&Variant::Control) {
            return Err(invalid(
                "variant_backends",
                format!("variant {} has no backend binding", Variant::Control),
            ));
        }

        for (i, experiment) in self.experiments.iter().enumerate() {
            if let Some(unbound) = experiment
                .variants
                .iter()
                .find(|a| !bound.contains(&a.variant))
            {
                return Err(invalid(
                    format!("experiments[{}].variants", i),
                    format!("variant {} has no backend binding", unbound.variant),
                ));
            }
        }

        for (i, rule) in self.alerts.iter().enumerate() {
            if rule.window_minutes == 0 {
                return Err(invalid(
                    format!("alerts[{}].window_minutes", i),
                    "window must be at least one minute",
                ));
            }
            if !rule.threshold.is_finite() {
                return Err(invalid(
                    format!("alerts[{}].threshold", i),
                    "threshold must be finite",
                ));
            }
        }

        Ok(())
    }
}
