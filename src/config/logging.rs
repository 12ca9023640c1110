//! Logging configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected pretty or json", other)),
        }
    }
}

/// `[logging]` section.
///
/// Levels use `EnvFilter` syntax; `RUST_LOG` still wins when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels, keyed by module under `cutout::` (e.g. {"executor": "debug"})
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
        }
    }
}

impl LoggingConfig {
    /// Reject levels the filter would silently ignore.
    pub fn validate(&self) -> Result<(), String> {
        LevelFilter::from_str(&self.level)
            .map_err(|_| format!("unknown level '{}'", self.level))?;
        if let Some(components) = &self.component_levels {
            for (component, level) in components {
                if component.is_empty() {
                    return Err("component name cannot be empty".to_string());
                }
                LevelFilter::from_str(level)
                    .map_err(|_| format!("unknown level '{}' for {}", level, component))?;
            }
        }
        Ok(())
    }
}
