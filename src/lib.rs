//! Cutout - processing orchestration core for background-removal backends
//!
//! Routes each request across interchangeable matting engines under a tiered
//! fallback policy, tracks per-backend health from live outcomes, buckets
//! sessions into A/B experiment variants, and aggregates rolling performance
//! statistics with threshold alerting.
//!
//! The [`orchestrator::Orchestrator`] facade wires every component from a
//! [`config::CutoutConfig`]; each component is also usable on its own.

pub mod config;
pub mod executor;
pub mod experiment;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod processor;
pub mod registry;
pub mod routing;
