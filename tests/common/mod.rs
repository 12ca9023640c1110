//! Shared test utilities for cutout integration tests.
//!
//! Provides a scriptable mock processing backend and helpers for building
//! registries and orchestrators around it.

#![allow(dead_code)]

use async_trait::async_trait;
use cutout::config::{CutoutConfig, SlaConfig};
use cutout::orchestrator::Orchestrator;
use cutout::processor::{ProcessingBackend, ProcessorError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Timing
// =============================================================================

/// SLA target used by integration tests.
pub const TEST_SLA: Duration = Duration::from_millis(200);

/// Per-attempt budget used by integration tests.
pub const TEST_BUDGET: Duration = Duration::from_millis(400);

/// Latency comfortably past the budget.
pub const HANG: Duration = Duration::from_secs(5);

// =============================================================================
// Mock Backend
// =============================================================================

/// What a mock backend does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return the input reversed after the given delay
    Succeed(Duration),
    /// Fail with the given message
    Fail(&'static str),
    /// Sleep past any reasonable budget
    Hang,
}

/// Processing backend driven by a script of steps.
///
/// Steps are consumed in order; the last step repeats once the script runs
/// out.
pub struct MockBackend {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicUsize,
    healthy: bool,
}

impl MockBackend {
    pub fn scripted(steps: Vec<Step>) -> Arc<Self> {
        let last = steps.last().cloned().unwrap_or(Step::Succeed(Duration::ZERO));
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            healthy: true,
        })
    }

    pub fn fast() -> Arc<Self> {
        Self::scripted(vec![Step::Succeed(Duration::from_millis(5))])
    }

    pub fn failing() -> Arc<Self> {
        Self::scripted(vec![Step::Fail("engine crashed")])
    }

    pub fn hanging() -> Arc<Self> {
        Self::scripted(vec![Step::Hang])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessingBackend for MockBackend {
    async fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(step) => {
                    *self.last.lock().unwrap() = step.clone();
                    step
                }
                None => self.last.lock().unwrap().clone(),
            }
        };

        match step {
            Step::Succeed(delay) => {
                tokio::time::sleep(delay).await;
                Ok(input.iter().rev().copied().collect())
            }
            Step::Fail(message) => Err(ProcessorError::Failed(message.to_string())),
            Step::Hang => {
                tokio::time::sleep(HANG).await;
                Ok(Vec::new())
            }
        }
    }

    async fn health_check(&self) -> Result<bool, ProcessorError> {
        Ok(self.healthy)
    }
}

// =============================================================================
// Orchestrator Builders
// =============================================================================

/// Default configuration with a short SLA so timing tests run quickly.
pub fn fast_config() -> CutoutConfig {
    CutoutConfig {
        sla: SlaConfig {
            target_seconds: TEST_SLA.as_secs_f64(),
            timeout_slack_seconds: (TEST_BUDGET - TEST_SLA).as_secs_f64(),
        },
        ..CutoutConfig::default()
    }
}

/// Orchestrator over the default backends, all fast unless overridden.
pub fn orchestrator_with(
    config: CutoutConfig,
    overrides: Vec<(&str, Arc<MockBackend>)>,
) -> Orchestrator {
    let mut handles: HashMap<String, Arc<dyn ProcessingBackend>> = config
        .backends
        .iter()
        .map(|d| (d.id.clone(), MockBackend::fast() as Arc<dyn ProcessingBackend>))
        .collect();
    for (id, backend) in overrides {
        handles.insert(id.to_string(), backend);
    }
    Orchestrator::from_config(config, handles).unwrap()
}
