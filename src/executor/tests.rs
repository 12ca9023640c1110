//! Unit tests for the fallback executor.

use super::*;
use crate::health::HealthState;
use crate::processor::{ErrorClass, ProcessorError};
use crate::registry::{BackendDescriptor, Tier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const SLA: Duration = Duration::from_millis(200);
const BUDGET: Duration = Duration::from_millis(400);

enum Behavior {
    Succeed,
    Sleep(Duration),
    Fail(ProcessorError),
}

struct ScriptedBackend {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl ProcessingBackend for ScriptedBackend {
    async fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed => Ok(input.iter().rev().copied().collect()),
            Behavior::Sleep(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(input.to_vec())
            }
            Behavior::Fail(error) => Err(error.clone()),
        }
    }
}

#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl CollectingSink {
    fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl OutcomeSink for CollectingSink {
    fn record(&self, record: OutcomeRecord) {
        self.records.lock().unwrap().push(record);
    }
}

struct Fixture {
    executor: FallbackExecutor,
    health: Arc<HealthTracker>,
    sink: Arc<CollectingSink>,
}

fn fixture(backends: Vec<(&str, Arc<ScriptedBackend>)>) -> Fixture {
    let registry = Arc::new(Registry::new());
    for (i, (id, backend)) in backends.into_iter().enumerate() {
        registry
            .register(
                BackendDescriptor::new(id, Tier::Primary, i as i32 + 1, 0.1),
                backend,
            )
            .unwrap();
    }
    let health = Arc::new(HealthTracker::default());
    let sink = Arc::new(CollectingSink::default());
    let executor = FallbackExecutor::new(
        registry,
        Arc::clone(&health),
        Arc::clone(&sink) as Arc<dyn OutcomeSink>,
        SLA,
    );
    Fixture {
        executor,
        health,
        sink,
    }
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_first_qualifying_success_wins() {
    let a = ScriptedBackend::new(Behavior::Succeed);
    let b = ScriptedBackend::new(Behavior::Succeed);
    let f = fixture(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

    let result = f
        .executor
        .execute(&RequestContext::new(), b"abc", &ids(&["a", "b"]), BUDGET, 3)
        .await
        .unwrap();

    assert_eq!(result.backend, "a");
    assert_eq!(result.output, b"cba".to_vec());
    assert_eq!(result.attempts, 1);
    assert!(!result.over_sla);
    assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.sink.records().len(), 1);
    assert_eq!(f.health.state("a"), HealthState::Healthy);
}

#[tokio::test]
async fn test_error_then_timeout_then_success() {
    let f = fixture(vec![
        (
            "a",
            ScriptedBackend::new(Behavior::Fail(ProcessorError::OutOfMemory("gpu".into()))),
        ),
        ("b", ScriptedBackend::new(Behavior::Sleep(Duration::from_secs(30)))),
        ("c", ScriptedBackend::new(Behavior::Succeed)),
    ]);

    let result = f
        .executor
        .execute(&RequestContext::new(), b"img", &ids(&["a", "b", "c"]), BUDGET, 3)
        .await
        .unwrap();

    assert_eq!(result.backend, "c");
    assert_eq!(result.attempts, 3);

    let records = f.sink.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].error_class, Some(ErrorClass::Memory));
    assert_eq!(records[1].error_class, Some(ErrorClass::Timeout));
    assert!(records[2].success);
    assert!(records.iter().all(|r| r.input_bytes == 3));

    assert_eq!(f.health.state("a"), HealthState::Failed);
    assert_eq!(f.health.state("b"), HealthState::Failed);
    assert_eq!(f.health.state("c"), HealthState::Healthy);
}

#[tokio::test]
async fn test_failed_candidates_are_skipped() {
    let a = ScriptedBackend::new(Behavior::Succeed);
    let f = fixture(vec![
        ("a", Arc::clone(&a)),
        ("b", ScriptedBackend::new(Behavior::Succeed)),
    ]);
    f.health
        .record_attempt("a", HealthSignal::Error, Duration::ZERO, None, false);

    let result = f
        .executor
        .execute(&RequestContext::new(), b"x", &ids(&["a", "b"]), BUDGET, 3)
        .await
        .unwrap();

    assert_eq!(result.backend, "b");
    assert_eq!(a.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_failed_attempts_last_resort() {
    let f = fixture(vec![
        ("a", ScriptedBackend::new(Behavior::Succeed)),
        ("b", ScriptedBackend::new(Behavior::Succeed)),
    ]);
    for id in ["a", "b"] {
        f.health
            .record_attempt(id, HealthSignal::Error, Duration::ZERO, None, false);
    }

    let result = f
        .executor
        .execute(&RequestContext::new(), b"x", &ids(&["a", "b"]), BUDGET, 3)
        .await
        .unwrap();

    assert_eq!(result.backend, "a");
    assert_eq!(result.attempts, 1);
    // A forced success re-validates the backend
    assert_eq!(f.health.state("a"), HealthState::Healthy);
    assert_eq!(f.health.state("b"), HealthState::Failed);
}

#[tokio::test]
async fn test_slow_success_keeps_searching() {
    let f = fixture(vec![
        ("slow", ScriptedBackend::new(Behavior::Sleep(Duration::from_millis(300)))),
        ("fast", ScriptedBackend::new(Behavior::Succeed)),
    ]);

    let result = f
        .executor
        .execute(&RequestContext::new(), b"x", &ids(&["slow", "fast"]), BUDGET, 3)
        .await
        .unwrap();

    assert_eq!(result.backend, "fast");
    assert!(!result.over_sla);
    assert_eq!(f.health.state("slow"), HealthState::Degraded);

    let records = f.sink.records();
    assert!(records[0].success && records[0].over_sla);
}

#[tokio::test]
async fn test_slow_success_returned_when_nothing_better() {
    let f = fixture(vec![
        ("slow", ScriptedBackend::new(Behavior::Sleep(Duration::from_millis(300)))),
        (
            "broken",
            ScriptedBackend::new(Behavior::Fail(ProcessorError::Failed("boom".into()))),
        ),
    ]);

    let result = f
        .executor
        .execute(&RequestContext::new(), b"x", &ids(&["slow", "broken"]), BUDGET, 3)
        .await
        .unwrap();

    assert_eq!(result.backend, "slow");
    assert!(result.over_sla);
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn test_max_attempts_bounds_search() {
    let f = fixture(vec![
        (
            "a",
            ScriptedBackend::new(Behavior::Fail(ProcessorError::Network("refused".into()))),
        ),
        (
            "b",
            ScriptedBackend::new(Behavior::Fail(ProcessorError::Network("refused".into()))),
        ),
        ("c", ScriptedBackend::new(Behavior::Succeed)),
    ]);

    let err = f
        .executor
        .execute(&RequestContext::new(), b"x", &ids(&["a", "b", "c"]), BUDGET, 2)
        .await
        .unwrap_err();

    match err {
        ExecutionError::AllBackendsExhausted {
            attempts,
            last_error: Some(last),
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.backend(), "b");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(f.sink.records().len(), 2);
}

#[tokio::test]
async fn test_unknown_candidate_fails_before_attempting() {
    let a = ScriptedBackend::new(Behavior::Succeed);
    let f = fixture(vec![("a", Arc::clone(&a))]);

    let err = f
        .executor
        .execute(&RequestContext::new(), b"x", &ids(&["a", "ghost"]), BUDGET, 3)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExecutionError::Registry(crate::registry::RegistryError::UnknownBackend(
            "ghost".into()
        ))
    );
    assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    assert!(f.sink.records().is_empty());
}

#[tokio::test]
async fn test_empty_candidates_exhaust_immediately() {
    let f = fixture(vec![]);
    let err = f
        .executor
        .execute(&RequestContext::new(), b"x", &[], BUDGET, 3)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ExecutionError::AllBackendsExhausted {
            attempts: 0,
            last_error: None
        }
    );
}

#[tokio::test]
async fn test_records_carry_request_context() {
    use crate::experiment::Variant;

    let f = fixture(vec![("a", ScriptedBackend::new(Behavior::Succeed))]);
    let ctx = RequestContext::new().with_variant(VariantTag::new("exp", Variant::VariantA));

    f.executor
        .execute(&ctx, b"x", &ids(&["a"]), BUDGET, 3)
        .await
        .unwrap();

    let record = &f.sink.records()[0];
    assert_eq!(record.request_id, ctx.request_id);
    assert_eq!(record.variant, ctx.variant);
    assert_eq!(record.output_bytes, 1);
}

#[tokio::test]
async fn test_dropping_execute_cancels_in_flight_call() {
    let f = fixture(vec![(
        "hang",
        ScriptedBackend::new(Behavior::Sleep(Duration::from_secs(30))),
    )]);
    let ctx = RequestContext::new();
    let candidates = ids(&["hang"]);

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        f.executor
            .execute(&ctx, b"x", &candidates, Duration::from_secs(60), 1),
    )
    .await;

    assert!(outcome.is_err());
    assert!(f.sink.records().is_empty());
    assert_eq!(f.health.state("hang"), HealthState::Unknown);
}
