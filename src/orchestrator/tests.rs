use super::*;
use crate::config::SlaConfig;
use crate::executor::ExecutionError;
use crate::experiment::VariantAllocation;
use crate::processor::ProcessorError;
use crate::routing::ProcessingMode;
use std::sync::atomic::{AtomicUsize, Ordering};

struct StubBackend {
    fail: bool,
    init_fails: bool,
    calls: AtomicUsize,
}

impl StubBackend {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            init_fails: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            init_fails: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn broken_init() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            init_fails: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl ProcessingBackend for StubBackend {
    async fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProcessorError::Failed("stub failure".into()));
        }
        Ok(input.iter().rev().copied().collect())
    }

    async fn initialize(&self) -> Result<(), ProcessorError> {
        if self.init_fails {
            Err(ProcessorError::Unavailable("model weights missing".into()))
        } else {
            Ok(())
        }
    }
}

fn fast_config() -> CutoutConfig {
    CutoutConfig {
        sla: SlaConfig {
            target_seconds: 0.5,
            timeout_slack_seconds: 0.5,
        },
        ..CutoutConfig::default()
    }
}

fn handles_with(
    overrides: Vec<(&str, Arc<StubBackend>)>,
) -> HashMap<String, Arc<dyn ProcessingBackend>> {
    let mut handles: HashMap<String, Arc<dyn ProcessingBackend>> = fast_config()
        .backends
        .iter()
        .map(|d| (d.id.clone(), StubBackend::ok() as Arc<dyn ProcessingBackend>))
        .collect();
    for (id, backend) in overrides {
        handles.insert(id.to_string(), backend);
    }
    handles
}

fn orchestrator() -> Orchestrator {
    Orchestrator::from_config(fast_config(), handles_with(vec![])).unwrap()
}

#[test]
fn from_config_requires_every_handle() {
    let mut handles = handles_with(vec![]);
    handles.remove("modnet");

    let result = Orchestrator::from_config(fast_config(), handles);
    assert!(matches!(
        result,
        Err(ConfigError::Validation { ref message, .. }) if message.contains("modnet")
    ));
}

#[test]
fn from_config_rejects_invalid_config() {
    let mut config = fast_config();
    config.executor.max_attempts = 0;
    assert!(Orchestrator::from_config(config, handles_with(vec![])).is_err());
}

#[tokio::test]
async fn process_without_experiment_uses_best_ranked_backend() {
    let orchestrator = orchestrator();
    let response = orchestrator
        .process(ProcessingRequest::new(vec![1, 2, 3], "session-1"))
        .await
        .unwrap();

    assert_eq!(response.backend, "rembg_isnet");
    assert_eq!(response.output, vec![3, 2, 1]);
    assert_eq!(response.attempts, 1);
    assert!(!response.over_sla);
    assert!(response.variant.is_none());
}

#[tokio::test]
async fn quality_mode_prefers_flagship() {
    let orchestrator = orchestrator();
    let response = orchestrator
        .process(ProcessingRequest::new(vec![1], "s").with_mode(ProcessingMode::Quality))
        .await
        .unwrap();
    assert_eq!(response.backend, "bgmatting_v2");
}

#[tokio::test]
async fn complexity_hint_prefers_recommended_backend() {
    let orchestrator = orchestrator();

    let simple = orchestrator
        .process(ProcessingRequest::new(vec![1], "s").with_complexity(ImageComplexity::Simple))
        .await
        .unwrap();
    assert_eq!(simple.backend, "modnet");

    let medium_quality = orchestrator
        .process(
            ProcessingRequest::new(vec![1], "s")
                .with_mode(ProcessingMode::Quality)
                .with_complexity(ImageComplexity::Medium),
        )
        .await
        .unwrap();
    assert_eq!(medium_quality.backend, "fast_bgmatting");
}

#[tokio::test]
async fn experiment_takes_precedence_over_complexity_hint() {
    let orchestrator = orchestrator();
    let experiment = "library_performance_comparison";
    let session = "session-7";
    let variant = orchestrator.assign_variant(session, experiment);
    let expected = orchestrator.assigner.resolve_backend(variant).unwrap();

    let response = orchestrator
        .process(
            ProcessingRequest::new(vec![1], session)
                .with_experiment(experiment)
                .with_complexity(ImageComplexity::Complex),
        )
        .await
        .unwrap();
    assert_eq!(response.backend, expected);
}

#[tokio::test]
async fn process_with_experiment_routes_to_variant_backend() {
    let orchestrator = orchestrator();
    let experiment = "library_performance_comparison";

    for i in 0..20 {
        let session = format!("session-{}", i);
        let expected_variant = orchestrator.assign_variant(&session, experiment);
        let expected_backend = orchestrator
            .assigner
            .resolve_backend(expected_variant)
            .unwrap();

        let response = orchestrator
            .process(ProcessingRequest::new(vec![0], session.as_str()).with_experiment(experiment))
            .await
            .unwrap();

        assert_eq!(response.backend, expected_backend);
        let tag = response.variant.unwrap();
        assert_eq!(tag.experiment_id, experiment);
        assert_eq!(tag.variant, expected_variant);
    }

    let analysis = orchestrator.variant_analysis(experiment, 1).unwrap();
    let samples: usize = analysis.performances.iter().map(|p| p.sample_count).sum();
    assert_eq!(samples, 20);
}

#[tokio::test]
async fn unknown_experiment_serves_control_untagged() {
    let orchestrator = orchestrator();
    let response = orchestrator
        .process(ProcessingRequest::new(vec![0], "s").with_experiment("no_such_experiment"))
        .await
        .unwrap();

    assert_eq!(response.backend, "rembg_isnet");
    assert!(response.variant.is_none());
}

#[tokio::test]
async fn failing_backend_falls_back() {
    let orchestrator = Orchestrator::from_config(
        fast_config(),
        handles_with(vec![("rembg_isnet", StubBackend::failing())]),
    )
    .unwrap();

    let response = orchestrator
        .process(ProcessingRequest::new(vec![0], "s"))
        .await
        .unwrap();
    assert_eq!(response.backend, "modnet");
    assert_eq!(response.attempts, 2);

    let report = orchestrator.health_report();
    assert_eq!(report.backend("rembg_isnet").unwrap().status, HealthState::Failed);
    assert_eq!(report.backend("modnet").unwrap().status, HealthState::Healthy);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.healthy, 1);
    assert_eq!(report.summary.unknown, 3);
}

#[tokio::test]
async fn exhausted_request_reports_execution_error() {
    let mut config = fast_config();
    config.executor.max_attempts = 2;
    let orchestrator = Orchestrator::from_config(
        config,
        handles_with(vec![
            ("rembg_isnet", StubBackend::failing()),
            ("modnet", StubBackend::failing()),
        ]),
    )
    .unwrap();

    let err = orchestrator
        .process(ProcessingRequest::new(vec![0], "s"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessError::Execution(ExecutionError::AllBackendsExhausted { attempts: 2, .. })
    ));
    assert_eq!(orchestrator.current_stats().total_requests, 2);
}

#[tokio::test]
async fn health_report_counts_attempts() {
    let orchestrator = orchestrator();
    for _ in 0..4 {
        orchestrator
            .process(ProcessingRequest::new(vec![0; 16], "s"))
            .await
            .unwrap();
    }

    let report = orchestrator.health_report();
    let isnet = report.backend("rembg_isnet").unwrap();
    assert_eq!(isnet.status, HealthState::Healthy);
    assert_eq!(isnet.performance.total_attempts, 4);
    assert_eq!(isnet.performance.successful_attempts, 4);
    assert_eq!(isnet.performance.recent_latencies.len(), 4);
    assert_eq!(isnet.tier, crate::registry::Tier::Primary);
    assert!(isnet.capabilities.contains(&"reliable".to_string()));
    assert_eq!(report.summary.total_backends, 5);

    let stats = orchestrator.current_stats();
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.success_rate, 1.0);
}

#[tokio::test]
async fn initialize_all_runs_declared_hooks() {
    let orchestrator = Orchestrator::from_config(
        fast_config(),
        handles_with(vec![("rembg_u2net", StubBackend::broken_init())]),
    )
    .unwrap();

    let results = orchestrator.initialize_all().await;
    assert_eq!(
        results,
        vec![
            ("rembg_isnet".to_string(), HealthState::Healthy),
            ("rembg_u2net".to_string(), HealthState::Failed),
        ]
    );

    let report = orchestrator.health_report();
    let u2net = report.backend("rembg_u2net").unwrap();
    assert!(u2net.last_error.as_deref().unwrap().contains("model weights missing"));

    orchestrator.reset_health(Some("rembg_u2net"));
    assert_eq!(orchestrator.health().state("rembg_u2net"), HealthState::Unknown);
}

#[tokio::test]
async fn probe_backends_covers_registry() {
    let orchestrator = orchestrator();
    let results = orchestrator.probe_backends().await;
    assert_eq!(results.len(), 5);
}

#[tokio::test]
async fn subscribers_see_every_attempt() {
    let orchestrator = Orchestrator::from_config(
        fast_config(),
        handles_with(vec![("rembg_isnet", StubBackend::failing())]),
    )
    .unwrap();
    let mut rx = orchestrator.subscribe_outcomes();

    orchestrator
        .process(ProcessingRequest::new(vec![0], "s"))
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.backend, "rembg_isnet");
    assert!(!first.success);
    assert_eq!(second.backend, "modnet");
    assert!(second.success);
    assert_eq!(first.request_id, second.request_id);
}

#[test]
fn register_experiment_requires_bound_variants() {
    let mut config = fast_config();
    config.experiments.clear();
    config.variant_backends.truncate(1);
    let orchestrator = Orchestrator::from_config(config, handles_with(vec![])).unwrap();

    let experiment = ExperimentConfig::new(
        "two_way",
        vec![
            VariantAllocation::new(Variant::Control, 0.5),
            VariantAllocation::new(Variant::VariantA, 0.5),
        ],
    );
    assert_eq!(
        orchestrator.register_experiment(experiment),
        Err(ExperimentError::UnknownVariant(Variant::VariantA))
    );
}

#[test]
fn variant_analysis_unknown_experiment() {
    let orchestrator = orchestrator();
    assert!(matches!(
        orchestrator.variant_analysis("missing", 24),
        Err(ExperimentError::UnknownExperiment(_))
    ));
}

#[tokio::test]
async fn background_tasks_stop_on_cancel() {
    let mut config = fast_config();
    config.health.probe_enabled = true;
    let orchestrator = Orchestrator::from_config(config, handles_with(vec![])).unwrap();

    let cancel = CancellationToken::new();
    let handles = orchestrator.start_background(cancel.clone());
    assert_eq!(handles.len(), 2);

    cancel.cancel();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
