use super::*;
use crate::processor::{ProcessingBackend, ProcessorError};
use std::sync::Arc;

struct Echo;

#[async_trait::async_trait]
impl ProcessingBackend for Echo {
    async fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessorError> {
        Ok(input.to_vec())
    }
}

fn echo() -> Arc<dyn ProcessingBackend> {
    Arc::new(Echo)
}

#[test]
fn test_tier_serialization() {
    let json = serde_json::to_string(&Tier::HighQuality).unwrap();
    assert_eq!(json, r#""high_quality""#);

    let deserialized: Tier = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, Tier::HighQuality);
}

#[test]
fn test_descriptor_from_toml() {
    let toml = r#"
        id = "bgmatting_v2"
        tier = "high_quality"
        priority = 3
        expected_latency_seconds = 3.0
        capabilities = ["complex-backgrounds", "edge-detail"]
    "#;

    let descriptor: BackendDescriptor = toml::from_str(toml).unwrap();
    assert_eq!(descriptor.id, "bgmatting_v2");
    assert_eq!(descriptor.tier, Tier::HighQuality);
    assert_eq!(descriptor.priority, 3);
    assert_eq!(descriptor.expected_latency().as_secs(), 3);
    assert!(descriptor.capabilities.contains("edge-detail"));
    assert!(!descriptor.requires_init);
}

#[test]
fn test_descriptor_negative_latency_is_zero() {
    let descriptor = BackendDescriptor::new("bad", Tier::Primary, 1, -1.0);
    assert_eq!(descriptor.expected_latency(), std::time::Duration::ZERO);
}

#[test]
fn test_register_and_get() {
    let registry = Registry::new();
    let descriptor = BackendDescriptor::new("modnet", Tier::Primary, 2, 1.5)
        .with_capabilities(["portrait"]);

    registry.register(descriptor.clone(), echo()).unwrap();

    assert_eq!(registry.len(), 1);
    assert!(registry.contains("modnet"));
    assert_eq!(registry.get("modnet").unwrap(), descriptor);
}

#[test]
fn test_register_duplicate_with_different_descriptor_fails() {
    let registry = Registry::new();
    registry
        .register(BackendDescriptor::new("modnet", Tier::Primary, 2, 1.5), echo())
        .unwrap();

    let result = registry.register(BackendDescriptor::new("modnet", Tier::Primary, 9, 1.5), echo());

    assert_eq!(
        result,
        Err(RegistryError::DuplicateBackend("modnet".to_string()))
    );
    // Original descriptor is untouched
    assert_eq!(registry.get("modnet").unwrap().priority, 2);
}

#[test]
fn test_register_identical_descriptor_is_idempotent() {
    let registry = Registry::new();
    let descriptor = BackendDescriptor::new("modnet", Tier::Primary, 2, 1.5);

    registry.register(descriptor.clone(), echo()).unwrap();
    registry.register(descriptor, echo()).unwrap();

    assert_eq!(registry.len(), 1);
}

#[test]
fn test_get_unknown_backend() {
    let registry = Registry::new();
    assert_eq!(
        registry.get("missing"),
        Err(RegistryError::UnknownBackend("missing".to_string()))
    );
    assert!(registry.backend("missing").is_err());
}

#[test]
fn test_list_preserves_registration_order() {
    let registry = Registry::new();
    for (i, id) in ["zeta", "alpha", "mid"].iter().enumerate() {
        registry
            .register(BackendDescriptor::new(*id, Tier::Primary, i as i32, 1.0), echo())
            .unwrap();
    }

    let ids: Vec<String> = registry.list().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);

    let indices: Vec<usize> = registry
        .entries()
        .iter()
        .map(|e| e.registration_index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_error_display() {
    assert_eq!(
        RegistryError::DuplicateBackend("a".into()).to_string(),
        "backend already exists: a"
    );
    assert_eq!(
        RegistryError::UnknownBackend("b".into()).to_string(),
        "unknown backend: b"
    );
}

#[tokio::test]
async fn test_backend_handle_processes() {
    let registry = Registry::new();
    registry
        .register(BackendDescriptor::new("echo", Tier::Interactive, 1, 0.5), echo())
        .unwrap();

    let backend = registry.backend("echo").unwrap();
    assert_eq!(backend.process(b"png").await.unwrap(), b"png".to_vec());
}

#[test]
fn test_concurrent_registration() {
    let registry = Arc::new(Registry::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                registry
                    .register(
                        BackendDescriptor::new(format!("b{}", i), Tier::Primary, i, 1.0),
                        echo(),
                    )
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 8);
    let mut indices: Vec<usize> = registry
        .entries()
        .iter()
        .map(|e| e.registration_index)
        .collect();
    indices.sort();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
}
