use std::io::Write;
use std::time::Duration;

use scribe_controller::ConfigError;
use scribe_controller::config::loader::load_config;
use scribe_core::GroupVersionKind;

fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = yaml_file(
        r#"
types:
  - apiVersion: v1
    kind: Pod
  - apiVersion: apps/v1
    kind: Deployment
controller:
  workers: 2
  reconcile_timeout_ms: 1500
logging:
  level: debug
metrics:
  enabled: false
"#,
    );

    let cfg = load_config(file.path().to_str()).unwrap();
    assert_eq!(
        cfg.kinds().unwrap(),
        vec![
            GroupVersionKind::new("", "v1", "Pod"),
            GroupVersionKind::new("apps", "v1", "Deployment"),
        ]
    );
    assert_eq!(cfg.controller.workers, 2);
    assert_eq!(cfg.controller.reconcile_timeout(), Duration::from_millis(1500));
    assert_eq!(cfg.controller.backoff_base(), Duration::from_millis(5));
    assert_eq!(cfg.logging.level, "debug");
    assert!(!cfg.metrics.enabled);
    assert!(cfg.store.seed_file.is_none());
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = yaml_file(
        r#"
types:
  - apiVersion: v1
    kind: Pod
controller:
  workers: 0
"#,
    );

    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("controller.workers"));
}

#[test]
fn test_missing_file_without_types_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = load_config(path.to_str()).unwrap_err();
    assert!(err.to_string().contains("types must list at least one kind"));
}
