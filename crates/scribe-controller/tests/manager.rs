mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{namespace, pod, pods};
use scribe_controller::{
    AppConfig, ControllerSettings, InMemoryMetrics, KindRegistry, Manager, TypeConfig,
};
use scribe_core::events::EventBroadcaster;
use scribe_core::{
    DotPathEvaluator, GroupVersionKind, ManagedObject, ObjectKey, TEMPLATE_ANNOTATION,
};
use scribe_db_memory::InMemoryStore;
use scribe_storage::{DynStore, EventedStore, ObjectStore};
use tokio_util::sync::CancellationToken;

struct Running {
    store: DynStore,
    metrics: Arc<InMemoryMetrics>,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<scribe_controller::Result<()>>,
}

async fn start(seed: &[ManagedObject]) -> Running {
    start_with(seed, 0).await
}

async fn start_with(seed: &[ManagedObject], resync_interval_ms: u64) -> Running {
    let broadcaster = EventBroadcaster::new_shared();
    let store: DynStore = Arc::new(EventedStore::new(InMemoryStore::new(), broadcaster.clone()));
    for object in seed {
        store.create(object).await.unwrap();
    }

    let config = AppConfig {
        types: vec![TypeConfig::new("v1", "Pod")],
        ..Default::default()
    };
    let metrics = Arc::new(InMemoryMetrics::new());
    let registry = KindRegistry::from_config(
        &config,
        store.clone(),
        Arc::new(DotPathEvaluator),
        broadcaster.clone(),
        metrics.clone(),
    )
    .unwrap();

    let settings = ControllerSettings {
        workers: 2,
        reconcile_timeout_ms: 5_000,
        backoff_base_ms: 1,
        backoff_max_ms: 50,
        resync_interval_ms,
    };
    let manager = Manager::new(registry, store.clone(), broadcaster, settings);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(manager.run(shutdown.clone()));

    Running {
        store,
        metrics,
        shutdown,
        handle,
    }
}

impl Running {
    async fn annotation(&self, key: &ObjectKey, name: &str) -> Option<String> {
        self.store
            .get(&pods(), key)
            .await
            .unwrap()
            .and_then(|object| object.annotations().remove(name))
    }

    /// Polls until the annotation `name` on `key` equals `expected`.
    async fn wait_for(&self, key: &ObjectKey, name: &str, expected: Option<&str>) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.annotation(key, name).await.as_deref() == expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "{key} never reached {name}={expected:?}, last value {:?}",
            self.annotation(key, name).await
        );
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_existing_objects_converge_at_startup() {
    let running = start(&[
        namespace("default", Some("owner={{ .metadata.name }}")),
        pod("default", "web", &[]),
        pod("default", "db", &[]),
    ])
    .await;

    running
        .wait_for(&ObjectKey::new("default", "web"), "owner", Some("web"))
        .await;
    running
        .wait_for(&ObjectKey::new("default", "db"), "owner", Some("db"))
        .await;
    assert!(running.metrics.reconciles("Pod", "updated") >= 2);
    running.stop().await;
}

#[tokio::test]
async fn test_new_object_is_reconciled() {
    let running = start(&[namespace("default", Some("team=payments"))]).await;

    running
        .store
        .create(&pod("default", "late", &[]))
        .await
        .unwrap();
    running
        .wait_for(&ObjectKey::new("default", "late"), "team", Some("payments"))
        .await;
    running.stop().await;
}

#[tokio::test]
async fn test_namespace_change_fans_out() {
    let running = start(&[
        namespace("default", Some("team=payments")),
        pod("default", "web", &[]),
        pod("other", "untouched", &[]),
    ])
    .await;
    let web = ObjectKey::new("default", "web");
    running.wait_for(&web, "team", Some("payments")).await;

    let ns_key = ObjectKey::cluster("default");
    let mut ns = running
        .store
        .get(&GroupVersionKind::namespace(), &ns_key)
        .await
        .unwrap()
        .unwrap();
    let mut annotations = ns.annotations();
    annotations.insert(TEMPLATE_ANNOTATION.to_string(), "tier=gold".to_string());
    ns.set_annotations(&annotations);
    running.store.update(&ns).await.unwrap();

    running.wait_for(&web, "tier", Some("gold")).await;
    running.wait_for(&web, "team", None).await;
    assert_eq!(
        running
            .annotation(&ObjectKey::new("other", "untouched"), "tier")
            .await,
        None
    );
    running.stop().await;
}

#[tokio::test]
async fn test_periodic_resync_clears_removed_template() {
    let running = start_with(
        &[
            namespace("default", Some("team=payments")),
            pod("default", "web", &[]),
        ],
        50,
    )
    .await;
    let web = ObjectKey::new("default", "web");
    running.wait_for(&web, "team", Some("payments")).await;

    let ns_key = ObjectKey::cluster("default");
    let mut ns = running
        .store
        .get(&GroupVersionKind::namespace(), &ns_key)
        .await
        .unwrap()
        .unwrap();
    let mut annotations = ns.annotations();
    annotations.remove(TEMPLATE_ANNOTATION);
    ns.set_annotations(&annotations);
    running.store.update(&ns).await.unwrap();

    running.wait_for(&web, "team", None).await;
    running.stop().await;
}
