#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use scribe_controller::{GenericReconciler, InMemoryMetrics, NamespaceScope};
use scribe_core::events::EventBroadcaster;
use scribe_core::{
    DotPathEvaluator, GroupVersionKind, ManagedObject, ObjectKey, TEMPLATE_ANNOTATION,
};
use scribe_db_memory::InMemoryStore;
use scribe_storage::{DeleteOutcome, DynStore, ObjectStore, StorageError};
use serde_json::json;

pub fn pods() -> GroupVersionKind {
    GroupVersionKind::new("", "v1", "Pod")
}

pub fn namespace(name: &str, template: Option<&str>) -> ManagedObject {
    let mut body = json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {"name": name}
    });
    if let Some(template) = template {
        body["metadata"]["annotations"] = json!({ TEMPLATE_ANNOTATION: template });
    }
    ManagedObject::from_value(body).unwrap()
}

pub fn pod(namespace: &str, name: &str, annotations: &[(&str, &str)]) -> ManagedObject {
    let mut body = json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": namespace}
    });
    if !annotations.is_empty() {
        let map: serde_json::Map<String, serde_json::Value> = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        body["metadata"]["annotations"] = serde_json::Value::Object(map);
    }
    ManagedObject::from_value(body).unwrap()
}

/// Wraps the in-memory store and can be told to reject updates or to hang
/// on reads.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_updates: AtomicBool,
    pub stall_gets: AtomicBool,
}

impl FlakyStore {
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn stall_gets(&self, stall: bool) {
        self.stall_gets.store(stall, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<Option<ManagedObject>, StorageError> {
        if self.stall_gets.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.get(gvk, key).await
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<Vec<ManagedObject>, StorageError> {
        self.inner.list(gvk, namespace).await
    }

    async fn create(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError> {
        self.inner.create(object).await
    }

    async fn update(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StorageError::connection("update rejected"));
        }
        self.inner.update(object).await
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DeleteOutcome, StorageError> {
        self.inner.delete(gvk, key).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// A Pod reconciler wired to in-memory collaborators.
pub struct Harness {
    pub store: DynStore,
    pub broadcaster: Arc<EventBroadcaster>,
    pub metrics: Arc<InMemoryMetrics>,
    pub reconciler: GenericReconciler,
}

impl Harness {
    pub fn new(store: DynStore) -> Self {
        Self::for_kind(store, pods())
    }

    pub fn for_kind(store: DynStore, gvk: GroupVersionKind) -> Self {
        let broadcaster = EventBroadcaster::new_shared();
        let metrics = Arc::new(InMemoryMetrics::new());
        let scope = NamespaceScope::new(store.clone(), Arc::new(DotPathEvaluator));
        let reconciler = GenericReconciler::new(
            gvk,
            store.clone(),
            scope,
            broadcaster.clone(),
            metrics.clone(),
        );
        Self {
            store,
            broadcaster,
            metrics,
            reconciler,
        }
    }

    pub async fn seed(&self, objects: &[ManagedObject]) {
        for object in objects {
            self.store.create(object).await.unwrap();
        }
    }

    pub async fn annotations(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Vec<(String, String)> {
        self.store
            .get(gvk, key)
            .await
            .unwrap()
            .unwrap()
            .annotations()
            .into_iter()
            .collect()
    }
}
