use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use scribe_core::{GroupVersionKind, ManagedObject, ObjectKey, ObjectReference};
use scribe_storage::{DeleteOutcome, ObjectStore, StorageError};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::trace;

pub type StorageKey = String; // Format: "group/version/kind/namespace/name"

pub(crate) fn make_storage_key(gvk: &GroupVersionKind, key: &ObjectKey) -> StorageKey {
    format!(
        "{}/{}/{}/{}/{}",
        gvk.group, gvk.version, gvk.kind, key.namespace, key.name
    )
}

fn now_rfc3339() -> Result<String, StorageError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| StorageError::internal(format!("failed to format timestamp: {e}")))
}

/// Object store backed by a `DashMap`.
///
/// - `create` assigns `metadata.uid`, `metadata.creationTimestamp` and a
///   resource version
/// - `update` keeps server-owned fields and bumps the resource version
/// - `delete` only marks objects that still carry finalizers
#[derive(Debug)]
pub struct InMemoryStore {
    data: DashMap<StorageKey, ManagedObject>,
    version_counter: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            version_counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<Option<ManagedObject>, StorageError> {
        let storage_key = make_storage_key(gvk, key);
        Ok(self.data.get(&storage_key).map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<Vec<ManagedObject>, StorageError> {
        let mut objects: Vec<ManagedObject> = self
            .data
            .iter()
            .filter(|entry| {
                let object = entry.value();
                object.gvk() == *gvk && (namespace.is_empty() || object.namespace() == namespace)
            })
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by_key(ManagedObject::key);
        Ok(objects)
    }

    async fn create(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError> {
        let reference = object.reference();
        let storage_key = make_storage_key(&reference.gvk, &reference.key);

        match self.data.entry(storage_key) {
            Entry::Occupied(_) => Err(StorageError::already_exists(&reference)),
            Entry::Vacant(slot) => {
                let mut created = object.clone();
                created.set_metadata_field("uid", Value::String(uuid::Uuid::new_v4().to_string()));
                created.set_metadata_field("creationTimestamp", Value::String(now_rfc3339()?));
                created.set_resource_version(self.next_version());
                slot.insert(created.clone());
                trace!(object = %reference, "Created object");
                Ok(created)
            }
        }
    }

    async fn update(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError> {
        let reference = object.reference();
        let storage_key = make_storage_key(&reference.gvk, &reference.key);

        let mut entry = self
            .data
            .get_mut(&storage_key)
            .ok_or_else(|| StorageError::not_found(&reference))?;
        let stored = entry.value();

        let stored_version = stored.resource_version().unwrap_or_default();
        if let Some(expected) = object.resource_version()
            && expected != stored_version
        {
            return Err(StorageError::conflict(&reference, expected, stored_version));
        }

        let mut updated = object.clone();
        for field in ["uid", "creationTimestamp", "deletionTimestamp"] {
            let value = stored
                .body()
                .get("metadata")
                .and_then(|metadata| metadata.get(field))
                .cloned();
            if let Some(value) = value {
                updated.set_metadata_field(field, value);
            }
        }
        updated.set_resource_version(self.next_version());

        *entry.value_mut() = updated.clone();
        trace!(object = %reference, version = ?updated.resource_version(), "Updated object");
        Ok(updated)
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DeleteOutcome, StorageError> {
        let reference = ObjectReference::new(gvk.clone(), key.clone());
        let storage_key = make_storage_key(gvk, key);

        if let Some((_, removed)) = self
            .data
            .remove_if(&storage_key, |_, object| object.finalizers().is_empty())
        {
            trace!(object = %reference, "Removed object");
            return Ok(DeleteOutcome::Removed(removed));
        }

        let mut entry = self
            .data
            .get_mut(&storage_key)
            .ok_or_else(|| StorageError::not_found(&reference))?;
        if !entry.value().is_marked_for_deletion() {
            let timestamp = now_rfc3339()?;
            let version = self.next_version();
            let object = entry.value_mut();
            object.set_metadata_field("deletionTimestamp", Value::String(timestamp));
            object.set_resource_version(version);
            trace!(object = %reference, "Marked object for deletion");
        }
        Ok(DeleteOutcome::MarkedForDeletion(entry.value().clone()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(namespace: &str, name: &str) -> ManagedObject {
        ManagedObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": name, "namespace": namespace}
        }))
        .unwrap()
    }

    fn pod_gvk() -> GroupVersionKind {
        GroupVersionKind::new("", "v1", "Pod")
    }

    #[tokio::test]
    async fn test_create_assigns_server_fields() {
        let store = InMemoryStore::new();
        let created = store.create(&pod("default", "web")).await.unwrap();

        assert_eq!(created.resource_version(), Some("1"));
        let metadata = &created.body()["metadata"];
        assert!(metadata["uid"].as_str().is_some_and(|uid| uid.len() == 36));
        assert!(metadata["creationTimestamp"].as_str().is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = InMemoryStore::new();
        store.create(&pod("default", "web")).await.unwrap();
        let err = store.create(&pod("default", "web")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryStore::new();
        let found = store
            .get(&pod_gvk(), &ObjectKey::new("default", "missing"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_kind_and_namespace() {
        let store = InMemoryStore::new();
        store.create(&pod("a", "two")).await.unwrap();
        store.create(&pod("a", "one")).await.unwrap();
        store.create(&pod("b", "three")).await.unwrap();
        store
            .create(
                &ManagedObject::from_value(json!({
                    "apiVersion": "v1",
                    "kind": "Service",
                    "metadata": {"name": "svc", "namespace": "a"}
                }))
                .unwrap(),
            )
            .await
            .unwrap();

        let in_a = store.list(&pod_gvk(), "a").await.unwrap();
        let names: Vec<&str> = in_a.iter().map(ManagedObject::name).collect();
        assert_eq!(names, vec!["one", "two"]);

        assert_eq!(store.list(&pod_gvk(), "").await.unwrap().len(), 3);
        assert!(store.list(&pod_gvk(), "c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_checks_resource_version() {
        let store = InMemoryStore::new();
        let created = store.create(&pod("default", "web")).await.unwrap();

        let mut fresh = created.clone();
        fresh.set_metadata_field("labels", json!({"tier": "web"}));
        let updated = store.update(&fresh).await.unwrap();
        assert_eq!(updated.resource_version(), Some("2"));
        assert_eq!(updated.body()["metadata"]["uid"], created.body()["metadata"]["uid"]);

        let err = store.update(&created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_without_version_overwrites() {
        let store = InMemoryStore::new();
        store.create(&pod("default", "web")).await.unwrap();
        let updated = store.update(&pod("default", "web")).await.unwrap();
        assert_eq!(updated.resource_version(), Some("2"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.update(&pod("default", "web")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let store = InMemoryStore::new();
        store.create(&pod("default", "web")).await.unwrap();
        let key = ObjectKey::new("default", "web");

        let outcome = store.delete(&pod_gvk(), &key).await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Removed(_)));
        assert!(store.is_empty());

        let err = store.delete(&pod_gvk(), &key).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_with_finalizers_marks_object() {
        let store = InMemoryStore::new();
        let mut object = pod("default", "web");
        object.set_metadata_field("finalizers", json!(["example.com/cleanup"]));
        store.create(&object).await.unwrap();
        let key = ObjectKey::new("default", "web");

        let outcome = store.delete(&pod_gvk(), &key).await.unwrap();
        let DeleteOutcome::MarkedForDeletion(marked) = outcome else {
            panic!("Expected object to be marked for deletion");
        };
        assert!(marked.is_marked_for_deletion());

        let stored = store.get(&pod_gvk(), &key).await.unwrap().unwrap();
        assert!(stored.is_marked_for_deletion());

        // Clients cannot clear the deletion timestamp.
        let mut edited = pod("default", "web");
        edited.set_metadata_field("finalizers", json!(["example.com/cleanup"]));
        let updated = store.update(&edited).await.unwrap();
        assert!(updated.is_marked_for_deletion());
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(
            make_storage_key(
                &GroupVersionKind::new("apps", "v1", "Deployment"),
                &ObjectKey::new("default", "web")
            ),
            "apps/v1/Deployment/default/web"
        );
    }
}
