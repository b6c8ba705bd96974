//! Namespace change fan-out.

use scribe_core::{GroupVersionKind, ManagedObject, ObjectKey, TEMPLATE_ANNOTATION};
use scribe_storage::ObjectStore;
use tracing::{debug, trace};

use crate::error::{ControllerError, Result};

/// Keys of every `kind` object in the namespace `scope`.
///
/// A namespace without the template annotation is unmanaged and yields no
/// keys. That is not an error.
pub async fn expand(
    store: &dyn ObjectStore,
    kind: &GroupVersionKind,
    scope: &ManagedObject,
) -> Result<Vec<ObjectKey>> {
    if !scope.gvk().is_namespace() {
        return Ok(Vec::new());
    }
    if !scope.annotations().contains_key(TEMPLATE_ANNOTATION) {
        trace!(namespace = scope.name(), "Skipping unmanaged namespace");
        return Ok(Vec::new());
    }

    let namespace = scope.name();
    let objects = store
        .list(kind, namespace)
        .await
        .map_err(|e| ControllerError::list(kind.clone(), namespace, e))?;

    let keys: Vec<ObjectKey> = objects.iter().map(ManagedObject::key).collect();
    debug!(
        group_version_kind = %kind,
        namespace,
        count = keys.len(),
        "Listed objects"
    );
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_db_memory::InMemoryStore;
    use serde_json::json;

    fn object(value: serde_json::Value) -> ManagedObject {
        ManagedObject::from_value(value).unwrap()
    }

    fn pod(namespace: &str, name: &str) -> ManagedObject {
        object(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": name, "namespace": namespace}
        }))
    }

    fn pods() -> GroupVersionKind {
        GroupVersionKind::new("", "v1", "Pod")
    }

    async fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create(&pod("team-a", "web")).await.unwrap();
        store.create(&pod("team-a", "db")).await.unwrap();
        store.create(&pod("team-b", "web")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_managed_namespace_lists_its_objects() {
        let store = store().await;
        let scope = object(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "team-a", "annotations": {TEMPLATE_ANNOTATION: ""}}
        }));

        let keys = expand(&store, &pods(), &scope).await.unwrap();
        assert_eq!(
            keys,
            vec![ObjectKey::new("team-a", "db"), ObjectKey::new("team-a", "web")]
        );
    }

    #[tokio::test]
    async fn test_unmanaged_namespace_yields_nothing() {
        let store = store().await;
        let scope = object(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "team-a", "annotations": {"other": "x"}}
        }));

        assert!(expand(&store, &pods(), &scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_namespace_scope_yields_nothing() {
        let store = store().await;
        assert!(
            expand(&store, &pods(), &pod("team-a", "web"))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
