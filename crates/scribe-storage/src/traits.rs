//! The object store contract.

use async_trait::async_trait;
use scribe_core::{GroupVersionKind, ManagedObject, ObjectKey};

use crate::error::StorageError;

/// What a delete did to the object.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The object is gone. Carries its last body.
    Removed(ManagedObject),
    /// The object still has finalizers; it now carries a deletion timestamp.
    MarkedForDeletion(ManagedObject),
}

/// Storage for objects of any kind.
///
/// Implementations must be safe to share across workers.
///
/// # Example
///
/// ```ignore
/// async fn touch(store: &dyn ObjectStore, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<(), StorageError> {
///     if let Some(object) = store.get(gvk, key).await? {
///         store.update(&object).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads one object. An absent object is `Ok(None)`.
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<Option<ManagedObject>, StorageError>;

    /// Lists objects of a kind. An empty `namespace` lists every namespace.
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
    ) -> Result<Vec<ManagedObject>, StorageError>;

    /// Stores a new object and returns it as persisted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the object is already stored.
    async fn create(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError>;

    /// Replaces an existing object and returns it as persisted.
    ///
    /// When the body carries `metadata.resourceVersion` it must match the
    /// stored version.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if the object does not exist
    /// - `StorageError::Conflict` if the resource version is stale
    async fn update(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError>;

    /// Deletes an object, or marks it for deletion while finalizers remain.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the object does not exist.
    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DeleteOutcome, StorageError>;

    /// Name of the backend, for logs.
    fn backend_name(&self) -> &'static str;
}
