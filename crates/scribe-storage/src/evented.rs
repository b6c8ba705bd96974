//! Store wrapper that publishes change events after writes.
//!
//! ```ignore
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(InMemoryStore::new(), broadcaster.clone());
//! let mut changes = broadcaster.subscribe();
//!
//! store.create(&pod).await?; // changes receives ChangeEvent::Applied
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use scribe_core::events::{ChangeEvent, EventBroadcaster};
use scribe_core::{GroupVersionKind, ManagedObject, ObjectKey};
use tracing::debug;

use crate::error::StorageError;
use crate::traits::{DeleteOutcome, ObjectStore};

/// Delegates to an inner store and emits a `ChangeEvent` after every
/// successful write. Reads never emit.
pub struct EventedStore<S: ObjectStore> {
    inner: S,
    broadcaster: Arc<EventBroadcaster>,
}

impl<S: ObjectStore> EventedStore<S> {
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    fn emit(&self, event: ChangeEvent) {
        if self.broadcaster.subscriber_count() == 0 {
            return;
        }
        let object = event.reference();
        let change = event.change_type;
        let count = self.broadcaster.send_change(event);
        debug!(
            object = %object,
            change = %change,
            subscribers = count,
            "Emitted change event"
        );
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for EventedStore<S> {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<Option<ManagedObject>, StorageError> {
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
        let created = self.inner.create(object).await?;
        self.emit(ChangeEvent::applied(created.clone()));
        Ok(created)
    }

    async fn update(&self, object: &ManagedObject) -> Result<ManagedObject, StorageError> {
        let updated = self.inner.update(object).await?;
        self.emit(ChangeEvent::applied(updated.clone()));
        Ok(updated)
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DeleteOutcome, StorageError> {
        let outcome = self.inner.delete(gvk, key).await?;
        let event = match &outcome {
            DeleteOutcome::Removed(object) => ChangeEvent::deleted(object.clone()),
            DeleteOutcome::MarkedForDeletion(object) => ChangeEvent::applied(object.clone()),
        };
        self.emit(event);
        Ok(outcome)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
