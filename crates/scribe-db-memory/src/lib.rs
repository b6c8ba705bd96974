//! In-memory object store for scribe.
//!
//! Implements [`ObjectStore`](scribe_storage::ObjectStore) on a concurrent
//! map. Used by tests and by the controller binary in local mode.
//!
//! ```ignore
//! use scribe_db_memory::InMemoryStore;
//! use scribe_storage::ObjectStore;
//!
//! let store = InMemoryStore::new();
//! let created = store.create(&pod).await?;
//! assert_eq!(created.resource_version(), Some("1"));
//! ```

pub mod storage;

pub use scribe_storage::{ObjectStore, StorageError};
pub use storage::{InMemoryStore, StorageKey};

/// Creates a new shared in-memory store.
pub fn create_store() -> scribe_storage::DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
