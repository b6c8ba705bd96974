//! # scribe-storage
//!
//! Boundary between the controller and whatever holds the objects.
//!
//! The main trait is [`ObjectStore`]: get, list, create, update and delete
//! for objects of any kind. Backends live in separate crates. Wrapping a
//! backend in [`EventedStore`] turns every successful write into a
//! [`ChangeEvent`](scribe_core::events::ChangeEvent) on the shared
//! broadcaster, which is what the controller watches.
//!
//! ```ignore
//! use scribe_storage::{ObjectStore, StorageError};
//!
//! async fn pods(store: &dyn ObjectStore, ns: &str) -> Result<usize, StorageError> {
//!     let gvk = GroupVersionKind::new("", "v1", "Pod");
//!     Ok(store.list(&gvk, ns).await?.len())
//! }
//! ```

mod error;
pub mod evented;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use evented::EventedStore;
pub use traits::{DeleteOutcome, ObjectStore};

/// Shared store trait object.
pub type DynStore = std::sync::Arc<dyn ObjectStore>;
