//! Controller error types.

use std::time::Duration;

use scribe_core::{GroupVersionKind, ObjectReference, TemplateError};
use scribe_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by a reconciliation pass or by controller setup.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to get {object}: {source}")]
    Fetch {
        object: ObjectReference,
        #[source]
        source: StorageError,
    },

    #[error("failed to list {kind} in namespace {namespace:?}: {source}")]
    List {
        kind: GroupVersionKind,
        namespace: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to update annotations on {object}: {source}")]
    Update {
        object: ObjectReference,
        #[source]
        source: StorageError,
    },

    #[error("failed to render the annotation template of {scope}: {source}")]
    Template {
        scope: ObjectReference,
        #[source]
        source: TemplateError,
    },

    /// The scope renders nothing and nothing was applied before.
    #[error("skip reconciliation")]
    SkipReconciliation,

    #[error("reconciliation of {0} was cancelled")]
    Cancelled(ObjectReference),

    #[error("reconciliation of {object} timed out after {timeout:?}")]
    Timeout {
        object: ObjectReference,
        timeout: Duration,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ControllerError {
    pub fn fetch(object: ObjectReference, source: StorageError) -> Self {
        Self::Fetch { object, source }
    }

    pub fn list(kind: GroupVersionKind, namespace: impl Into<String>, source: StorageError) -> Self {
        Self::List {
            kind,
            namespace: namespace.into(),
            source,
        }
    }

    pub fn update(object: ObjectReference, source: StorageError) -> Self {
        Self::Update { object, source }
    }

    pub fn template(scope: ObjectReference, source: TemplateError) -> Self {
        Self::Template { scope, source }
    }

    /// Whether this is the skip sentinel rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkipReconciliation)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The store error behind a failed fetch, list or update.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Fetch { source, .. } | Self::List { source, .. } | Self::Update { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
