//! Resolution of the annotation set an object should carry.
//!
//! The scope of a namespaced object is its Namespace. The Namespace's
//! `scribe.anza-labs.dev/annotations` annotation holds the template that is
//! rendered against the object and merged into its annotations.

use std::sync::Arc;

use scribe_core::annotations;
use scribe_core::{
    Annotations, ExpressionEvaluator, LAST_APPLIED_ANNOTATION, ManagedObject, MergeOutcome,
    ObjectReference, TEMPLATE_ANNOTATION, last_applied_from, merge,
};
use scribe_storage::{DynStore, StorageError};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{ControllerError, Result};
use crate::reconciler::with_cancellation;

pub struct NamespaceScope {
    store: DynStore,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl NamespaceScope {
    pub fn new(store: DynStore, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { store, evaluator }
    }

    /// The Namespace whose template applies to `object`.
    ///
    /// A Namespace is its own scope. Other cluster-scoped objects have none.
    pub fn scope_of(object: &ManagedObject) -> Option<ObjectReference> {
        if object.gvk().is_namespace() {
            return Some(ObjectReference::namespace(object.name()));
        }
        match object.namespace() {
            "" => None,
            namespace => Some(ObjectReference::namespace(namespace)),
        }
    }

    /// Computes the annotation map `object` should carry under `scope`.
    ///
    /// # Errors
    ///
    /// - `ControllerError::Fetch` if the scope cannot be read or does not exist
    /// - `ControllerError::Template` if the template does not render
    /// - `ControllerError::SkipReconciliation` if nothing is rendered and
    ///   nothing was applied before
    pub async fn update_annotations(
        &self,
        scope: &ObjectReference,
        object: &ManagedObject,
        cancel: &CancellationToken,
    ) -> Result<Annotations> {
        let namespace = with_cancellation(
            cancel,
            &object.reference(),
            self.store.get(&scope.gvk, &scope.key),
        )
        .await?
        .map_err(|e| ControllerError::fetch(scope.clone(), e))?
        .ok_or_else(|| ControllerError::fetch(scope.clone(), StorageError::not_found(scope)))?;

        let template = namespace
            .annotations()
            .remove(TEMPLATE_ANNOTATION)
            .unwrap_or_default();
        let rendered = self
            .evaluator
            .evaluate(&template, object.body())
            .map_err(|e| ControllerError::template(scope.clone(), e))?;

        let current = object.annotations();
        let expected = annotations::parse(&rendered);
        let last_applied = last_applied_from(&current, LAST_APPLIED_ANNOTATION);
        trace!(
            expected = expected.len(),
            last_applied = last_applied.len(),
            "Merging annotations"
        );

        match merge(&current, &expected, &last_applied, LAST_APPLIED_ANNOTATION) {
            MergeOutcome::Skip => Err(ControllerError::SkipReconciliation),
            MergeOutcome::Merged(merged) => Ok(merged),
        }
    }
}
