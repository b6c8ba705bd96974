//! One reconciliation pass for one object of one kind.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scribe_core::events::EventRecorder;
use scribe_core::{
    ANNOTATION_VALIDATION_FAILURE, GroupVersionKind, ObjectKey, ObjectReference,
    validate_annotations,
};
use scribe_storage::DynStore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, trace, warn};

use crate::error::{ControllerError, Result};
use crate::metrics::MetricsSink;
use crate::scope::NamespaceScope;

/// How a pass ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileOutcome {
    /// The object no longer exists.
    NotFound,
    /// The object carries a deletion timestamp.
    Deleted,
    /// The object has no scope, or its scope manages nothing for it.
    Skipped,
    /// The stored annotations already match.
    NoChange,
    /// New annotations were written.
    Updated,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
            Self::NoChange => "no_change",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runs `future` unless `cancel` fires first.
pub(crate) async fn with_cancellation<T>(
    cancel: &CancellationToken,
    object: &ObjectReference,
    future: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ControllerError::Cancelled(object.clone())),
        output = future => Ok(output),
    }
}

/// Reconciler for every object of a single kind.
pub struct GenericReconciler {
    gvk: GroupVersionKind,
    store: DynStore,
    scope: NamespaceScope,
    recorder: Arc<dyn EventRecorder>,
    metrics: Arc<dyn MetricsSink>,
}

impl GenericReconciler {
    pub fn new(
        gvk: GroupVersionKind,
        store: DynStore,
        scope: NamespaceScope,
        recorder: Arc<dyn EventRecorder>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            gvk,
            store,
            scope,
            recorder,
            metrics,
        }
    }

    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// Brings the annotations of the object at `key` in line with its scope.
    ///
    /// Validation failures are reported through the recorder and metrics
    /// sink; they never fail the pass.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let span = info_span!(
            "reconcile",
            group_version_kind = %self.gvk,
            namespaced_name = %key,
        );

        async {
            let started = Instant::now();
            let result = self.run(key, cancel).await;

            let outcome = match &result {
                Ok(outcome) => outcome.as_str(),
                Err(ControllerError::Cancelled(_)) => "cancelled",
                Err(e) => {
                    match e.storage_error() {
                        Some(source) => error!(
                            error = %e,
                            category = %source.category(),
                            "Reconciliation failed"
                        ),
                        None => error!(error = %e, "Reconciliation failed"),
                    }
                    "error"
                }
            };
            self.metrics
                .record_reconcile(&self.gvk.kind, outcome, started.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    /// Like [`reconcile`](Self::reconcile), but gives up after `timeout`.
    ///
    /// On expiry `cancel` is cancelled, the pass is counted with the
    /// `timeout` outcome and `ControllerError::Timeout` is returned.
    pub async fn reconcile_with_timeout(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.reconcile(key, cancel)).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                let object = ObjectReference::new(self.gvk.clone(), key.clone());
                error!(object = %object, timeout = ?timeout, "Reconciliation timed out");
                self.metrics
                    .record_reconcile(&self.gvk.kind, "timeout", started.elapsed());
                Err(ControllerError::Timeout { object, timeout })
            }
        }
    }

    async fn run(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<ReconcileOutcome> {
        let reference = ObjectReference::new(self.gvk.clone(), key.clone());
        debug!("Reconciling");

        let fetched = with_cancellation(cancel, &reference, self.store.get(&self.gvk, key))
            .await?
            .map_err(|e| ControllerError::fetch(reference.clone(), e))?;
        let Some(mut object) = fetched else {
            debug!("Not found, ignoring since object must be deleted");
            return Ok(ReconcileOutcome::NotFound);
        };

        if object.is_marked_for_deletion() {
            debug!("Ignoring object with deletion timestamp");
            return Ok(ReconcileOutcome::Deleted);
        }

        let Some(scope) = NamespaceScope::scope_of(&object) else {
            debug!("Ignoring cluster-scoped object without a namespace");
            return Ok(ReconcileOutcome::Skipped);
        };

        let merged = match self.scope.update_annotations(&scope, &object, cancel).await {
            Ok(merged) => merged,
            Err(e) if e.is_skip() => {
                debug!("Ignoring unmanaged object");
                return Ok(ReconcileOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let (accepted, validation_errors) = validate_annotations(&merged);
        if let Some(validation_errors) = validation_errors {
            self.metrics.increment_validation_errors(&scope.key.name);
            warn!(error = %validation_errors, "Validation error");
            self.recorder.warning(
                &scope,
                ANNOTATION_VALIDATION_FAILURE,
                &validation_errors.message(),
            );
            for item in &validation_errors.items {
                self.recorder
                    .warning(&reference, ANNOTATION_VALIDATION_FAILURE, &item.message());
            }
        }

        if object.annotations() == accepted {
            debug!("Nothing to do, skipping");
            return Ok(ReconcileOutcome::NoChange);
        }

        // Cancellation is honoured only before the write.
        if cancel.is_cancelled() {
            return Err(ControllerError::Cancelled(reference));
        }

        object.set_annotations(&accepted);
        self.store
            .update(&object)
            .await
            .map_err(|e| ControllerError::update(reference.clone(), e))?;

        trace!(annotations = accepted.len(), "Updated annotations");
        Ok(ReconcileOutcome::Updated)
    }
}
