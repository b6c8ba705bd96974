//! Reconcilers by kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use scribe_core::events::EventRecorder;
use scribe_core::{ExpressionEvaluator, GroupVersionKind};
use scribe_storage::DynStore;

use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::reconciler::GenericReconciler;
use crate::scope::NamespaceScope;

/// One `GenericReconciler` per watched kind.
#[derive(Default)]
pub struct KindRegistry {
    reconcilers: BTreeMap<GroupVersionKind, Arc<GenericReconciler>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a reconciler for every kind listed in `config.types`.
    pub fn from_config(
        config: &AppConfig,
        store: DynStore,
        evaluator: Arc<dyn ExpressionEvaluator>,
        recorder: Arc<dyn EventRecorder>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for gvk in config.kinds()? {
            let scope = NamespaceScope::new(store.clone(), evaluator.clone());
            let reconciler = GenericReconciler::new(
                gvk.clone(),
                store.clone(),
                scope,
                recorder.clone(),
                metrics.clone(),
            );
            if registry.register(reconciler).is_some() {
                tracing::warn!(group_version_kind = %gvk, "Kind configured more than once");
            }
        }
        Ok(registry)
    }

    /// Adds a reconciler, returning the one it replaced.
    pub fn register(&mut self, reconciler: GenericReconciler) -> Option<Arc<GenericReconciler>> {
        self.reconcilers
            .insert(reconciler.gvk().clone(), Arc::new(reconciler))
    }

    pub fn get(&self, gvk: &GroupVersionKind) -> Option<&Arc<GenericReconciler>> {
        self.reconcilers.get(gvk)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &GroupVersionKind> {
        self.reconcilers.keys()
    }

    pub fn len(&self) -> usize {
        self.reconcilers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconcilers.is_empty()
    }
}
