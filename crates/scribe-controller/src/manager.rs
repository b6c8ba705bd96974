//! Drives the reconcilers from store change events.
//!
//! ```text
//!  EventedStore ──ChangeEvent──▶ Manager ──key──▶ WorkQueue(kind) ──▶ workers ──▶ GenericReconciler
//!                                   │
//!                                   └─ Namespace event ─▶ fan-out ─▶ every kind's queue
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use scribe_core::events::{ChangeEvent, ChangeType, EventBroadcaster, SystemEvent};
use scribe_core::GroupVersionKind;
use scribe_storage::DynStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ControllerSettings;
use crate::error::{ControllerError, Result};
use crate::fanout;
use crate::queue::{Backoff, WorkQueue};
use crate::reconciler::GenericReconciler;
use crate::registry::KindRegistry;

pub struct Manager {
    registry: Arc<KindRegistry>,
    store: DynStore,
    broadcaster: Arc<EventBroadcaster>,
    settings: ControllerSettings,
    queues: BTreeMap<GroupVersionKind, Arc<WorkQueue>>,
}

impl Manager {
    pub fn new(
        registry: KindRegistry,
        store: DynStore,
        broadcaster: Arc<EventBroadcaster>,
        settings: ControllerSettings,
    ) -> Self {
        let backoff = Backoff::new(settings.backoff_base(), settings.backoff_max());
        let queues = registry
            .kinds()
            .map(|gvk| (gvk.clone(), Arc::new(WorkQueue::new(backoff))))
            .collect();
        Self {
            registry: Arc::new(registry),
            store,
            broadcaster,
            settings,
            queues,
        }
    }

    /// Runs until `shutdown` is cancelled or the event channel closes.
    ///
    /// Every watched kind is listed at startup, again whenever change events
    /// were missed, and every `resync_interval_ms` when that is non-zero.
    /// In between only change events trigger passes.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut events = self.broadcaster.subscribe();

        self.resync().await?;

        let mut periodic = self.settings.resync_interval().map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let workers = self.spawn_workers(&shutdown);
        info!(
            kinds = self.registry.len(),
            workers = workers.len(),
            backend = self.store.backend_name(),
            "Controller started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = next_tick(&mut periodic) => {
                    debug!("Periodic resync");
                    if let Err(e) = self.resync().await {
                        error!(error = %e, "Resync failed");
                    }
                }
                received = events.recv() => match received {
                    Ok(SystemEvent::Change(event)) => self.handle_change(event).await,
                    Ok(SystemEvent::Diagnostic(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed change events, resyncing");
                        if let Err(e) = self.resync().await {
                            error!(error = %e, "Resync failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        warn!("Change event channel closed");
                        break;
                    }
                },
            }
        }

        info!("Shutting down controller");
        shutdown.cancel();
        for queue in self.queues.values() {
            queue.shut_down();
        }
        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
            }
        }
        Ok(())
    }

    /// Queues every object of every watched kind.
    async fn resync(&self) -> Result<()> {
        for (gvk, queue) in &self.queues {
            let objects = self
                .store
                .list(gvk, "")
                .await
                .map_err(|e| ControllerError::list(gvk.clone(), "", e))?;
            debug!(group_version_kind = %gvk, count = objects.len(), "Initial sync");
            for object in objects {
                queue.add(object.key());
            }
        }
        Ok(())
    }

    async fn handle_change(&self, event: ChangeEvent) {
        let gvk = event.object.gvk();
        if let Some(queue) = self.queues.get(&gvk) {
            queue.add(event.object.key());
        }

        if !gvk.is_namespace() || event.change_type == ChangeType::Deleted {
            return;
        }

        for (kind, queue) in &self.queues {
            match fanout::expand(self.store.as_ref(), kind, &event.object).await {
                Ok(keys) => {
                    for key in keys {
                        queue.add(key);
                    }
                }
                Err(e) => error!(
                    namespace = event.object.name(),
                    error = %e,
                    "Unable to trigger reconcile"
                ),
            }
        }
    }

    fn spawn_workers(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for (gvk, queue) in &self.queues {
            let Some(reconciler) = self.registry.get(gvk) else {
                continue;
            };
            for _ in 0..self.settings.workers {
                handles.push(tokio::spawn(worker(
                    reconciler.clone(),
                    queue.clone(),
                    shutdown.clone(),
                    self.settings.reconcile_timeout(),
                )));
            }
        }
        handles
    }
}

/// Waits for the next resync tick; never resolves when resync is disabled.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn worker(
    reconciler: Arc<GenericReconciler>,
    queue: Arc<WorkQueue>,
    shutdown: CancellationToken,
    timeout: Duration,
) {
    while let Some(key) = queue.get().await {
        let pass = shutdown.child_token();
        match reconciler.reconcile_with_timeout(&key, &pass, timeout).await {
            Ok(_) => queue.forget(&key),
            Err(e) if e.is_cancelled() => {}
            Err(_) => queue.add_rate_limited(key.clone()),
        }
        queue.done(&key);
    }
}
