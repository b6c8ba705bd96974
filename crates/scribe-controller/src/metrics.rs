//! Prometheus metrics for the scribe controller.
//!
//! Reconcilers never reach for the global recorder directly; they report
//! through a [`MetricsSink`] handed to them at construction.
//!
//! - `validation_errors{source_namespace}`: passes that dropped invalid keys
//! - `reconcile_total{kind,outcome}`: finished passes by outcome
//! - `reconcile_duration_seconds{kind}`: pass latency

use dashmap::DashMap;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const VALIDATION_ERRORS: &str = "validation_errors";
    pub const RECONCILE_TOTAL: &str = "reconcile_total";
    pub const RECONCILE_DURATION_SECONDS: &str = "reconcile_duration_seconds";
}

/// Initialize the Prometheus metrics exporter.
///
/// With a listen address the exporter also serves `/metrics` over HTTP;
/// this must then run inside a tokio runtime.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics(listen_address: Option<SocketAddr>) -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    let builder = PrometheusBuilder::new();
    let installed = match listen_address {
        Some(addr) => match builder.with_http_listener(addr).build() {
            Ok((recorder, exporter)) => {
                let handle = recorder.handle();
                match metrics::set_global_recorder(recorder) {
                    Ok(()) => {
                        tokio::spawn(async move {
                            if let Err(e) = exporter.await {
                                tracing::error!(error = ?e, "Prometheus exporter stopped");
                            }
                        });
                        Ok(handle)
                    }
                    Err(e) => Err(e.to_string()),
                }
            }
            Err(e) => Err(e.to_string()),
        },
        None => builder.install_recorder().map_err(|e| e.to_string()),
    };

    match installed {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            describe_metrics();
            tracing::info!(listen_address = ?listen_address, "Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!(
        names::VALIDATION_ERRORS,
        "Reconciliation passes that dropped annotation keys failing validation"
    );
    metrics::describe_counter!(names::RECONCILE_TOTAL, "Finished reconciliation passes");
    metrics::describe_histogram!(
        names::RECONCILE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Reconciliation pass latency"
    );
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Destination for the counters a reconciliation pass reports.
///
/// Implementations must tolerate concurrent calls from many workers
/// without losing increments.
pub trait MetricsSink: Send + Sync {
    /// Counts one pass that dropped invalid keys for objects in `scope`.
    fn increment_validation_errors(&self, scope: &str);

    fn record_reconcile(&self, kind: &str, outcome: &str, duration: Duration);
}

/// Sink backed by the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn increment_validation_errors(&self, scope: &str) {
        counter!(names::VALIDATION_ERRORS, "source_namespace" => scope.to_string()).increment(1);
    }

    fn record_reconcile(&self, kind: &str, outcome: &str, duration: Duration) {
        counter!(
            names::RECONCILE_TOTAL,
            "kind" => kind.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
        histogram!(names::RECONCILE_DURATION_SECONDS, "kind" => kind.to_string())
            .record(duration.as_secs_f64());
    }
}

/// Sink that keeps counts in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    validation_errors: DashMap<String, AtomicU64>,
    reconciles: DashMap<(String, String), AtomicU64>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validation_errors(&self, scope: &str) -> u64 {
        self.validation_errors
            .get(scope)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn reconciles(&self, kind: &str, outcome: &str) -> u64 {
        self.reconciles
            .get(&(kind.to_string(), outcome.to_string()))
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn total_reconciles(&self) -> u64 {
        self.reconciles
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment_validation_errors(&self, scope: &str) {
        self.validation_errors
            .entry(scope.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconcile(&self, kind: &str, outcome: &str, _duration: Duration) {
        self.reconciles
            .entry((kind.to_string(), outcome.to_string()))
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }
}
