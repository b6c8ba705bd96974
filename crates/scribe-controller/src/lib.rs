//! # scribe-controller
//!
//! Keeps the annotations of watched objects in sync with the template their
//! Namespace carries under `scribe.anza-labs.dev/annotations`.
//!
//! - [`scope`]: renders the Namespace template and merges it into an object
//! - [`reconciler`]: one pass per object (fetch, resolve, validate, diff, persist)
//! - [`fanout`]: a Namespace change re-queues every object in it
//! - [`manager`]: work queues and workers driven by store change events

pub mod config;
pub mod error;
pub mod fanout;
pub mod manager;
pub mod metrics;
pub mod observability;
pub mod queue;
pub mod reconciler;
pub mod registry;
pub mod scope;
pub mod seed;

pub use config::{AppConfig, ConfigError, ControllerSettings, TypeConfig};
pub use error::{ControllerError, Result};
pub use manager::Manager;
pub use metrics::{InMemoryMetrics, MetricsSink, PrometheusMetrics};
pub use queue::{Backoff, WorkQueue};
pub use reconciler::{GenericReconciler, ReconcileOutcome};
pub use registry::KindRegistry;
pub use scope::NamespaceScope;
