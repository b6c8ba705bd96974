use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use scribe_controller::config::loader::load_config;
use scribe_controller::metrics::{init_metrics, render_metrics};
use scribe_controller::{KindRegistry, Manager, MetricsSink, PrometheusMetrics, observability, seed};
use scribe_core::DotPathEvaluator;
use scribe_core::events::EventBroadcaster;
use scribe_db_memory::InMemoryStore;
use scribe_storage::{DynStore, EventedStore};
use tokio_util::sync::CancellationToken;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From SCRIBE_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (scribe.yaml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (SCRIBE_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = load_config(Some(&config_path)).context("Configuration error")?;
    tracing::info!(path = %config_path, source = %source, "Configuration loaded");

    observability::apply_logging_level(&cfg.logging.level);

    if cfg.metrics.enabled {
        let listen_address = cfg
            .metrics
            .listen_address
            .as_deref()
            .map(str::parse::<SocketAddr>)
            .transpose()
            .context("Invalid metrics.listen_address")?;
        init_metrics(listen_address);
    }
    let metrics: Arc<dyn MetricsSink> = Arc::new(PrometheusMetrics);

    let broadcaster = EventBroadcaster::new_shared();
    let store: DynStore = Arc::new(EventedStore::new(InMemoryStore::new(), broadcaster.clone()));

    if let Some(path) = cfg.store.seed_file.as_deref() {
        let objects = seed::load_seed(path).context("Seed error")?;
        let created = seed::seed_store(store.as_ref(), objects)
            .await
            .context("Failed to seed the in-memory store")?;
        tracing::info!(path, created, "Seeded in-memory store");
    }

    let registry = KindRegistry::from_config(
        &cfg,
        store.clone(),
        Arc::new(DotPathEvaluator),
        broadcaster.clone(),
        metrics,
    )?;
    for gvk in registry.kinds() {
        tracing::info!(group_version_kind = %gvk, "Watching kind");
    }

    let manager = Manager::new(registry, store, broadcaster, cfg.controller.clone());

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            shutdown.cancel();
        }
    });

    manager.run(shutdown).await?;

    if let Some(rendered) = render_metrics() {
        tracing::debug!(metrics = %rendered, "Final metrics");
    }
    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: SCRIBE_CONFIG
/// 3. Default: scribe.yaml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("SCRIBE_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    ("scribe.yaml".to_string(), ConfigSource::Default)
}
