//! Tracing setup for the controller.
//!
//! The subscriber is installed before the configuration is read, so the
//! filter sits behind a reload layer and the configured `logging.level` is
//! swapped in afterwards. `RUST_LOG` always wins over the configured level.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

const STARTUP_LEVEL: &str = "info";

fn rust_log() -> Option<String> {
    std::env::var("RUST_LOG").ok().filter(|value| !value.trim().is_empty())
}

/// Builds the filter for `level`, letting valid `RUST_LOG` directives override it.
fn build_filter(level: &str, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// Installs the global subscriber at the startup level.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = build_filter(STARTUP_LEVEL, rust_log().as_deref());
    let (filter_layer, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
    installed
}

/// Switches the active filter to `level` unless `RUST_LOG` is set.
///
/// Returns `true` when the filter changed.
pub fn apply_logging_level(level: &str) -> bool {
    if rust_log().is_some() {
        tracing::debug!(level, "RUST_LOG is set, keeping its directives");
        return false;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    match handle.reload(build_filter(level, None)) {
        Ok(()) => {
            tracing::debug!(level, "Applied logging level");
            true
        }
        Err(e) => {
            tracing::warn!(level, error = %e, "Failed to apply logging level");
            false
        }
    }
}
