use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use scribe_core::GroupVersionKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(String),

    #[error("config deserialize error: {0}")]
    Deserialize(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Kinds whose annotations are managed
    #[serde(default)]
    pub types: Vec<TypeConfig>,
    #[serde(default)]
    pub controller: ControllerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.types.is_empty() {
            return Err(ConfigError::invalid("types must list at least one kind"));
        }
        for (index, entry) in self.types.iter().enumerate() {
            if entry.api_version.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "types[{index}].apiVersion must not be empty"
                )));
            }
            if entry.kind.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "types[{index}].kind must not be empty"
                )));
            }
            entry.gvk()?;
        }
        // Controller validations
        if self.controller.workers == 0 {
            return Err(ConfigError::invalid("controller.workers must be > 0"));
        }
        if self.controller.reconcile_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "controller.reconcile_timeout_ms must be > 0",
            ));
        }
        if self.controller.backoff_base_ms == 0 {
            return Err(ConfigError::invalid("controller.backoff_base_ms must be > 0"));
        }
        if self.controller.backoff_base_ms > self.controller.backoff_max_ms {
            return Err(ConfigError::invalid(
                "controller.backoff_base_ms must be <= controller.backoff_max_ms",
            ));
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        if let Some(addr) = self.metrics.listen_address.as_deref()
            && addr.parse::<std::net::SocketAddr>().is_err()
        {
            return Err(ConfigError::invalid(format!(
                "metrics.listen_address {addr:?} is not a socket address"
            )));
        }
        Ok(())
    }

    /// Group/version/kind of every configured type, in configuration order.
    pub fn kinds(&self) -> Result<Vec<GroupVersionKind>, ConfigError> {
        self.types.iter().map(TypeConfig::gvk).collect()
    }
}

/// One watched kind, written the way it appears in manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConfig {
    #[serde(rename = "apiVersion", alias = "apiversion", alias = "api_version")]
    pub api_version: String,
    pub kind: String,
}

impl TypeConfig {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    pub fn gvk(&self) -> Result<GroupVersionKind, ConfigError> {
        GroupVersionKind::from_api_version_and_kind(&self.api_version, self.kind.clone())
            .map_err(|e| ConfigError::invalid(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Concurrent reconcile workers per kind
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_reconcile_timeout_ms")]
    pub reconcile_timeout_ms: u64,
    /// First retry delay after a failed pass
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Period of the full relist; 0 disables it
    #[serde(default = "default_resync_interval_ms")]
    pub resync_interval_ms: u64,
}

fn default_workers() -> usize {
    4
}
fn default_reconcile_timeout_ms() -> u64 {
    30_000
}
fn default_backoff_base_ms() -> u64 {
    5
}
fn default_backoff_max_ms() -> u64 {
    1_000_000
}
fn default_resync_interval_ms() -> u64 {
    10 * 60 * 60 * 1000
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            reconcile_timeout_ms: default_reconcile_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            resync_interval_ms: default_resync_interval_ms(),
        }
    }
}

impl ControllerSettings {
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_ms > 0).then(|| Duration::from_millis(self.resync_interval_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Serve `/metrics` on this address, e.g. `0.0.0.0:8080`
    #[serde(default)]
    pub listen_address: Option<String>,
}
fn default_true() -> bool {
    true
}
impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// JSON file with objects loaded into the in-memory store at startup
    #[serde(default)]
    pub seed_file: Option<String>,
}

pub mod loader {
    use super::*;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("scribe.yaml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., SCRIBE__CONTROLLER__WORKERS=8
        builder = builder.add_source(
            Environment::with_prefix("SCRIBE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Build(e.to_string()))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        AppConfig {
            types: vec![TypeConfig::new("v1", "Pod")],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = valid();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.controller.workers, 4);
        assert_eq!(cfg.controller.reconcile_timeout(), Duration::from_secs(30));
        assert_eq!(
            cfg.controller.resync_interval(),
            Some(Duration::from_secs(10 * 60 * 60))
        );
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.metrics.enabled);
    }

    #[test]
    fn test_zero_resync_interval_disables_resync() {
        let settings = ControllerSettings {
            resync_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(settings.resync_interval(), None);
    }

    #[test]
    fn test_kinds() {
        let mut cfg = valid();
        cfg.types.push(TypeConfig::new("apps/v1", "Deployment"));
        assert_eq!(
            cfg.kinds().unwrap(),
            vec![
                GroupVersionKind::new("", "v1", "Pod"),
                GroupVersionKind::new("apps", "v1", "Deployment"),
            ]
        );
    }

    #[test]
    fn test_validation_failures() {
        let mut cfg = valid();
        cfg.types.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.types.push(TypeConfig::new("", "Pod"));
        assert!(cfg.validate().unwrap_err().to_string().contains("types[1].apiVersion"));

        let mut cfg = valid();
        cfg.types.push(TypeConfig::new("a/b/c", "Pod"));
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.controller.workers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.controller.reconcile_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.controller.backoff_base_ms = 10;
        cfg.controller.backoff_max_ms = 5;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.metrics.listen_address = Some("not-an-address".into());
        assert!(cfg.validate().is_err());
    }
}
