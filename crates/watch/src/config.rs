//! Watch configuration

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "WATCH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Cluster whose state is mirrored; first path segment under `clusters/`
    pub cluster_id: String,

    /// Storage service base URL
    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,

    /// Port for health, metrics and event ingestion
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Age after which an unrefreshed node is swept
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,

    /// Whether application nodes take part in sweeps
    #[serde(default = "default_true")]
    pub application_check_dirty: bool,

    #[serde(default = "default_event_workers")]
    pub event_workers: usize,

    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Keep nodes in memory instead of talking to the storage service
    #[serde(default)]
    pub dry_run: bool,
}

fn default_storage_endpoint() -> String {
    "http://bcs-storage:50024".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_stale_threshold() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_event_workers() -> usize {
    4
}

fn default_event_buffer() -> usize {
    1024
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl WatchConfig {
    /// Load configuration from the optional file and `WATCH_*` variables
    ///
    /// Environment variables override file values.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::from_sources(file.as_deref(), environment())
    }

    fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: WatchConfig = builder
            .add_source(env)
            .build()
            .context("failed to read watch configuration")?
            .try_deserialize()
            .context("invalid watch configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            bail!("cluster_id must not be empty");
        }
        if self.event_workers == 0 {
            bail!("event_workers must be at least 1");
        }
        if self.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be at least 1");
        }
        // A zero threshold would sweep every node not written this second
        if self.stale_threshold_secs == 0 {
            bail!("stale_threshold_secs must be at least 1");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("WATCH").try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let vars: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    #[test]
    fn test_defaults_apply() {
        let config =
            WatchConfig::from_sources(None, env_from(&[("WATCH_CLUSTER_ID", "BCS-MESOS-10001")]))
                .unwrap();

        assert_eq!(config.cluster_id, "BCS-MESOS-10001");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.stale_threshold(), Duration::from_secs(600));
        assert!(config.application_check_dirty);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_cluster_id_is_required() {
        assert!(WatchConfig::from_sources(None, env_from(&[])).is_err());
        assert!(
            WatchConfig::from_sources(None, env_from(&[("WATCH_CLUSTER_ID", "  ")])).is_err()
        );
    }

    #[test]
    fn test_environment_values_are_parsed() {
        let config = WatchConfig::from_sources(
            None,
            env_from(&[
                ("WATCH_CLUSTER_ID", "c1"),
                ("WATCH_EVENT_WORKERS", "8"),
                ("WATCH_DRY_RUN", "true"),
                ("WATCH_APPLICATION_CHECK_DIRTY", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.event_workers, 8);
        assert!(config.dry_run);
        assert!(!config.application_check_dirty);
    }

    #[test]
    fn test_file_is_overridden_by_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "cluster_id = \"from-file\"\nstorage_endpoint = \"http://storage.local:50024\"\napi_port = 9000"
        )
        .unwrap();

        let config = WatchConfig::from_sources(
            Some(file.path()),
            env_from(&[("WATCH_API_PORT", "9100")]),
        )
        .unwrap();

        assert_eq!(config.cluster_id, "from-file");
        assert_eq!(config.storage_endpoint, "http://storage.local:50024");
        assert_eq!(config.api_port, 9100);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = WatchConfig::from_sources(
            Some(Path::new("/nonexistent/storage-watch.toml")),
            env_from(&[("WATCH_CLUSTER_ID", "c1")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = WatchConfig::from_sources(
            None,
            env_from(&[("WATCH_CLUSTER_ID", "c1"), ("WATCH_EVENT_WORKERS", "0")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_stale_threshold_rejected() {
        let result = WatchConfig::from_sources(
            None,
            env_from(&[("WATCH_CLUSTER_ID", "c1"), ("WATCH_STALE_THRESHOLD_SECS", "0")]),
        );
        assert!(result.is_err());

        let config = WatchConfig::from_sources(
            None,
            env_from(&[("WATCH_CLUSTER_ID", "c1"), ("WATCH_STALE_THRESHOLD_SECS", "1")]),
        )
        .unwrap();
        assert_eq!(config.stale_threshold(), Duration::from_secs(1));
    }
}
