//! Loading and validating the YAML configuration file.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use mongowatch_adapters::signalfx::DEFAULT_INGEST_URL;
use mongowatch_monitor::{interval_from_secs, MonitorError, TimeoutSettings, Timeouts};
use mongowatch_types::ClusterGroup;

/// Prefix of environment variables layered over the file,
/// e.g. `MONGOWATCH_SIGNALFX__AUTH_TOKEN`.
pub const ENV_PREFIX: &str = "MONGOWATCH";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,

    /// Seconds between poll cycles; zero or absent means 60.
    #[serde(default)]
    pub interval: u64,

    pub signalfx: SignalFxConfig,

    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

/// One cluster group as written in the file.
#[derive(Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub uris: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("uris", &self.uris)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct SignalFxConfig {
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,
}

impl fmt::Debug for SignalFxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalFxConfig")
            .field("auth_token", &"<redacted>")
            .field("ingest_url", &self.ingest_url)
            .finish()
    }
}

fn default_ingest_url() -> String {
    DEFAULT_INGEST_URL.to_string()
}

impl AppConfig {
    /// Read `path` as YAML, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| MonitorError::Config(e.to_string()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would otherwise fail on every cycle.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.signalfx.auth_token.trim().is_empty() {
            return Err(MonitorError::Config(
                "signalfx.auth_token must be set".to_string(),
            ));
        }

        if let Some(index) = self.clusters.iter().position(|c| c.uris.is_empty()) {
            return Err(MonitorError::Config(format!(
                "cluster {} has no seed uris",
                index
            )));
        }

        self.timeouts().validate()
    }

    pub fn cluster_groups(&self) -> Vec<ClusterGroup> {
        self.clusters
            .iter()
            .map(|c| ClusterGroup::new(c.uris.clone(), c.username.clone(), c.password.clone()))
            .collect()
    }

    pub fn interval(&self) -> Duration {
        interval_from_secs(self.interval)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from(&self.timeouts)
    }
}
