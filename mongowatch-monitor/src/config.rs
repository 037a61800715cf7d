//! Named time bounds for every operation the engine performs.

use std::time::Duration;

use serde::Deserialize;

use mongowatch_adapters::MonitorError;

/// Interval between poll cycles when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Per-operation time bounds.
///
/// Nested operations are additionally clipped to whatever remains of the
/// enclosing budget, so e.g. a ping never outlives its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Everything done for one seed URI, fan-out included.
    pub seed: Duration,
    /// Connecting to a seed and reading the replica-set configuration.
    pub discovery: Duration,
    /// Reading replica-set status.
    pub status: Duration,
    /// One host liveness check: connect, probe, disconnect.
    pub host: Duration,
    /// The liveness probe itself.
    pub ping: Duration,
    /// One batch submission to the metrics backend.
    pub emission: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            seed: Duration::from_secs(30),
            discovery: Duration::from_secs(10),
            status: Duration::from_secs(10),
            host: Duration::from_secs(10),
            ping: Duration::from_secs(10),
            emission: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    /// Reject zero bounds, which would fail every operation immediately.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let named = [
            ("seed", self.seed),
            ("discovery", self.discovery),
            ("status", self.status),
            ("host", self.host),
            ("ping", self.ping),
            ("emission", self.emission),
        ];

        for (name, bound) in named {
            if bound.is_zero() {
                return Err(MonitorError::Config(format!("timeout '{}' must be non-zero", name)));
            }
        }
        Ok(())
    }
}

/// Timeouts as written in a config file, in whole seconds.
///
/// Missing keys fall back to [`Timeouts::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub seed: Option<u64>,
    pub discovery: Option<u64>,
    pub status: Option<u64>,
    pub host: Option<u64>,
    pub ping: Option<u64>,
    pub emission: Option<u64>,
}

impl From<&TimeoutSettings> for Timeouts {
    fn from(settings: &TimeoutSettings) -> Self {
        let defaults = Timeouts::default();
        let secs = |value: Option<u64>, fallback: Duration| value.map_or(fallback, Duration::from_secs);

        Self {
            seed: secs(settings.seed, defaults.seed),
            discovery: secs(settings.discovery, defaults.discovery),
            status: secs(settings.status, defaults.status),
            host: secs(settings.host, defaults.host),
            ping: secs(settings.ping, defaults.ping),
            emission: secs(settings.emission, defaults.emission),
        }
    }
}

/// Resolve a configured interval in seconds; zero means the default.
pub fn interval_from_secs(secs: u64) -> Duration {
    if secs == 0 {
        DEFAULT_INTERVAL
    } else {
        Duration::from_secs(secs)
    }
}
