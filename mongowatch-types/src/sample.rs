//! Metric datapoints forwarded to the metrics backend.

use std::collections::BTreeMap;

use crate::LagSample;

/// Gauge emitted with value `1.0` for every member that answered a ping.
pub const UP_METRIC: &str = "mongodb.up";

/// Gauge carrying a secondary's replication lag in seconds.
pub const LAG_METRIC: &str = "mongodb.lag.seconds";

/// Dimension key identifying the member a sample describes.
pub const HOST_DIMENSION: &str = "host";

/// Kind of datapoint. Only gauges are produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MetricKind {
    #[default]
    Gauge,
}

/// One (name, dimensions, value) measurement.
///
/// The timestamp is captured when the sample is created, so a batch that
/// is delayed on its way to the backend still reports when it was measured.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSample {
    pub metric: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: MetricKind,

    pub dimensions: BTreeMap<String, String>,

    pub value: f64,

    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
}

impl MetricSample {
    /// Create a gauge stamped with the current time.
    pub fn gauge(metric: impl Into<String>, dimensions: BTreeMap<String, String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            kind: MetricKind::Gauge,
            dimensions,
            value,
            timestamp_ms: current_timestamp_ms(),
        }
    }

    /// Liveness gauge for a member that answered its probe.
    pub fn liveness(host: impl Into<String>) -> Self {
        Self::gauge(UP_METRIC, host_dimensions(host), 1.0)
    }

    /// Lag gauge for one secondary, in seconds.
    pub fn lag(sample: &LagSample) -> Self {
        Self::gauge(
            LAG_METRIC,
            host_dimensions(sample.host.clone()),
            sample.as_secs_f64(),
        )
    }

    /// Override the timestamp.
    pub fn with_timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// The `host` dimension, if present.
    pub fn host(&self) -> Option<&str> {
        self.dimensions.get(HOST_DIMENSION).map(String::as_str)
    }
}

fn host_dimensions(host: impl Into<String>) -> BTreeMap<String, String> {
    let mut dimensions = BTreeMap::new();
    dimensions.insert(HOST_DIMENSION.to_string(), host.into());
    dimensions
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
