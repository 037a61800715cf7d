//! Capability trait for the metrics backend.

use std::time::Duration;

use async_trait::async_trait;

use mongowatch_types::MetricSample;

use crate::MonitorError;

/// Destination for metric batches.
#[async_trait]
pub trait MetricsSink: Send + Sync + 'static {
    /// Forward one batch, giving up after `timeout`.
    ///
    /// Failures are reported, never retried.
    async fn submit(&self, samples: &[MetricSample], timeout: Duration)
        -> Result<(), MonitorError>;
}
