//! Forwarding metric batches to the backend under a bounded deadline.

use std::sync::Arc;
use std::time::Duration;

use mongowatch_adapters::{MetricsSink, MonitorError};
use mongowatch_types::MetricSample;

use crate::budget::Deadline;

/// Submits batches to a [`MetricsSink`].
///
/// A failed batch is reported to the caller and dropped. The next cycle
/// produces fresh samples, so nothing is retried.
pub struct MetricsEmitter {
    sink: Arc<dyn MetricsSink>,
    timeout: Duration,
}

impl MetricsEmitter {
    /// Create an emitter bounding every submission by `timeout`.
    pub fn new(sink: Arc<dyn MetricsSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Forward `samples` as one batch.
    pub async fn submit(
        &self,
        samples: Vec<MetricSample>,
        deadline: &Deadline,
    ) -> Result<(), MonitorError> {
        if samples.is_empty() {
            return Ok(());
        }

        let budget = deadline.child(self.timeout);
        let bound = budget.remaining_or(self.timeout);
        budget.run(self.sink.submit(&samples, bound)).await
    }
}

impl std::fmt::Debug for MetricsEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEmitter")
            .field("timeout", &self.timeout)
            .finish()
    }
}
