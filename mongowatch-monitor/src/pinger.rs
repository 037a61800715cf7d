//! Member liveness over a direct connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use mongowatch_adapters::{ConnectMode, DatabaseConnector, DatabaseHandle, MonitorError};
use mongowatch_types::{Credentials, MetricSample};

use crate::budget::{release, Deadline};
use crate::config::Timeouts;
use crate::emitter::MetricsEmitter;

/// Probes single members and reports the ones that answer.
///
/// There is no explicit "down" value: a member that fails its probe simply
/// gets no liveness sample for the cycle.
pub struct HostPinger<C> {
    connector: Arc<C>,
    emitter: Arc<MetricsEmitter>,
    host_timeout: Duration,
    ping_timeout: Duration,
}

impl<C: DatabaseConnector> HostPinger<C> {
    pub fn new(connector: Arc<C>, emitter: Arc<MetricsEmitter>, timeouts: &Timeouts) -> Self {
        Self {
            connector,
            emitter,
            host_timeout: timeouts.host,
            ping_timeout: timeouts.ping,
        }
    }

    /// Probe `host` and emit its liveness sample on success.
    ///
    /// Fails only when the member does not answer. For a member that does,
    /// returns whether its sample was accepted by the backend. Failures are
    /// logged here; the returned error is informational.
    pub async fn check_liveness(
        &self,
        host: &str,
        credentials: &Credentials,
        deadline: &Deadline,
    ) -> Result<bool, MonitorError> {
        if let Err(e) = self.probe(host, credentials, deadline).await {
            error!(host = %host, error = %e, "Liveness check failed");
            return Err(e);
        }
        debug!(host = %host, "Ping success");

        match self
            .emitter
            .submit(vec![MetricSample::liveness(host)], deadline)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(host = %host, error = %e, "Could not send liveness metric");
                Ok(false)
            }
        }
    }

    async fn probe(
        &self,
        host: &str,
        credentials: &Credentials,
        deadline: &Deadline,
    ) -> Result<(), MonitorError> {
        let budget = deadline.child(self.host_timeout);
        let handle = budget
            .run(self.connector.connect(
                host,
                ConnectMode::Direct,
                credentials,
                budget.remaining_or(self.host_timeout),
            ))
            .await?;

        let probe = budget.child(self.ping_timeout);
        let result = probe
            .run(handle.ping(probe.remaining_or(self.ping_timeout)))
            .await;

        release(handle, &budget, self.host_timeout).await;
        result
    }
}

impl<C> std::fmt::Debug for HostPinger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPinger")
            .field("host_timeout", &self.host_timeout)
            .field("ping_timeout", &self.ping_timeout)
            .finish()
    }
}
