//! Replica-set membership from `replSetGetConfig`.

use std::sync::Arc;
use std::time::Duration;

use bson::{doc, Document};
use serde::Deserialize;
use tracing::debug;

use mongowatch_adapters::{
    ConnectMode, DatabaseConnector, DatabaseHandle, MonitorError, ADMIN_DB,
};
use mongowatch_types::Credentials;

use crate::budget::{release, Deadline};

/// Administrative command returning the replica-set configuration.
pub const CONFIG_COMMAND: &str = "replSetGetConfig";

/// Member addresses returned by one discovery call.
///
/// Built fresh every cycle and never cached, since membership may change
/// between polls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplicaTopology {
    pub hosts: Vec<String>,
}

impl ReplicaTopology {
    /// Decode a raw `replSetGetConfig` reply.
    pub fn from_document(reply: Document) -> Result<Self, MonitorError> {
        let reply: ConfigReply = bson::from_document(reply)?;
        Ok(Self {
            hosts: reply.config.members.into_iter().map(|m| m.host).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigReply {
    config: ReplSetConfig,
}

#[derive(Debug, Deserialize)]
struct ReplSetConfig {
    #[serde(default)]
    members: Vec<ConfigMember>,
}

#[derive(Debug, Deserialize)]
struct ConfigMember {
    host: String,
}

/// Connects to seeds and reads their replica-set membership.
pub struct TopologyDiscoverer<C> {
    connector: Arc<C>,
    timeout: Duration,
}

impl<C: DatabaseConnector> TopologyDiscoverer<C> {
    pub fn new(connector: Arc<C>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Connect to `uri`, read its membership and disconnect.
    ///
    /// The connection is released on every path, errors included.
    pub async fn discover(
        &self,
        uri: &str,
        credentials: &Credentials,
        deadline: &Deadline,
    ) -> Result<ReplicaTopology, MonitorError> {
        let budget = deadline.child(self.timeout);
        let handle = self.connect(uri, credentials, &budget).await?;
        let topology = self.discover_with(&handle, &budget).await;
        release(handle, &budget, self.timeout).await;
        topology
    }

    /// Open a discovery-mode connection to a seed.
    pub async fn connect(
        &self,
        uri: &str,
        credentials: &Credentials,
        deadline: &Deadline,
    ) -> Result<C::Handle, MonitorError> {
        let budget = deadline.child(self.timeout);
        let bound = budget.remaining_or(self.timeout);
        budget
            .run(
                self.connector
                    .connect(uri, ConnectMode::Discover, credentials, bound),
            )
            .await
    }

    /// Read membership over an already-open seed connection.
    pub async fn discover_with(
        &self,
        handle: &C::Handle,
        deadline: &Deadline,
    ) -> Result<ReplicaTopology, MonitorError> {
        let budget = deadline.child(self.timeout);
        let reply = budget
            .run(handle.run_command(ADMIN_DB, doc! { CONFIG_COMMAND: 1 }))
            .await?;

        let topology = ReplicaTopology::from_document(reply)?;
        debug!(hosts = ?topology.hosts, "Discovered topology");
        Ok(topology)
    }
}

impl<C> std::fmt::Debug for TopologyDiscoverer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyDiscoverer")
            .field("timeout", &self.timeout)
            .finish()
    }
}
