//! Capability traits for the database collaborator.
//!
//! The monitoring engine only ever connects, runs a command, pings and
//! disconnects. Keeping those four operations behind traits lets the engine
//! be exercised without a live replica set.

use std::time::Duration;

use async_trait::async_trait;
use bson::Document;

use mongowatch_types::Credentials;

use crate::MonitorError;

/// Namespace administrative commands are issued against.
pub const ADMIN_DB: &str = "admin";

/// How a connection should treat the address it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Treat the address as a seed and let the driver discover members.
    Discover,

    /// Talk to exactly the given `host:port`, no member discovery.
    Direct,
}

/// Opens connections to seeds and hosts.
#[async_trait]
pub trait DatabaseConnector: Send + Sync + 'static {
    /// Connection handle produced by this connector.
    type Handle: DatabaseHandle;

    /// Open a connection.
    ///
    /// In [`ConnectMode::Discover`] `address` is a full connection URI; in
    /// [`ConnectMode::Direct`] it is a bare `host:port` member address.
    async fn connect(
        &self,
        address: &str,
        mode: ConnectMode,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self::Handle, MonitorError>;
}

/// An open connection owned exclusively by one task.
#[async_trait]
pub trait DatabaseHandle: Send + Sync + 'static {
    /// Run a command against `namespace` and return the raw reply.
    ///
    /// Must not require a reachable primary: the engine reads topology and
    /// status from sets that are mid-election.
    async fn run_command(&self, namespace: &str, command: Document)
        -> Result<Document, MonitorError>;

    /// Liveness probe bounded by `timeout`.
    async fn ping(&self, timeout: Duration) -> Result<(), MonitorError>;

    /// Release the connection. Safe to call after any earlier failure.
    async fn disconnect(self);
}
