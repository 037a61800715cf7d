//! MongoDB implementation of the database capability traits.
//!
//! Seeds are opened as ordinary replica-set connections so the driver can
//! follow the topology; member liveness checks use a direct connection to
//! the exact `host:port` being probed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use mongowatch_adapters::mongo::MongoConnector;
//! use mongowatch_adapters::{ConnectMode, DatabaseConnector, DatabaseHandle};
//! use mongowatch_types::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = MongoConnector::new();
//!     let handle = connector
//!         .connect(
//!             "db-1:27017",
//!             ConnectMode::Direct,
//!             &Credentials::new("monitor", "secret"),
//!             Duration::from_secs(10),
//!         )
//!         .await?;
//!
//!     handle.ping(Duration::from_secs(10)).await?;
//!     handle.disconnect().await;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::{ClientOptions, Credential, ReadPreference, SelectionCriteria};
use mongodb::Client;
use tracing::debug;

use mongowatch_types::Credentials;

use crate::database::{ConnectMode, DatabaseConnector, DatabaseHandle, ADMIN_DB};
use crate::MonitorError;

/// Opens MongoDB client connections.
#[derive(Debug, Clone, Default)]
pub struct MongoConnector {
    app_name: Option<String>,
}

impl MongoConnector {
    /// Create a connector with driver defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this name to the server in the connection handshake.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    fn apply_options(
        &self,
        options: &mut ClientOptions,
        mode: ConnectMode,
        credentials: &Credentials,
        timeout: Duration,
    ) {
        if !credentials.is_anonymous() {
            let mut credential = Credential::default();
            credential.username = Some(credentials.username.clone());
            credential.password = Some(credentials.password.clone());
            credential.source = Some(ADMIN_DB.to_string());
            options.credential = Some(credential);
        }

        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        if mode == ConnectMode::Direct {
            options.direct_connection = Some(true);
        }

        if let Some(ref app_name) = self.app_name {
            options.app_name = Some(app_name.clone());
        }
    }
}

#[async_trait]
impl DatabaseConnector for MongoConnector {
    type Handle = MongoHandle;

    async fn connect(
        &self,
        address: &str,
        mode: ConnectMode,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<MongoHandle, MonitorError> {
        let uri = match mode {
            ConnectMode::Discover => address.to_string(),
            ConnectMode::Direct => direct_uri(address),
        };

        let mut options = ClientOptions::parse(&uri)
            .await
            .map_err(|e| MonitorError::Connection(format!("invalid address {}: {}", address, e)))?;
        self.apply_options(&mut options, mode, credentials, timeout);

        let client = Client::with_options(options)?;
        debug!(address = %address, ?mode, "Opened MongoDB client");

        Ok(MongoHandle { client })
    }
}

/// A MongoDB client owned by a single polling task.
#[derive(Debug)]
pub struct MongoHandle {
    client: Client,
}

#[async_trait]
impl DatabaseHandle for MongoHandle {
    async fn run_command(
        &self,
        namespace: &str,
        command: Document,
    ) -> Result<Document, MonitorError> {
        let reply = self
            .client
            .database(namespace)
            .run_command(command)
            .selection_criteria(admin_read_criteria())
            .await?;
        Ok(reply)
    }

    async fn ping(&self, timeout: Duration) -> Result<(), MonitorError> {
        let admin = self.client.database(ADMIN_DB);
        let probe = async {
            admin
                .run_command(doc! { "ping": 1 })
                .selection_criteria(admin_read_criteria())
                .await
        };

        match tokio::time::timeout(timeout, probe).await {
            Ok(reply) => reply.map(|_| ()).map_err(MonitorError::from),
            Err(_) => Err(MonitorError::Timeout(timeout)),
        }
    }

    async fn disconnect(self) {
        self.client.shutdown().await;
    }
}

/// Administrative reads prefer the primary but fall back to any member, so
/// topology and status stay readable while the set has no primary.
fn admin_read_criteria() -> SelectionCriteria {
    SelectionCriteria::ReadPreference(ReadPreference::PrimaryPreferred { options: None })
}

// Connection string for a single member, bypassing discovery.
fn direct_uri(host: &str) -> String {
    if host.starts_with("mongodb://") {
        host.to_string()
    } else {
        format!("mongodb://{}", host)
    }
}
