//! Error types shared by the adapters and the monitoring engine.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while polling a cluster or emitting metrics.
///
/// Every variant except `Config` is scoped to a single task (one seed, one
/// host, one batch) and is logged where it happens rather than propagated.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Connection to a seed or host could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A command failed or its reply could not be decoded.
    #[error("Command failed: {0}")]
    Command(String),

    /// An operation exceeded its time bound.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Replica-set status did not name exactly one primary.
    #[error("no primary detected ({primaries} members report PRIMARY)")]
    NoPrimary { primaries: usize },

    /// The metrics backend rejected a batch or was unreachable.
    #[error("Metric emission failed: {0}")]
    Emission(String),

    /// The process is shutting down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl MonitorError {
    /// Whether this error came from an exceeded time bound.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MonitorError::Timeout(_))
    }

    /// Whether this error is the fail-fast result of shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MonitorError::Cancelled)
    }
}

impl From<bson::de::Error> for MonitorError {
    fn from(err: bson::de::Error) -> Self {
        MonitorError::Command(format!("undecodable reply: {}", err))
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for MonitorError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let unreachable = matches!(
            *err.kind,
            ErrorKind::ServerSelection { .. }
                | ErrorKind::Io(_)
                | ErrorKind::DnsResolve { .. }
                | ErrorKind::Authentication { .. }
        );
        if unreachable {
            MonitorError::Connection(err.to_string())
        } else {
            MonitorError::Command(err.to_string())
        }
    }
}
