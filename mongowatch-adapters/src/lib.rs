//! # mongowatch-adapters
//!
//! The external collaborators of the monitoring engine.
//!
//! The engine depends only on the capability traits defined here:
//!
//! - [`DatabaseConnector`] / [`DatabaseHandle`]: connect, run a command,
//!   ping, disconnect
//! - [`MetricsSink`]: submit a batch of datapoints
//!
//! ## Implementations
//!
//! - **MongoDB** (`mongodb` feature) - [`mongo::MongoConnector`] built on the
//!   official driver
//! - **SignalFx** (`signalfx` feature) - [`signalfx::SignalFxSink`] posting to
//!   the HTTP ingest API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "signalfx")]
//! # fn main() -> Result<(), mongowatch_adapters::MonitorError> {
//! use mongowatch_adapters::signalfx::SignalFxSink;
//!
//! let sink = SignalFxSink::builder()
//!     .auth_token("my-token")
//!     .build()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "signalfx"))]
//! # fn main() {}
//! ```

pub mod database;
pub mod error;
pub mod sink;

#[cfg(feature = "mongodb")]
pub mod mongo;

#[cfg(feature = "signalfx")]
pub mod signalfx;

pub use database::{ConnectMode, DatabaseConnector, DatabaseHandle, ADMIN_DB};
pub use error::MonitorError;
pub use sink::MetricsSink;

// Re-export types for convenience
pub use bson::{doc, Document};
pub use mongowatch_types::{Credentials, LagSample, MetricSample};
