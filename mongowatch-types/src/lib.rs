//! # mongowatch-types
//!
//! Core types shared by the mongowatch crates. This crate defines the data
//! that flows through one poll cycle: the configured cluster groups, the
//! replication lag measured for each secondary, and the metric datapoints
//! that are forwarded to the metrics backend.
//!
//! ## Features
//!
//! - `serde`: Serialization of all public types via serde
//!
//! ## Example
//!
//! ```rust
//! use mongowatch_types::{ClusterGroup, LagSample, MetricSample, LAG_METRIC};
//!
//! let group = ClusterGroup::new(
//!     vec!["mongodb://db-1:27017".to_string()],
//!     "monitor",
//!     "secret",
//! );
//! assert_eq!(group.seeds.len(), 1);
//!
//! let lag = LagSample::new("db-2:27017", 1_500);
//! let sample = MetricSample::lag(&lag);
//! assert_eq!(sample.metric, LAG_METRIC);
//! assert_eq!(sample.value, 1.5);
//! ```

mod cluster;
mod lag;
mod sample;

pub use cluster::*;
pub use lag::*;
pub use sample::*;
