//! # mongowatch-monitor
//!
//! The concurrent polling engine behind mongowatch.
//!
//! On every tick the [`Scheduler`] launches a cycle over all configured
//! cluster groups. Each cycle fans out into a tree of independent tasks:
//!
//! ```text
//! Scheduler
//!   └─ cluster group ─ ClusterPoller
//!        └─ seed URI ─ TopologyDiscoverer + LagCalculator (one connection)
//!             ├─ member ─ HostPinger ─ MetricsEmitter  (mongodb.up)
//!             └─ lag sample ─ MetricsEmitter           (mongodb.lag.seconds)
//! ```
//!
//! Every network call runs under a [`Deadline`] clipped to its parent's
//! budget and observing the shutdown token. Failures are logged where they
//! happen and never cancel siblings; an affected member or cluster simply
//! produces no sample for the cycle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mongowatch_adapters::{mongo::MongoConnector, signalfx::SignalFxSink};
//! use mongowatch_monitor::{ClusterGroup, Scheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! let sink = SignalFxSink::builder().auth_token("token").build()?;
//!
//! let scheduler = Scheduler::builder(MongoConnector::new())
//!     .sink(Arc::new(sink))
//!     .cluster(ClusterGroup::new(
//!         vec!["mongodb://db-1:27017/?replicaSet=rs0".to_string()],
//!         "monitor",
//!         "secret",
//!     ))
//!     .interval(Duration::from_secs(60))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let reason = scheduler.start(cancel).await;
//! ```

mod budget;
mod config;
mod emitter;
mod lag;
mod pinger;
mod poller;
mod scheduler;
mod topology;

#[cfg(test)]
mod testing;

pub use budget::{release, Deadline};
pub use config::{interval_from_secs, TimeoutSettings, Timeouts, DEFAULT_INTERVAL};
pub use emitter::MetricsEmitter;
pub use lag::{LagCalculator, MemberRole, MemberStatus, ReplicationStatus, STATUS_COMMAND};
pub use pinger::HostPinger;
pub use poller::{ClusterPoller, ClusterReport, SeedReport};
pub use scheduler::{CycleStats, Scheduler, SchedulerBuilder};
pub use topology::{ReplicaTopology, TopologyDiscoverer, CONFIG_COMMAND};

// Re-export types for convenience
pub use mongowatch_adapters::MonitorError;
pub use mongowatch_types::{ClusterGroup, Credentials, LagSample, MetricSample};
