//! # mongowatch
//!
//! Replica-set lag and liveness monitor for MongoDB clusters.
//!
//! The binary reads a YAML file listing cluster groups, then polls them on a
//! fixed interval and forwards two gauges per member to SignalFx:
//!
//! ```text
//! ┌────────────┐   ┌───────────────────────────┐   ┌──────────────┐
//! │ config.yaml│──▶│ mongowatch-monitor        │──▶│ SignalFx     │
//! │ (clusters) │   │ Scheduler → ClusterPoller │   │ mongodb.up   │
//! └────────────┘   │   → TopologyDiscoverer    │   │ mongodb.lag. │
//!                  │   → LagCalculator         │   │   seconds    │
//!                  │   → HostPinger            │   └──────────────┘
//!                  └─────────────┬─────────────┘
//!                                ▼
//!                        MongoDB replica sets
//! ```
//!
//! This library crate only holds configuration loading; the polling engine
//! lives in `mongowatch-monitor` and the collaborators in
//! `mongowatch-adapters`.

pub mod config;

pub use config::{AppConfig, ClusterConfig, SignalFxConfig};
