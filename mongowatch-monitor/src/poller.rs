//! Per-cluster fan-out over seeds, members and lag submissions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error};

use mongowatch_adapters::{DatabaseConnector, MonitorError};
use mongowatch_types::{ClusterGroup, Credentials, MetricSample};

use crate::budget::{release, Deadline};
use crate::config::Timeouts;
use crate::emitter::MetricsEmitter;
use crate::lag::LagCalculator;
use crate::pinger::HostPinger;
use crate::topology::TopologyDiscoverer;

/// What one seed produced during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub seed: String,
    /// Members returned by discovery.
    pub hosts: usize,
    /// Members that answered their liveness probe.
    pub hosts_up: usize,
    /// Liveness samples accepted by the backend.
    pub up_delivered: usize,
    /// Lag samples computed from replica-set status.
    pub lag_samples: usize,
    /// Lag samples accepted by the backend.
    pub lag_delivered: usize,
    /// First error seen while processing the seed.
    pub error: Option<String>,
}

impl SeedReport {
    fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Self::default()
        }
    }

    fn record_error(&mut self, err: &MonitorError) {
        if self.error.is_none() {
            self.error = Some(err.to_string());
        }
    }

    fn failed(mut self, err: &MonitorError) -> Self {
        self.record_error(err);
        self
    }

    /// Whether the seed finished without any error.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-seed reports for one cluster group, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterReport {
    pub seeds: Vec<SeedReport>,
}

impl ClusterReport {
    pub fn hosts_up(&self) -> usize {
        self.seeds.iter().map(|s| s.hosts_up).sum()
    }

    pub fn lag_delivered(&self) -> usize {
        self.seeds.iter().map(|s| s.lag_delivered).sum()
    }

    pub fn failed_seeds(&self) -> usize {
        self.seeds.iter().filter(|s| !s.is_clean()).count()
    }
}

enum Outcome {
    Down,
    Up { delivered: bool },
    Lag { delivered: bool },
}

/// Polls every seed of a cluster group concurrently.
///
/// Seeds never affect each other: a seed that cannot be reached or whose
/// discovery fails only empties its own report.
pub struct ClusterPoller<C> {
    discoverer: TopologyDiscoverer<C>,
    lag: LagCalculator,
    pinger: Arc<HostPinger<C>>,
    emitter: Arc<MetricsEmitter>,
    seed_timeout: Duration,
    release_timeout: Duration,
}

impl<C: DatabaseConnector> ClusterPoller<C> {
    pub fn new(connector: Arc<C>, emitter: Arc<MetricsEmitter>, timeouts: &Timeouts) -> Self {
        Self {
            discoverer: TopologyDiscoverer::new(Arc::clone(&connector), timeouts.discovery),
            lag: LagCalculator::new(timeouts.status),
            pinger: Arc::new(HostPinger::new(connector, Arc::clone(&emitter), timeouts)),
            emitter,
            seed_timeout: timeouts.seed,
            release_timeout: timeouts.discovery,
        }
    }

    /// Poll every seed of `group` and wait for all of their work to finish.
    pub async fn poll(self: Arc<Self>, group: &ClusterGroup, deadline: &Deadline) -> ClusterReport {
        let credentials = Arc::new(group.credentials.clone());
        let mut tasks = JoinSet::new();

        for (index, seed) in group.seeds.iter().enumerate() {
            let poller = Arc::clone(&self);
            let seed = seed.clone();
            let credentials = Arc::clone(&credentials);
            let deadline = deadline.clone();
            tasks.spawn(async move {
                let report = poller.poll_seed(seed, credentials, deadline).await;
                (index, report)
            });
        }

        let mut reports: Vec<Option<SeedReport>> = vec![None; group.seeds.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => error!(error = %e, "Seed task did not complete"),
            }
        }

        let seeds = reports
            .into_iter()
            .zip(&group.seeds)
            .map(|(report, seed)| {
                report.unwrap_or_else(|| {
                    SeedReport::new(seed.as_str())
                        .failed(&MonitorError::Command("seed task aborted".to_string()))
                })
            })
            .collect();

        ClusterReport { seeds }
    }

    async fn poll_seed(
        &self,
        seed: String,
        credentials: Arc<Credentials>,
        deadline: Deadline,
    ) -> SeedReport {
        let budget = deadline.child(self.seed_timeout);
        let mut report = SeedReport::new(seed.as_str());

        // One connection serves both the configuration and status queries.
        let handle = match self.discoverer.connect(&seed, &credentials, &budget).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(seed = %seed, error = %e, "Could not connect to cluster");
                return report.failed(&e);
            }
        };

        let topology = self.discoverer.discover_with(&handle, &budget).await;
        let lag = match &topology {
            Ok(_) => Some(self.lag.compute_lag(&handle, &budget).await),
            Err(_) => None,
        };
        release(handle, &budget, self.release_timeout).await;

        let topology = match topology {
            Ok(topology) => topology,
            Err(e) => {
                error!(seed = %seed, error = %e, "Could not discover topology");
                return report.failed(&e);
            }
        };
        report.hosts = topology.len();

        let lag_samples = match lag {
            Some(Ok(samples)) => samples,
            Some(Err(e)) => {
                error!(seed = %seed, error = %e, "Could not compute replication lag");
                report.record_error(&e);
                Vec::new()
            }
            None => Vec::new(),
        };
        report.lag_samples = lag_samples.len();

        let mut tasks = JoinSet::new();

        for host in topology.hosts {
            let pinger = Arc::clone(&self.pinger);
            let credentials = Arc::clone(&credentials);
            let budget = budget.clone();
            tasks.spawn(async move {
                match pinger.check_liveness(&host, &credentials, &budget).await {
                    Ok(delivered) => Outcome::Up { delivered },
                    Err(_) => Outcome::Down,
                }
            });
        }

        for sample in lag_samples {
            let emitter = Arc::clone(&self.emitter);
            let budget = budget.clone();
            tasks.spawn(async move {
                let result = emitter.submit(vec![MetricSample::lag(&sample)], &budget).await;
                if let Err(ref e) = result {
                    error!(host = %sample.host, error = %e, "Could not send lag metric");
                }
                Outcome::Lag {
                    delivered: result.is_ok(),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Outcome::Up { delivered }) => {
                    report.hosts_up += 1;
                    report.up_delivered += usize::from(delivered);
                }
                Ok(Outcome::Lag { delivered }) => report.lag_delivered += usize::from(delivered),
                Ok(Outcome::Down) => {}
                Err(e) => error!(seed = %seed, error = %e, "Host task did not complete"),
            }
        }

        debug!(
            seed = %seed,
            hosts = report.hosts,
            up = report.hosts_up,
            lag = report.lag_delivered,
            "Seed polled"
        );
        report
    }
}

impl<C> std::fmt::Debug for ClusterPoller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterPoller")
            .field("seed_timeout", &self.seed_timeout)
            .finish()
    }
}
