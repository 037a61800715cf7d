//! The interval-driven polling loop.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mongowatch_adapters::{DatabaseConnector, MetricsSink, MonitorError};
use mongowatch_types::ClusterGroup;

use crate::budget::Deadline;
use crate::config::{Timeouts, DEFAULT_INTERVAL};
use crate::emitter::MetricsEmitter;
use crate::poller::ClusterPoller;

/// Counters describing cycle activity. Observational only.
#[derive(Debug, Default)]
pub struct CycleStats {
    started: AtomicU64,
    finished: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl CycleStats {
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Largest number of cycles that were ever running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    fn enter(stats: &Arc<Self>) -> CycleGuard {
        let cycle = stats.started.fetch_add(1, Ordering::Relaxed) + 1;
        let now = stats.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        stats.peak_in_flight.fetch_max(now, Ordering::Relaxed);
        CycleGuard {
            cycle,
            stats: Arc::clone(stats),
        }
    }
}

/// Marks a cycle as in flight until dropped.
struct CycleGuard {
    cycle: u64,
    stats: Arc<CycleStats>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.stats.finished.fetch_add(1, Ordering::Relaxed);
    }
}

/// Launches a polling cycle over every cluster group on startup and then
/// once per interval.
///
/// A tick never waits for the previous cycle. When a cycle outlasts the
/// interval the next one starts anyway and both run concurrently, which can
/// put two connections on the same member at once.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Scheduler::builder(MongoConnector::new())
///     .sink(Arc::new(sink))
///     .cluster(ClusterGroup::new(vec![uri], "monitor", "secret"))
///     .interval(Duration::from_secs(60))
///     .build()?;
///
/// let reason = scheduler.start(cancel).await;
/// ```
pub struct Scheduler<C> {
    poller: Arc<ClusterPoller<C>>,
    clusters: Arc<Vec<ClusterGroup>>,
    interval: Duration,
    stats: Arc<CycleStats>,
}

impl<C: DatabaseConnector> Scheduler<C> {
    /// Create a builder around the database connector.
    pub fn builder(connector: C) -> SchedulerBuilder<C> {
        SchedulerBuilder::new(connector)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> Arc<CycleStats> {
        Arc::clone(&self.stats)
    }

    /// Run until `cancel` fires, then wait for in-flight cycles and return
    /// [`MonitorError::Cancelled`].
    pub async fn start(&self, cancel: CancellationToken) -> MonitorError {
        info!("Starting MongoDB monitoring every {:?}", self.interval);
        info!(clusters = self.clusters.len(), "Monitoring cluster groups");
        if self.clusters.is_empty() {
            warn!("No cluster groups configured, cycles will be empty");
        }

        let root = Deadline::unbounded(cancel.clone());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let guard = CycleStats::enter(&self.stats);
                    cycles.spawn(run_cycle(
                        Arc::clone(&self.poller),
                        Arc::clone(&self.clusters),
                        root.clone(),
                        guard,
                    ));
                }
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Poll cycle did not complete");
                    }
                }
            }
        }

        info!(in_flight = cycles.len(), "Stopping monitoring");
        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Poll cycle did not complete");
            }
        }

        MonitorError::Cancelled
    }
}

async fn run_cycle<C: DatabaseConnector>(
    poller: Arc<ClusterPoller<C>>,
    clusters: Arc<Vec<ClusterGroup>>,
    deadline: Deadline,
    guard: CycleGuard,
) {
    let cycle = guard.cycle;
    let started = Instant::now();
    debug!(cycle, "Poll cycle started");

    let mut tasks = JoinSet::new();
    for index in 0..clusters.len() {
        let poller = Arc::clone(&poller);
        let clusters = Arc::clone(&clusters);
        let deadline = deadline.clone();
        tasks.spawn(async move { poller.poll(&clusters[index], &deadline).await });
    }

    let (mut seeds, mut failed, mut hosts_up, mut lag) = (0, 0, 0, 0);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => {
                seeds += report.seeds.len();
                failed += report.failed_seeds();
                hosts_up += report.hosts_up();
                lag += report.lag_delivered();
            }
            Err(e) => error!(cycle, error = %e, "Cluster task did not complete"),
        }
    }

    info!(
        cycle,
        seeds,
        failed,
        hosts_up,
        lag,
        elapsed = ?started.elapsed(),
        "Poll cycle finished"
    );
    drop(guard);
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("clusters", &self.clusters)
            .field("interval", &self.interval)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Builder for configuring a [`Scheduler`].
pub struct SchedulerBuilder<C> {
    connector: C,
    sink: Option<Arc<dyn MetricsSink>>,
    clusters: Vec<ClusterGroup>,
    interval: Option<Duration>,
    timeouts: Timeouts,
}

impl<C: DatabaseConnector> SchedulerBuilder<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            sink: None,
            clusters: Vec::new(),
            interval: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Set the metrics backend. Required.
    pub fn sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Add one cluster group.
    pub fn cluster(mut self, cluster: ClusterGroup) -> Self {
        self.clusters.push(cluster);
        self
    }

    /// Add several cluster groups.
    pub fn clusters(mut self, clusters: impl IntoIterator<Item = ClusterGroup>) -> Self {
        self.clusters.extend(clusters);
        self
    }

    /// Set the poll interval.
    ///
    /// Defaults to 60 seconds if not specified or zero.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the scheduler.
    pub fn build(self) -> Result<Scheduler<C>, MonitorError> {
        let sink = self
            .sink
            .ok_or_else(|| MonitorError::Config("a metrics sink is required".to_string()))?;
        self.timeouts.validate()?;

        let interval = match self.interval {
            Some(interval) if !interval.is_zero() => interval,
            _ => DEFAULT_INTERVAL,
        };

        let emitter = Arc::new(MetricsEmitter::new(sink, self.timeouts.emission));
        let poller = ClusterPoller::new(Arc::new(self.connector), emitter, &self.timeouts);

        Ok(Scheduler {
            poller: Arc::new(poller),
            clusters: Arc::new(self.clusters),
            interval,
            stats: Arc::new(CycleStats::default()),
        })
    }
}
