//! Deadline budgets threaded through the polling call tree.
//!
//! Every network call runs under a [`Deadline`]. A child deadline is never
//! later than its parent, and every deadline observes the process-wide
//! cancellation token so in-flight work fails fast on shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mongowatch_adapters::{DatabaseHandle, MonitorError};

/// Remaining time budget plus the shutdown signal.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    /// Effective length of the budget, after clipping to the parent.
    bound: Option<Duration>,
    cancel: CancellationToken,
}

impl Deadline {
    /// A budget with no expiry that only ends on cancellation.
    pub fn unbounded(cancel: CancellationToken) -> Self {
        Self {
            expires_at: None,
            bound: None,
            cancel,
        }
    }

    /// A budget of at most `bound`, clipped to what remains of `self`.
    pub fn child(&self, bound: Duration) -> Self {
        let now = Instant::now();
        let candidate = now + bound;
        let expires_at = match self.expires_at {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };

        Self {
            expires_at: Some(expires_at),
            bound: Some(expires_at.saturating_duration_since(now)),
            cancel: self.cancel.clone(),
        }
    }

    /// Time left before expiry, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Time left, capped at `cap`. Used to hand a timeout to a collaborator.
    pub fn remaining_or(&self, cap: Duration) -> Duration {
        self.remaining().map_or(cap, |left| left.min(cap))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it completes, the budget expires or shutdown starts.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, MonitorError>
    where
        F: Future<Output = Result<T, MonitorError>>,
    {
        let bounded = async {
            match self.expires_at {
                Some(at) => match tokio::time::timeout_at(at, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(MonitorError::Timeout(self.bound.unwrap_or_default())),
                },
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MonitorError::Cancelled),
            result = bounded => result,
        }
    }
}

/// Disconnect `handle`, waiting at most `bound` clipped to what remains of
/// `deadline`.
///
/// The disconnect is always attempted at least once. If it cannot finish
/// within the budget, or shutdown starts while it is pending, the handle is
/// dropped instead, which closes it without waiting for the server.
pub async fn release<H: DatabaseHandle>(handle: H, deadline: &Deadline, bound: Duration) {
    let bound = deadline.remaining_or(bound);

    tokio::select! {
        biased;
        result = tokio::time::timeout(bound, handle.disconnect()) => {
            if result.is_err() {
                warn!(?bound, "Disconnect did not complete in time, dropping connection");
            }
        }
        _ = deadline.cancel.cancelled() => {
            debug!("Shutting down, dropping connection without disconnect");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, FakeHandle, FakeNode};
    use mongowatch_adapters::{ConnectMode, DatabaseConnector};
    use mongowatch_types::Credentials;

    #[tokio::test(start_paused = true)]
    async fn child_never_outlives_parent() {
        let root = Deadline::unbounded(CancellationToken::new());
        let parent = root.child(Duration::from_secs(5));
        let child = parent.child(Duration::from_secs(30));

        assert_eq!(child.remaining(), Some(Duration::from_secs(5)));
        assert_eq!(parent.child(Duration::from_secs(2)).remaining(), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_shrinks_with_time() {
        let deadline = Deadline::unbounded(CancellationToken::new()).child(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(4)).await;

        let left = deadline.remaining().unwrap();
        assert!(left <= Duration::from_secs(6));
        assert!(left > Duration::from_millis(5_900));
        assert_eq!(deadline.remaining_or(Duration::from_secs(2)), Duration::from_secs(2));
        assert!(!deadline.is_expired());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn unbounded_has_no_remaining() {
        let deadline = Deadline::unbounded(CancellationToken::new());
        assert_eq!(deadline.remaining(), None);
        assert_eq!(deadline.remaining_or(Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out() {
        let deadline = Deadline::unbounded(CancellationToken::new()).child(Duration::from_secs(10));

        let result: Result<(), _> = deadline.run(std::future::pending()).await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, MonitorError::Timeout(d) if d == Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_fails_fast_on_cancel() {
        let cancel = CancellationToken::new();
        let deadline = Deadline::unbounded(cancel.clone()).child(Duration::from_secs(60));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<(), _> = deadline.run(std::future::pending()).await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(deadline.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn clipped_timeout_reports_effective_bound() {
        let parent = Deadline::unbounded(CancellationToken::new()).child(Duration::from_secs(2));
        let child = parent.child(Duration::from_secs(10));

        let err = child.run(std::future::pending::<Result<(), _>>()).await.unwrap_err();

        assert!(matches!(err, MonitorError::Timeout(d) if d == Duration::from_secs(2)));
    }

    async fn open(connector: &FakeConnector) -> FakeHandle {
        connector
            .connect("db-1:27017", ConnectMode::Direct, &Credentials::default(), Duration::from_secs(1))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_bounded_by_parent() {
        let connector = FakeConnector::new()
            .with_node("db-1:27017", FakeNode::up().hanging_disconnect());
        let handle = open(&connector).await;
        let deadline = Deadline::unbounded(CancellationToken::new()).child(Duration::from_secs(2));

        let started = Instant::now();
        release(handle, &deadline, Duration::from_secs(10)).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn release_stops_waiting_on_cancel() {
        let connector = FakeConnector::new()
            .with_node("db-1:27017", FakeNode::up().hanging_disconnect());
        let handle = open(&connector).await;
        let cancel = CancellationToken::new();
        let deadline = Deadline::unbounded(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        release(handle, &deadline, Duration::from_secs(10)).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn release_disconnects_after_cancel() {
        let connector = FakeConnector::new().with_node("db-1:27017", FakeNode::up());
        let handle = open(&connector).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        release(handle, &Deadline::unbounded(cancel), Duration::from_secs(10)).await;

        assert_eq!(connector.disconnects(), 1);
        assert_eq!(connector.graceful_disconnects(), 1);
    }

    #[tokio::test]
    async fn run_passes_through_result() {
        let deadline = Deadline::unbounded(CancellationToken::new()).child(Duration::from_secs(1));
        let value = deadline.run(async { Ok::<_, MonitorError>(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = deadline
            .run(async { Err::<(), _>(MonitorError::Command("boom".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Command(_)));
    }
}
