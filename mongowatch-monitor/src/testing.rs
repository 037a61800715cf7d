//! In-memory collaborators for exercising the engine without a replica set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, DateTime, Document};

use mongowatch_adapters::{
    ConnectMode, DatabaseConnector, DatabaseHandle, MetricsSink, MonitorError, ADMIN_DB,
};
use mongowatch_types::{Credentials, MetricSample};

/// Scripted behavior of one address.
#[derive(Debug, Clone)]
pub(crate) struct FakeNode {
    pub reachable: bool,
    pub config: Option<Document>,
    pub status: Option<Document>,
    pub ping_ok: bool,
    pub delay: Duration,
    pub hang: bool,
    pub hang_disconnect: bool,
}

impl FakeNode {
    pub fn up() -> Self {
        Self {
            reachable: true,
            config: None,
            status: None,
            ping_ok: true,
            delay: Duration::ZERO,
            hang: false,
            hang_disconnect: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::up()
        }
    }

    pub fn seed(hosts: &[&str], status: Document) -> Self {
        Self {
            config: Some(config_reply(hosts)),
            status: Some(status),
            ..Self::up()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn hanging_disconnect(mut self) -> Self {
        self.hang_disconnect = true;
        self
    }

    pub fn refusing_ping(mut self) -> Self {
        self.ping_ok = false;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    nodes: Mutex<HashMap<String, FakeNode>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    graceful_disconnects: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(self, address: &str, node: FakeNode) -> Self {
        self.state
            .nodes
            .lock()
            .unwrap()
            .insert(address.to_string(), node);
        self
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Handles released, whether by disconnect or by drop.
    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Handles whose disconnect ran to completion.
    pub fn graceful_disconnects(&self) -> usize {
        self.state.graceful_disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseConnector for FakeConnector {
    type Handle = FakeHandle;

    async fn connect(
        &self,
        address: &str,
        _mode: ConnectMode,
        _credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<FakeHandle, MonitorError> {
        let node = self.state.nodes.lock().unwrap().get(address).cloned();
        match node {
            Some(node) if node.reachable => {
                self.state.connects.fetch_add(1, Ordering::SeqCst);
                Ok(FakeHandle {
                    node,
                    state: Arc::clone(&self.state),
                })
            }
            _ => Err(MonitorError::Connection(format!("no route to {}", address))),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeHandle {
    node: FakeNode,
    state: Arc<FakeState>,
}

impl FakeHandle {
    async fn respond(&self) {
        if self.node.hang {
            std::future::pending::<()>().await;
        }
        if !self.node.delay.is_zero() {
            tokio::time::sleep(self.node.delay).await;
        }
    }
}

#[async_trait]
impl DatabaseHandle for FakeHandle {
    async fn run_command(
        &self,
        namespace: &str,
        command: Document,
    ) -> Result<Document, MonitorError> {
        if namespace != ADMIN_DB {
            return Err(MonitorError::Command(format!("unauthorized on {}", namespace)));
        }
        self.respond().await;

        let reply = if command.contains_key("replSetGetConfig") {
            self.node.config.clone()
        } else if command.contains_key("replSetGetStatus") {
            self.node.status.clone()
        } else {
            None
        };
        reply.ok_or_else(|| MonitorError::Command(format!("no such command: {}", command)))
    }

    async fn ping(&self, timeout: Duration) -> Result<(), MonitorError> {
        if tokio::time::timeout(timeout, self.respond()).await.is_err() {
            return Err(MonitorError::Timeout(timeout));
        }
        if self.node.ping_ok {
            Ok(())
        } else {
            Err(MonitorError::Command("ping refused".to_string()))
        }
    }

    async fn disconnect(self) {
        if self.node.hang_disconnect {
            std::future::pending::<()>().await;
        }
        self.state.graceful_disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that records every sample it accepts.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    samples: Mutex<Vec<MetricSample>>,
    batches: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Sorted hosts that received a sample named `metric`.
    pub fn hosts_for(&self, metric: &str) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .samples()
            .iter()
            .filter(|s| s.metric == metric)
            .filter_map(|s| s.host().map(str::to_string))
            .collect();
        hosts.sort();
        hosts
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn submit(
        &self,
        samples: &[MetricSample],
        _timeout: Duration,
    ) -> Result<(), MonitorError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(MonitorError::Emission("backend unavailable".to_string()));
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.samples.lock().unwrap().extend_from_slice(samples);
        Ok(())
    }
}

/// `replSetGetConfig` reply listing `hosts` as members.
pub(crate) fn config_reply(hosts: &[&str]) -> Document {
    let members: Vec<Document> = hosts
        .iter()
        .enumerate()
        .map(|(id, host)| doc! { "_id": id as i32, "host": *host, "priority": 1 })
        .collect();
    doc! { "config": { "_id": "rs0", "version": 1, "members": members }, "ok": 1 }
}

/// `replSetGetStatus` reply from `(name, stateStr, optimeDate millis)` triples.
pub(crate) fn status_reply(members: &[(&str, &str, i64)]) -> Document {
    let members: Vec<Document> = members
        .iter()
        .map(|(name, state, applied)| {
            doc! {
                "name": *name,
                "stateStr": *state,
                "optimeDate": DateTime::from_millis(*applied),
            }
        })
        .collect();
    doc! { "set": "rs0", "members": members, "ok": 1 }
}
