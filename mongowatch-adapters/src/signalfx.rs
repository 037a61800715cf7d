//! SignalFx adapter using the HTTP ingest API.
//!
//! Batches are posted to `<ingest>/v2/datapoint` as JSON, authenticated with
//! an organization access token in the `X-SF-Token` header.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use mongowatch_adapters::signalfx::SignalFxSink;
//! use mongowatch_adapters::MetricsSink;
//! use mongowatch_types::MetricSample;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = SignalFxSink::builder()
//!         .auth_token("my-token")
//!         .ingest_url("https://ingest.us1.signalfx.com")
//!         .build()?;
//!
//!     sink.submit(&[MetricSample::liveness("db-1:27017")], Duration::from_secs(10))
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use mongowatch_types::{MetricKind, MetricSample};

use crate::sink::MetricsSink;
use crate::MonitorError;

/// Default ingest endpoint.
pub const DEFAULT_INGEST_URL: &str = "https://ingest.signalfx.com";

const TOKEN_HEADER: &str = "X-SF-Token";

/// Metrics sink posting datapoints to SignalFx.
#[derive(Debug, Clone)]
pub struct SignalFxSink {
    client: Client,
    endpoint: String,
    auth_token: String,
}

impl SignalFxSink {
    /// Create a new builder for configuring the sink.
    pub fn builder() -> SignalFxSinkBuilder {
        SignalFxSinkBuilder::default()
    }

    fn datapoint_url(&self) -> String {
        format!("{}/v2/datapoint", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl MetricsSink for SignalFxSink {
    async fn submit(
        &self,
        samples: &[MetricSample],
        timeout: Duration,
    ) -> Result<(), MonitorError> {
        if samples.is_empty() {
            return Ok(());
        }

        let body = DatapointBatch::from_samples(samples);

        let response = self
            .client
            .post(self.datapoint_url())
            .header(TOKEN_HEADER, &self.auth_token)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MonitorError::Emission(format!(
                "ingest rejected the auth token ({})",
                status
            )));
        }

        if !status.is_success() {
            return Err(MonitorError::Emission(format!(
                "ingest returned status {}",
                status
            )));
        }

        Ok(())
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> MonitorError {
    if err.is_timeout() {
        MonitorError::Timeout(timeout)
    } else {
        MonitorError::Emission(err.to_string())
    }
}

/// Builder for SignalFxSink.
#[derive(Debug, Default)]
pub struct SignalFxSinkBuilder {
    ingest_url: Option<String>,
    auth_token: Option<String>,
    connect_timeout: Option<Duration>,
}

impl SignalFxSinkBuilder {
    /// Set the ingest endpoint (default: "https://ingest.signalfx.com").
    pub fn ingest_url(mut self, url: impl Into<String>) -> Self {
        self.ingest_url = Some(url.into());
        self
    }

    /// Set the organization access token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the TCP connect timeout (default: 10 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the sink.
    pub fn build(self) -> Result<SignalFxSink, MonitorError> {
        let auth_token = self
            .auth_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MonitorError::Config("SignalFx auth token is required".to_string()))?;

        let client = Client::builder()
            .connect_timeout(self.connect_timeout.unwrap_or(Duration::from_secs(10)))
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(SignalFxSink {
            client,
            endpoint: self
                .ingest_url
                .unwrap_or_else(|| DEFAULT_INGEST_URL.to_string()),
            auth_token,
        })
    }
}

/// Request body accepted by `/v2/datapoint`.
#[derive(Debug, Default, Serialize)]
struct DatapointBatch<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    gauge: Vec<Datapoint<'a>>,
}

#[derive(Debug, Serialize)]
struct Datapoint<'a> {
    metric: &'a str,
    dimensions: &'a BTreeMap<String, String>,
    value: f64,
    timestamp: u64,
}

impl<'a> DatapointBatch<'a> {
    fn from_samples(samples: &'a [MetricSample]) -> Self {
        let mut batch = DatapointBatch::default();
        for sample in samples {
            let point = Datapoint {
                metric: &sample.metric,
                dimensions: &sample.dimensions,
                value: sample.value,
                timestamp: sample.timestamp_ms,
            };
            match sample.kind {
                MetricKind::Gauge => batch.gauge.push(point),
            }
        }
        batch
    }
}
