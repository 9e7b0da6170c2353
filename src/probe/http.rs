//! HTTP liveness probe.

use std::error::Error as _;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::ProbeError;
use crate::store::{Endpoint, ProbeResult, ProbeStatus};

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues a single HEAD request per probe with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one endpoint. Never fails: every outcome becomes a `ProbeResult`.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        let start = Instant::now();
        let outcome = self.head(&endpoint.url).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (status, status_code, error_message) = match outcome {
            Ok(code) if (200..300).contains(&code) => (ProbeStatus::Healthy, Some(code), None),
            Ok(code) => (ProbeStatus::Unhealthy, Some(code), None),
            Err(e) => {
                tracing::debug!("Probe error for {}: {}", endpoint.name, e);
                (ProbeStatus::Error, None, Some(e.to_string()))
            }
        };

        ProbeResult {
            endpoint_name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            status,
            status_code,
            response_time_ms,
            error_message,
            observed_at: Utc::now(),
        }
    }

    async fn head(&self, url: &str) -> Result<u16, ProbeError> {
        let request = self.client.head(url).header(reqwest::header::CACHE_CONTROL, "no-store");

        // Outer bound also covers name resolution.
        match tokio::time::timeout(self.timeout, request.send()).await {
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(ProbeError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(ProbeError::Network(describe_error(&e))),
            Ok(Ok(response)) => Ok(response.status().as_u16()),
        }
    }
}

/// Flatten a reqwest error and its sources into one readable line.
fn describe_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
