//! Probe engine and aggregator.
//!
//! Every endpoint is probed concurrently; the resulting batch keeps endpoint
//! configuration order regardless of which probe finishes first.

mod http;

pub use http::*;

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;

use crate::store::{Endpoint, ProbeBatch};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Runs one probe per configured endpoint and collects them into a batch.
#[derive(Debug, Clone)]
pub struct Aggregator {
    prober: HttpProber,
    endpoints: Vec<Endpoint>,
}

impl Aggregator {
    pub fn new(prober: HttpProber, endpoints: Vec<Endpoint>) -> Self {
        Self { prober, endpoints }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Probe all endpoints concurrently and wait for every one of them.
    pub async fn run_cycle(&self) -> ProbeBatch {
        let probes = self.endpoints.iter().map(|endpoint| self.prober.probe(endpoint));
        let results = join_all(probes).await;

        let batch = ProbeBatch::new(Utc::now(), results);
        tracing::info!(
            "Probe cycle finished: {}/{} healthy",
            batch.healthy_count(),
            batch.results.len()
        );
        batch
    }
}
