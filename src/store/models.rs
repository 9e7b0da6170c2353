//! Probe data model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Outcome classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Response received with a 2xx status code.
    Healthy,
    /// Response received with any other status code.
    Unhealthy,
    /// No response at all (timeout, DNS, connect, TLS).
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Healthy => "healthy",
            ProbeStatus::Unhealthy => "unhealthy",
            ProbeStatus::Error => "error",
        }
    }
}

/// The result of probing one endpoint once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub endpoint_name: String,
    pub url: String,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        self.status == ProbeStatus::Healthy
    }
}

/// All probe results of one aggregation cycle, in endpoint configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeBatch {
    pub observed_at: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
}

impl ProbeBatch {
    pub fn new(observed_at: DateTime<Utc>, results: Vec<ProbeResult>) -> Self {
        Self { observed_at, results }
    }

    /// Results whose status is not healthy. Empty means nothing to alert on.
    pub fn failing(&self) -> Vec<&ProbeResult> {
        self.results.iter().filter(|r| !r.is_healthy()).collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_healthy()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.is_healthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: ProbeStatus) -> ProbeResult {
        ProbeResult {
            endpoint_name: name.to_string(),
            url: format!("http://{}.local/minio/health/live", name),
            status,
            status_code: None,
            response_time_ms: 5,
            error_message: None,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_failing_subset_keeps_order() {
        let batch = ProbeBatch::new(
            Utc::now(),
            vec![
                result("a", ProbeStatus::Error),
                result("b", ProbeStatus::Healthy),
                result("c", ProbeStatus::Unhealthy),
            ],
        );

        let failing: Vec<_> = batch.failing().into_iter().map(|r| r.endpoint_name.as_str()).collect();
        assert_eq!(failing, vec!["a", "c"]);
        assert_eq!(batch.healthy_count(), 1);
        assert!(batch.has_failures());
    }

    #[test]
    fn test_result_json_shape() {
        let mut r = result("a", ProbeStatus::Unhealthy);
        r.status_code = Some(503);

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["endpointName"], "a");
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["statusCode"], 503);
        assert!(json.get("errorMessage").is_none());
    }
}
