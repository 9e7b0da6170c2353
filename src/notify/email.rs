//! Email alert composition.

use serde::Serialize;

use super::{describe_detail, format_time, status_label};
use crate::store::ProbeResult;

/// A composed alert email, posted as JSON to a mail relay.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn compose(to: &str, failing: &[&ProbeResult]) -> EmailMessage {
    let subject = format!("MinIO health alert: {} endpoint(s) failing", failing.len());

    let mut body = format!("{} endpoint(s) reported a problem.\n\n", failing.len());
    for r in failing {
        body.push_str(&format!("{} [{}]\n", r.endpoint_name, status_label(r.status)));
        body.push_str(&format!("  URL: {}\n", r.url));
        body.push_str(&format!("  Detail: {}\n", describe_detail(r)));
        body.push_str(&format!("  Response time: {}ms\n", r.response_time_ms));
        body.push_str(&format!("  Observed: {}\n\n", format_time(&r.observed_at)));
    }

    EmailMessage {
        to: to.to_string(),
        subject,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProbeStatus;
    use chrono::Utc;

    #[test]
    fn test_subject_counts_failures() {
        let r = ProbeResult {
            endpoint_name: "MinIO 4".to_string(),
            url: "http://minio4.local:9000/minio/health/live".to_string(),
            status: ProbeStatus::Error,
            status_code: None,
            response_time_ms: 7,
            error_message: Some("connection refused".to_string()),
            observed_at: Utc::now(),
        };

        let mail = compose("ops@example.com", &[&r, &r]);
        assert_eq!(mail.to, "ops@example.com");
        assert_eq!(mail.subject, "MinIO health alert: 2 endpoint(s) failing");
        assert!(mail.body.contains("Detail: connection refused"));
        assert!(mail.body.contains("MinIO 4 [ERROR]\n  URL: http://minio4.local:9000/minio/health/live\n"));
        assert!(mail.body.contains("  Response time: 7ms\n"));
        assert_eq!(mail.body.matches("MinIO 4 [").count(), 2);
    }
}
