//! Slack incoming-webhook payload.

use serde_json::{json, Value};

use super::{describe_detail, format_time, status_label, ALERT_TITLE};
use crate::store::ProbeResult;

/// Build a Block Kit message listing every failing endpoint.
pub fn build_payload(failing: &[&ProbeResult]) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": ALERT_TITLE },
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*{}* endpoint(s) reported a problem.", failing.len()),
            },
        }),
        json!({ "type": "divider" }),
    ];

    blocks.extend(failing.iter().map(|r| {
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Server:*\n{}", r.endpoint_name) },
                { "type": "mrkdwn", "text": format!("*Status:*\n{}", status_label(r.status)) },
                { "type": "mrkdwn", "text": format!("*URL:*\n{}", r.url) },
                { "type": "mrkdwn", "text": format!("*Error:*\n{}", describe_detail(r)) },
                { "type": "mrkdwn", "text": format!("*Response time:*\n{}ms", r.response_time_ms) },
                { "type": "mrkdwn", "text": format!("*Observed:*\n{}", format_time(&r.observed_at)) },
            ],
        })
    }));

    json!({
        "text": ALERT_TITLE,
        "blocks": blocks,
    })
}
