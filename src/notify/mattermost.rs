//! Mattermost incoming-webhook payload.

use serde_json::{json, Value};

use super::{format_time, status_label, ALERT_TITLE};
use crate::store::ProbeResult;

const USERNAME: &str = "MinIO Health Monitor";
const ICON_URL: &str = "https://min.io/resources/img/logo/MINIO_wordmark.png";

/// Render the failing endpoints as a markdown document.
pub fn render_markdown(failing: &[&ProbeResult]) -> String {
    let mut message = format!("## {}\n\n", ALERT_TITLE);
    message.push_str(&format!(
        "**{}** endpoint(s) reported a problem.\n\n---\n\n",
        failing.len()
    ));

    for r in failing {
        message.push_str(&format!("### {}\n", r.endpoint_name));
        message.push_str(&format!("- **Status**: {}\n", status_label(r.status)));
        message.push_str(&format!("- **URL**: `{}`\n", r.url));
        if let Some(code) = r.status_code {
            message.push_str(&format!("- **Status code**: {}\n", code));
        }
        message.push_str(&format!("- **Response time**: {}ms\n", r.response_time_ms));
        if let Some(err) = &r.error_message {
            message.push_str(&format!("- **Error**: `{}`\n", err));
        }
        message.push_str(&format!("- **Time**: {}\n\n", format_time(&r.observed_at)));
    }

    message
}

pub fn build_payload(failing: &[&ProbeResult], channel: Option<&str>) -> Value {
    let mut payload = json!({
        "text": render_markdown(failing),
        "username": USERNAME,
        "icon_url": ICON_URL,
    });
    if let Some(channel) = channel {
        payload["channel"] = Value::String(channel.to_string());
    }
    payload
}
