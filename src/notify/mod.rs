//! Notification dispatcher.
//!
//! Fans a probe batch out to every enabled channel. Delivery is best-effort:
//! a failing channel is logged and never affects the others or the caller.

mod email;
mod mattermost;
mod slack;

pub use email::EmailMessage;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::ChannelSettings;
use crate::store::{ProbeBatch, ProbeResult, ProbeStatus};

pub const ALERT_TITLE: &str = "MinIO health check alert";

/// Timeout for a single webhook delivery.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook answered with status {0}")]
    Status(u16),
}

/// Whether empty-failure batches are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Skip channels when every endpoint is healthy.
    Normal,
    /// Always send, even with nothing failing.
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Slack,
    Mattermost,
    Email,
}

/// What happened to one channel during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Disabled,
    Suppressed,
    Delivered,
    /// Composed but only written to the log (email without a relay).
    Logged,
    Failed(String),
}

impl DeliveryOutcome {
    /// Whether an outbound call was attempted.
    pub fn attempted(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered | DeliveryOutcome::Failed(_))
    }
}

/// Per-channel outcomes of one dispatch, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<(Channel, DeliveryOutcome)>,
}

impl DispatchReport {
    pub fn outcome(&self, channel: Channel) -> Option<&DeliveryOutcome> {
        self.outcomes.iter().find(|(c, _)| *c == channel).map(|(_, o)| o)
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.attempted()).count()
    }
}

/// Enabled flags per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationStatus {
    pub slack: bool,
    pub mattermost: bool,
    pub email: bool,
    pub total: usize,
}

/// Delivers alerts to the configured channels.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    channels: ChannelSettings,
}

impl Dispatcher {
    pub fn new(channels: ChannelSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(DELIVERY_TIMEOUT).build()?;
        Ok(Self { client, channels })
    }

    pub fn status(&self) -> NotificationStatus {
        let slack = self.channels.slack_webhook_url.is_some();
        let mattermost = self.channels.mattermost_webhook_url.is_some();
        let email = self.channels.email_to.is_some();
        NotificationStatus {
            slack,
            mattermost,
            email,
            total: [slack, mattermost, email].iter().filter(|e| **e).count(),
        }
    }

    /// Send the failing subset of `batch` to every enabled channel.
    ///
    /// All deliveries run concurrently and are awaited together. Never fails.
    pub async fn dispatch(&self, batch: &ProbeBatch, mode: DispatchMode) -> DispatchReport {
        let failing = batch.failing();
        let suppressed = failing.is_empty() && mode == DispatchMode::Normal;
        if suppressed {
            tracing::debug!("All endpoints healthy, no notifications sent");
        }

        let (slack, mattermost, email) = tokio::join!(
            self.send_slack(&failing, suppressed),
            self.send_mattermost(&failing, suppressed),
            self.send_email(&failing, suppressed),
        );

        let report = DispatchReport {
            outcomes: vec![
                (Channel::Slack, slack),
                (Channel::Mattermost, mattermost),
                (Channel::Email, email),
            ],
        };
        for (channel, outcome) in &report.outcomes {
            match outcome {
                DeliveryOutcome::Failed(e) => {
                    tracing::error!("Failed to deliver {:?} notification: {}", channel, e)
                }
                DeliveryOutcome::Delivered => {
                    tracing::info!("Delivered {:?} notification ({} failing)", channel, failing.len())
                }
                _ => {}
            }
        }
        report
    }

    async fn send_slack(&self, failing: &[&ProbeResult], suppressed: bool) -> DeliveryOutcome {
        let Some(url) = &self.channels.slack_webhook_url else {
            tracing::debug!("Slack webhook not configured");
            return DeliveryOutcome::Disabled;
        };
        if suppressed {
            return DeliveryOutcome::Suppressed;
        }
        self.deliver(url, &slack::build_payload(failing)).await
    }

    async fn send_mattermost(&self, failing: &[&ProbeResult], suppressed: bool) -> DeliveryOutcome {
        let Some(url) = &self.channels.mattermost_webhook_url else {
            tracing::debug!("Mattermost webhook not configured");
            return DeliveryOutcome::Disabled;
        };
        if suppressed {
            return DeliveryOutcome::Suppressed;
        }
        let payload = mattermost::build_payload(failing, self.channels.mattermost_channel.as_deref());
        self.deliver(url, &payload).await
    }

    async fn send_email(&self, failing: &[&ProbeResult], suppressed: bool) -> DeliveryOutcome {
        let Some(to) = &self.channels.email_to else {
            tracing::debug!("Email recipient not configured");
            return DeliveryOutcome::Disabled;
        };
        if suppressed {
            return DeliveryOutcome::Suppressed;
        }

        let message = email::compose(to, failing);
        match &self.channels.email_relay_url {
            Some(relay) => self.deliver(relay, &message).await,
            None => {
                tracing::warn!(
                    "Email alert (no relay configured) to={} subject={:?}\n{}",
                    message.to,
                    message.subject,
                    message.body
                );
                DeliveryOutcome::Logged
            }
        }
    }

    async fn deliver<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> DeliveryOutcome {
        match self.post_json(url, payload).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Fixed sample data used when testing channels without probing.
pub fn synthetic_batch(now: DateTime<Utc>) -> ProbeBatch {
    ProbeBatch::new(
        now,
        vec![
            ProbeResult {
                endpoint_name: "MinIO 1 (test)".to_string(),
                url: "http://minio1.closetoya.com:9000/minio/health/live".to_string(),
                status: ProbeStatus::Error,
                status_code: Some(500),
                response_time_ms: 1200,
                error_message: Some("Connection timeout (test notification)".to_string()),
                observed_at: now,
            },
            ProbeResult {
                endpoint_name: "MinIO 2 (test)".to_string(),
                url: "http://minio2.closetoya.com:9000/minio/health/live".to_string(),
                status: ProbeStatus::Unhealthy,
                status_code: Some(404),
                response_time_ms: 800,
                error_message: None,
                observed_at: now,
            },
        ],
    )
}

pub(crate) fn status_label(status: ProbeStatus) -> &'static str {
    match status {
        ProbeStatus::Healthy => "OK",
        ProbeStatus::Unhealthy => "UNHEALTHY",
        ProbeStatus::Error => "ERROR",
    }
}

/// Error text, else status code, else `N/A`.
pub(crate) fn describe_detail(result: &ProbeResult) -> String {
    match (&result.error_message, result.status_code) {
        (Some(err), _) => err.clone(),
        (None, Some(code)) => code.to_string(),
        (None, None) => "N/A".to_string(),
    }
}

pub(crate) fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
