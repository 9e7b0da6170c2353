//! Configuration module for bucketwatch.
//!
//! Loads configuration from environment variables once at startup. Invalid
//! values fall back to defaults or disable the feature they belong to; nothing
//! here is fatal.

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::store::Endpoint;

/// Endpoints probed when `BUCKETWATCH_ENDPOINTS` is unset or unusable.
pub const DEFAULT_ENDPOINTS: [(&str, &str); 4] = [
    ("MinIO 1", "http://minio1.closetoya.com:9000/minio/health/live"),
    ("MinIO 2", "http://minio2.closetoya.com:9000/minio/health/live"),
    ("MinIO 3", "http://minio3.closetoya.com:9000/minio/health/live"),
    ("MinIO 4", "http://minio4.closetoya.com:9000/minio/health/live"),
];

pub const DEFAULT_OTP_ISSUER: &str = "MinIO Health Monitor";

/// Notification channel settings, already validated.
///
/// A `None` field means the channel is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    pub slack_webhook_url: Option<String>,
    pub mattermost_webhook_url: Option<String>,
    pub mattermost_channel: Option<String>,
    pub email_to: Option<String>,
    pub email_relay_url: Option<String>,
}

impl ChannelSettings {
    /// Resolve channel settings from raw values, applying each channel's predicate.
    pub fn resolve(
        slack: Option<&str>,
        mattermost: Option<&str>,
        mattermost_channel: Option<&str>,
        email_to: Option<&str>,
        email_relay: Option<&str>,
    ) -> Self {
        Self {
            slack_webhook_url: accept(slack, is_webhook_url, "SLACK_WEBHOOK_URL"),
            mattermost_webhook_url: accept(mattermost, is_webhook_url, "MATTERMOST_WEBHOOK_URL"),
            mattermost_channel: mattermost_channel
                .filter(|v| is_configured(v))
                .map(|v| v.trim().to_string()),
            email_to: accept(email_to, is_email_address, "EMAIL_TO"),
            email_relay_url: accept(email_relay, is_webhook_url, "EMAIL_RELAY_URL"),
        }
    }

    fn from_env() -> Self {
        let get = |key: &str| env::var(key).ok();
        Self::resolve(
            get("SLACK_WEBHOOK_URL").as_deref(),
            get("MATTERMOST_WEBHOOK_URL").as_deref(),
            get("MATTERMOST_CHANNEL").as_deref(),
            get("EMAIL_TO").as_deref(),
            get("EMAIL_RELAY_URL").as_deref(),
        )
    }
}

fn accept(value: Option<&str>, valid: fn(&str) -> bool, key: &str) -> Option<String> {
    match value {
        Some(v) if valid(v) => Some(v.trim().to_string()),
        Some(v) if is_configured(v) => {
            tracing::warn!("{} is set but malformed; channel disabled", key);
            None
        }
        _ => None,
    }
}

/// Present, non-blank after trimming, and not commented out with `#`.
pub fn is_configured(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// A configured absolute http(s) URL with a host.
pub fn is_webhook_url(value: &str) -> bool {
    if !is_configured(value) {
        return false;
    }
    match url::Url::parse(value.trim()) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// A configured `local@domain.tld` address.
pub fn is_email_address(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    });
    is_configured(value) && re.is_match(value.trim())
}

/// Parse `name=url` pairs separated by commas, skipping malformed entries.
pub fn parse_endpoints(raw: &str) -> Vec<Endpoint> {
    raw.split(',')
        .filter(|entry| is_configured(entry))
        .filter_map(|entry| {
            let (name, url) = entry.split_once('=')?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || !is_webhook_url(url) {
                tracing::warn!("Ignoring malformed endpoint entry: {}", entry.trim());
                return None;
            }
            Some(Endpoint::new(name, url))
        })
        .collect()
}

pub fn default_endpoints() -> Vec<Endpoint> {
    DEFAULT_ENDPOINTS
        .iter()
        .map(|(name, url)| Endpoint::new(name, url))
        .collect()
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Endpoints to probe, in reporting order
    pub endpoints: Vec<Endpoint>,
    pub probe_timeout: Duration,
    /// In-process trigger interval; `None` leaves triggering to an external caller
    pub check_interval: Option<Duration>,
    /// Marks session cookies `Secure`
    pub production: bool,
    pub channels: ChannelSettings,
    /// Base32 TOTP secret; `None` disables authentication
    pub otp_secret: Option<String>,
    pub otp_issuer: String,
    pub session_signing_key: Option<String>,
    pub cron_secret: Option<String>,
    pub show_qr_setup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            endpoints: default_endpoints(),
            probe_timeout: Duration::from_secs(10),
            check_interval: None,
            production: false,
            channels: ChannelSettings::default(),
            otp_secret: None,
            otp_issuer: DEFAULT_OTP_ISSUER.to_string(),
            session_signing_key: None,
            cron_secret: None,
            show_qr_setup: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BUCKETWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `BUCKETWATCH_ENDPOINTS`: `name=url,name=url` (default: four MinIO nodes)
    /// - `BUCKETWATCH_PROBE_TIMEOUT_SECS`: probe timeout (default: 10)
    /// - `BUCKETWATCH_CHECK_INTERVAL_SECS`: periodic trigger, 0 disables (default: 0)
    /// - `BUCKETWATCH_PRODUCTION`: `true` for secure cookies
    /// - channel, OTP, session and cron variables, see `ChannelSettings`
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("BUCKETWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.trim().parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(raw) = env::var("BUCKETWATCH_ENDPOINTS") {
            let endpoints = parse_endpoints(&raw);
            if endpoints.is_empty() {
                tracing::warn!("BUCKETWATCH_ENDPOINTS has no usable entries, using defaults");
            } else {
                cfg.endpoints = endpoints;
            }
        }

        if let Ok(secs) = env::var("BUCKETWATCH_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.trim().parse::<u64>() {
                if secs > 0 {
                    cfg.probe_timeout = Duration::from_secs(secs);
                }
            }
        }

        if let Ok(secs) = env::var("BUCKETWATCH_CHECK_INTERVAL_SECS") {
            cfg.check_interval = secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .map(Duration::from_secs);
        }

        cfg.production = env_flag("BUCKETWATCH_PRODUCTION");
        cfg.show_qr_setup = env_flag("SHOW_QR_SETUP");
        cfg.channels = ChannelSettings::from_env();

        cfg.otp_secret = env_value("OTP_SECRET");
        if let Some(issuer) = env_value("OTP_ISSUER") {
            cfg.otp_issuer = issuer;
        }
        cfg.session_signing_key = env_value("SESSION_SIGNING_KEY");
        cfg.cron_secret = env_value("CRON_SECRET");

        cfg
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .filter(|v| is_configured(v))
        .map(|v| v.trim().to_string())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
