//! bucketwatch server entry point.

use bucketwatch::auth::{Authenticator, SessionManager};
use bucketwatch::config::ServerConfig;
use bucketwatch::notify::Dispatcher;
use bucketwatch::probe::{Aggregator, HttpProber};
use bucketwatch::scheduler::{Monitor, Scheduler};
use bucketwatch::store::HistoryStore;
use bucketwatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("bucketwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting bucketwatch on port {}...", cfg.http_port);
    tracing::info!(
        "Monitoring {} endpoint(s) with a {:?} probe timeout",
        cfg.endpoints.len(),
        cfg.probe_timeout
    );

    // Probe pipeline
    let prober = HttpProber::new(cfg.probe_timeout)?;
    let aggregator = Aggregator::new(prober, cfg.endpoints.clone());
    let dispatcher = Dispatcher::new(cfg.channels.clone())?;
    let status = dispatcher.status();
    tracing::info!(
        "Notification channels: slack={} mattermost={} email={}",
        status.slack,
        status.mattermost,
        status.email
    );
    let monitor = Arc::new(Monitor::new(aggregator, HistoryStore::new(), dispatcher));

    // Authentication
    let auth = Arc::new(Authenticator::new(cfg.otp_secret.clone(), &cfg.otp_issuer));
    match auth.secret() {
        Some(secret) => tracing::info!("OTP authentication enabled (secret length {})", secret.len()),
        None => tracing::warn!("OTP_SECRET not set, authentication setup required"),
    }
    let sessions = Arc::new(SessionManager::from_config(
        cfg.session_signing_key.as_deref(),
        cfg.otp_secret.as_deref(),
        cfg.production,
    ));

    // Optional in-process trigger
    let scheduler = cfg
        .check_interval
        .map(|interval| Scheduler::new(monitor.clone(), interval));
    if let Some(scheduler) = &scheduler {
        scheduler.start().await;
    }

    // Start web server
    let server = Server::new(cfg, monitor, auth, sessions);
    let result = server.start().await;

    if let Some(scheduler) = &scheduler {
        scheduler.stop().await;
    }
    result
}
