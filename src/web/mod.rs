//! Web server module.

mod handlers;

pub use handlers::*;

use crate::auth::{Authenticator, SessionManager};
use crate::config::ServerConfig;
use crate::scheduler::Monitor;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub monitor: Arc<Monitor>,
    pub auth: Arc<Authenticator>,
    pub sessions: Arc<SessionManager>,
}

/// Web server for bucketwatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        monitor: Arc<Monitor>,
        auth: Arc<Authenticator>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            state: AppState {
                config: Arc::new(config),
                monitor,
                auth,
                sessions,
            },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Health
            .route("/api/health-check", get(handlers::handle_get_health))
            .route("/api/health-check", post(handlers::handle_run_health))
            .route("/api/history", get(handlers::handle_get_history))
            .route("/api/cron", get(handlers::handle_cron))
            // Notifications
            .route("/api/notification-status", get(handlers::handle_notification_status))
            .route("/api/test-webhook", post(handlers::handle_test_webhook))
            // Auth
            .route("/api/auth/status", get(handlers::handle_auth_status))
            .route("/api/auth/otp/setup", get(handlers::handle_otp_setup))
            .route("/api/auth/otp/verify", post(handlers::handle_otp_verify))
            .route("/api/auth/logout", post(handlers::handle_logout))
            // Diagnostics
            .route("/api/debug/time-sync", get(handlers::handle_time_sync))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
