//! HTTP request handlers.
//!
//! Every response carries a `success` flag; failures also carry an `error` message.

use super::AppState;
use crate::auth::{find_session_cookie, time_step, SessionLookup, Verification};
use crate::notify::{synthetic_batch, DispatchMode};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(find_session_cookie)
}

fn lookup_session(state: &AppState, headers: &HeaderMap) -> SessionLookup {
    state.sessions.lookup(session_cookie(headers), Utc::now())
}

/// Attach a clearing `Set-Cookie` when the request carried an unusable session.
fn clear_rejected_session(
    state: &AppState,
    session: &SessionLookup,
    mut response: Response,
) -> Response {
    if session.should_clear() {
        match HeaderValue::from_str(&state.sessions.clear_cookie()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Failed to build clearing cookie: {}", e),
        }
    }
    response
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "timestamp": Utc::now(),
        "results": state.monitor.history().latest_results(),
    }))
}

pub async fn handle_run_health(State(state): State<AppState>) -> impl IntoResponse {
    let batch = state.monitor.check_now().await;
    Json(json!({
        "success": true,
        "timestamp": batch.observed_at,
        "results": batch.results,
    }))
}

pub async fn handle_get_history(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.monitor.history();
    Json(json!({
        "success": true,
        "capacity": history.capacity(),
        "history": history.history(),
    }))
}

/// Periodic trigger for an external scheduler.
pub async fn handle_cron(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.config.cron_secret {
        let expected = format!("Bearer {}", secret);
        let provided = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            tracing::warn!("Rejected cron trigger with missing or wrong bearer token");
            return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    }

    tracing::info!("Health check triggered");
    let report = state.monitor.run_health_cycle().await;
    let counts = report.counts();

    Json(json!({
        "success": true,
        "timestamp": report.batch.observed_at,
        "checked": counts.checked,
        "healthy": counts.healthy,
        "unhealthy": counts.unhealthy,
        "notified": report.dispatch.is_some(),
        "results": report.batch.results,
    }))
    .into_response()
}

// ============================================================================
// Notifications
// ============================================================================

pub async fn handle_notification_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.monitor.dispatcher().status();
    Json(json!({
        "success": true,
        "timestamp": Utc::now(),
        "notifications": status,
        "message": format!("{} notification channel(s) enabled.", status.total),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestWebhookQuery {
    /// Probe the real endpoints instead of sending sample data.
    #[serde(default)]
    pub live: bool,
}

pub async fn handle_test_webhook(
    State(state): State<AppState>,
    Query(query): Query<TestWebhookQuery>,
) -> Response {
    let dispatcher = state.monitor.dispatcher();
    let status = dispatcher.status();
    if status.total == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "No notification channel is enabled. Check the environment configuration.",
                "notifications": status,
            })),
        )
            .into_response();
    }

    let batch = if query.live {
        state.monitor.aggregator().run_cycle().await
    } else {
        synthetic_batch(Utc::now())
    };

    tracing::info!("Sending test notification to {} channel(s)", status.total);
    let report = dispatcher.dispatch(&batch, DispatchMode::Test).await;

    Json(json!({
        "success": true,
        "message": format!("Test notification sent to {} channel(s).", status.total),
        "timestamp": Utc::now(),
        "notifications": status,
        "attempted": report.attempted(),
        "testData": batch.results,
    }))
    .into_response()
}

// ============================================================================
// Auth
// ============================================================================

pub async fn handle_auth_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = lookup_session(&state, &headers);
    let otp_enabled = state.auth.is_enabled();
    let otp_setup_required = state.auth.is_setup_required();

    let body = Json(json!({
        "success": true,
        "data": {
            "otpEnabled": otp_enabled,
            "otpSetupRequired": otp_setup_required,
            "authenticated": session.is_active(),
            "requiresAuth": otp_enabled,
            "requiresSetup": otp_setup_required,
            "showQrSetup": state.config.show_qr_setup,
        },
    }));

    clear_rejected_session(&state, &session, body.into_response())
}

/// Enrolment material. Only handed out while QR setup is switched on or to an
/// already authenticated caller.
pub async fn handle_otp_setup(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = lookup_session(&state, &headers);
    let response = otp_setup_response(&state, &session);
    clear_rejected_session(&state, &session, response)
}

fn otp_setup_response(state: &AppState, session: &SessionLookup) -> Response {
    if !state.auth.is_enabled() {
        return failure(
            StatusCode::BAD_REQUEST,
            "OTP is not configured. Check the OTP_SECRET environment variable.",
        );
    }
    if !state.config.show_qr_setup && !session.is_active() {
        return failure(StatusCode::FORBIDDEN, "OTP setup is not available.");
    }

    match state.auth.setup_info() {
        Ok(info) => Json(json!({ "success": true, "data": info })).into_response(),
        Err(e) => {
            tracing::error!("Failed to build OTP setup info: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Could not generate the OTP setup.")
        }
    }
}

pub async fn handle_otp_verify(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    if !state.auth.is_enabled() {
        return failure(
            StatusCode::BAD_REQUEST,
            "OTP is not configured. Check the OTP_SECRET environment variable.",
        );
    }

    let Some(token) = body.get("token").and_then(Value::as_str) else {
        return failure(StatusCode::BAD_REQUEST, "An OTP token is required.");
    };

    let now = Utc::now();
    let outcome = state.auth.verify(token, now);
    let status = match outcome {
        Verification::Accepted => StatusCode::OK,
        Verification::NotConfigured => StatusCode::BAD_REQUEST,
        Verification::Malformed | Verification::Rejected => StatusCode::UNAUTHORIZED,
        Verification::Fault => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status != StatusCode::OK {
        tracing::info!("OTP verification failed: {:?}", outcome);
        return failure(status, outcome.message());
    }

    let session = state.sessions.create_session(now);
    let cookie = match state.sessions.set_cookie(&session) {
        Ok(cookie) => cookie,
        Err(e) => {
            tracing::error!("Failed to encode session: {}", e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Could not create a session.");
        }
    };

    tracing::info!("OTP verified, session issued until {}", session.expires_at);
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "message": outcome.message(),
            "session": {
                "authenticated": true,
                "expiresAt": session.expires_at,
            },
        })),
    )
        .into_response()
}

pub async fn handle_logout(State(state): State<AppState>) -> impl IntoResponse {
    state.sessions.invalidate(Utc::now());
    (
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Json(json!({ "success": true, "message": "Logged out." })),
    )
}

// ============================================================================
// Diagnostics
// ============================================================================

pub async fn handle_time_sync() -> impl IntoResponse {
    let now = Utc::now();
    Json(json!({
        "success": true,
        "data": {
            "serverTime": now,
            "unixTime": now.timestamp(),
            "totpStep": time_step(now.timestamp()),
        },
    }))
}

#[cfg(test)]
mod tests {
    use crate::auth::{generate_code, Authenticator, SessionManager};
    use crate::config::{ChannelSettings, ServerConfig};
    use crate::notify::Dispatcher;
    use crate::probe::{Aggregator, HttpProber};
    use crate::scheduler::Monitor;
    use crate::store::HistoryStore;
    use crate::web::Server;

    use chrono::Utc;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    const SECRET: &str = "JBSWY3DPEHPK3PXP";

    async fn spawn_server(config: ServerConfig) -> String {
        let monitor = Monitor::new(
            Aggregator::new(HttpProber::new(Duration::from_secs(1)).unwrap(), vec![]),
            HistoryStore::new(),
            Dispatcher::new(config.channels.clone()).unwrap(),
        );
        let auth = Authenticator::new(config.otp_secret.clone(), &config.otp_issuer);
        let sessions = SessionManager::new(b"web-test-key", false);
        let server = Server::new(config, Arc::new(monitor), Arc::new(auth), Arc::new(sessions));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = server.routes();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn otp_config() -> ServerConfig {
        ServerConfig {
            otp_secret: Some(SECRET.to_string()),
            ..ServerConfig::default()
        }
    }

    fn cookie_pair(response: &reqwest::Response) -> String {
        let set_cookie = response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .expect("Set-Cookie header")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn authenticated(client: &reqwest::Client, base: &str, cookie: Option<&str>) -> bool {
        let mut request = client.get(format!("{}/api/auth/status", base));
        if let Some(cookie) = cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let body: Value = request.send().await.unwrap().json().await.unwrap();
        body["data"]["authenticated"].as_bool().unwrap()
    }

    #[tokio::test]
    async fn test_login_and_logout_flow() {
        let base = spawn_server(otp_config()).await;
        let client = reqwest::Client::new();

        let code = generate_code(SECRET, Utc::now().timestamp()).unwrap();
        let response = client
            .post(format!("{}/api/auth/otp/verify", base))
            .json(&serde_json::json!({ "token": code }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let cookie = cookie_pair(&response);
        assert!(cookie.starts_with("bucketwatch-session="));

        assert!(authenticated(&client, &base, Some(&cookie)).await);
        assert!(!authenticated(&client, &base, None).await);

        let response = client.post(format!("{}/api/auth/logout", base)).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(!authenticated(&client, &base, Some(&cookie)).await);
    }

    #[tokio::test]
    async fn test_wrong_and_malformed_codes() {
        let base = spawn_server(otp_config()).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/auth/otp/verify", base);

        let response = client.post(&url).json(&serde_json::json!({ "token": "12ab" })).send().await.unwrap();
        assert_eq!(response.status(), 401);
        assert!(response.headers().get(reqwest::header::SET_COOKIE).is_none());

        let response = client.post(&url).json(&serde_json::json!({})).send().await.unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_padded_code_is_malformed() {
        let base = spawn_server(otp_config()).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/auth/otp/verify", base);
        let code = generate_code(SECRET, Utc::now().timestamp()).unwrap();

        for padded in [format!(" {}", code), format!("{} ", code)] {
            let response = client
                .post(&url)
                .json(&serde_json::json!({ "token": padded }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 401);
            assert!(response.headers().get(reqwest::header::SET_COOKIE).is_none());
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn test_garbage_cookie_is_cleared() {
        let base = spawn_server(otp_config()).await;
        let response = reqwest::Client::new()
            .get(format!("{}/api/auth/status", base))
            .header(reqwest::header::COOKIE, "bucketwatch-session=not-a-token")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let set_cookie = response.headers().get(reqwest::header::SET_COOKIE).unwrap();
        assert!(set_cookie.to_str().unwrap().contains("Max-Age=0"));
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["data"]["authenticated"], false);
    }

    #[tokio::test]
    async fn test_setup_clears_garbage_cookie() {
        let base = spawn_server(otp_config()).await;
        let response = reqwest::Client::new()
            .get(format!("{}/api/auth/otp/setup", base))
            .header(reqwest::header::COOKIE, "bucketwatch-session=not-a-token")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 403);
        let set_cookie = response.headers().get(reqwest::header::SET_COOKIE).unwrap();
        assert!(set_cookie.to_str().unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_verify_without_secret() {
        let base = spawn_server(ServerConfig::default()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/auth/otp/verify", base))
            .json(&serde_json::json!({ "token": "123456" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_setup_requires_flag_or_session() {
        let base = spawn_server(otp_config()).await;
        let response = reqwest::get(format!("{}/api/auth/otp/setup", base)).await.unwrap();
        assert_eq!(response.status(), 403);

        let base = spawn_server(ServerConfig {
            show_qr_setup: true,
            ..otp_config()
        })
        .await;
        let body: Value = reqwest::get(format!("{}/api/auth/otp/setup", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"]["manualEntryKey"], SECRET);
        assert!(body["data"]["provisioningUri"].as_str().unwrap().starts_with("otpauth://totp/"));
    }

    #[tokio::test]
    async fn test_cron_bearer_check() {
        let base = spawn_server(ServerConfig {
            cron_secret: Some("s3cret".to_string()),
            endpoints: vec![],
            ..ServerConfig::default()
        })
        .await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/cron", base);

        assert_eq!(client.get(&url).send().await.unwrap().status(), 401);
        assert_eq!(
            client.get(&url).bearer_auth("wrong").send().await.unwrap().status(),
            401
        );

        let response = client.get(&url).bearer_auth("s3cret").send().await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["checked"], 0);
    }

    #[tokio::test]
    async fn test_health_query_before_first_cycle() {
        let base = spawn_server(ServerConfig::default()).await;
        let body: Value = reqwest::get(format!("{}/api/health-check", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["results"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_test_webhook_without_channels() {
        let base = spawn_server(ServerConfig {
            channels: ChannelSettings::default(),
            ..ServerConfig::default()
        })
        .await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/test-webhook", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let body: Value = reqwest::get(format!("{}/api/notification-status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["notifications"]["total"], 0);
    }
}
