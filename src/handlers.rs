// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the anonymous inbox service.
//!
//! Bodies are parsed leniently after the rate limit is consumed, so a
//! malformed payload costs the sender a token and yields 400 rather than
//! bypassing the limiter.

use crate::abuse::AbuseController;
use crate::authz::OwnershipAuthorizer;
use crate::config::Config;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::repository::MessageRepository;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Cookie carrying the owner capability.
pub const TOKEN_COOKIE: &str = "auth_token";

/// Shared application state.
pub struct AppState {
    pub controller: AbuseController,
    pub authorizer: OwnershipAuthorizer,
    pub repository: Arc<dyn MessageRepository>,
    pub metrics: Arc<Metrics>,
    pub config: Config,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub message_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxQuery {
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOwnerResponse {
    pub user_id: String,
    /// Shown once; also set as the `auth_token` cookie
    pub token: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            AppError::RateLimited { retry_after } => {
                let retry_secs = retry_after_secs(retry_after);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_secs.to_string())],
                    Json(ErrorResponse {
                        error: "Too many requests. Please try again later.".to_string(),
                        code: "RATE_LIMITED",
                        retry_after_secs: Some(retry_secs),
                        details: Vec::new(),
                    }),
                )
                    .into_response()
            }
            AppError::InvalidInput(reasons) => error_response(
                StatusCode::BAD_REQUEST,
                "Invalid input",
                "INVALID_INPUT",
                reasons.iter().map(ToString::to_string).collect(),
            ),
            AppError::Forbidden => {
                error_response(StatusCode::FORBIDDEN, &message, "FORBIDDEN", Vec::new())
            }
            AppError::NotFound => {
                error_response(StatusCode::NOT_FOUND, &message, "NOT_FOUND", Vec::new())
            }
            AppError::AlreadyAnswered => error_response(
                StatusCode::CONFLICT,
                &message,
                "ALREADY_ANSWERED",
                Vec::new(),
            ),
            AppError::ServiceDegraded(_) => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                "SERVICE_DEGRADED",
                Vec::new(),
            ),
            AppError::Internal(_) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "INTERNAL",
                Vec::new(),
            ),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: &str,
    code: &'static str,
    details: Vec<String>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code,
            retry_after_secs: None,
            details,
        }),
    )
        .into_response()
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/users", post(create_owner))
        .route("/api/users/:user_id", get(get_owner))
        .route("/api/users/:user_id/answers", get(list_answers))
        .route("/api/send-message", post(send_message))
        .route("/api/messages", get(read_mailbox))
        .route("/api/messages/:message_id", patch(answer_message))
        .route("/api/logout", post(logout));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    router.with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "anon-inbox",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Create a mailbox owner and issue its capability.
pub async fn create_owner(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let token = generate_token();
    let owner = state.repository.create_owner(&token).await.map_err(|e| {
        error!(error = %e, "Error creating owner");
        AppError::from(e)
    })?;
    info!(owner_id = %owner.id, "Owner created");

    let cookie = format!("{TOKEN_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/");
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(CreateOwnerResponse {
            user_id: owner.id,
            token,
        }),
    )
        .into_response())
}

/// Public owner profile; this is what the share link resolves.
pub async fn get_owner(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    let owner = state
        .repository
        .find_owner(&user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(owner).into_response())
}

/// Public feed of answered messages.
pub async fn list_answers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    if state.repository.find_owner(&user_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let answered = state
        .repository
        .list_answered_by_owner(&user_id, state.config.mailbox.page_size)
        .await?;
    Ok(Json(answered).into_response())
}

/// Accept an anonymous message.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let address = client_address(&headers, peer, state.config.trust_forwarded_for);
    let request: SendMessageRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        warn!(address = %address, error = %e, "Unparseable send body");
        SendMessageRequest::default()
    });

    let accepted = state
        .controller
        .send_message(
            &address,
            request.user_id.as_deref(),
            request.message.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            success: true,
            message_id: accepted.message_id,
        }),
    )
        .into_response())
}

/// Owner-only mailbox read.
pub async fn read_mailbox(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MailboxQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = presented_token(&headers);
    let owner_id = query.owner_id.unwrap_or_default();
    let messages = state
        .authorizer
        .read_mailbox(&owner_id, token.as_deref())
        .await?;
    Ok(Json(messages).into_response())
}

/// Owner-only answer write.
pub async fn answer_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token = presented_token(&headers);
    let request: AnswerRequest = serde_json::from_slice(&body).unwrap_or_default();
    let record = state
        .authorizer
        .answer_message(&message_id, request.answer.as_deref(), token.as_deref())
        .await?;
    Ok(Json(record).into_response())
}

/// Clear the capability cookie.
pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{TOKEN_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0");
    (
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "success": true, "message": "Logged out successfully" })),
    )
}

/// 256-bit random capability, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Capability from `Authorization: Bearer` or the `auth_token` cookie.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

/// Request origin: the socket peer, or the first forwarded hop when trusted.
pub fn client_address(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = Config::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let repository: Arc<dyn MessageRepository> = Arc::new(InMemoryRepository::new());
        let controller = AbuseController::from_config(
            &config,
            Arc::new(MemoryStore::default()),
            Arc::new(MemoryStore::default()),
            repository.clone(),
            metrics.clone(),
        )
        .unwrap();
        let authorizer = OwnershipAuthorizer::from_config(&config, repository.clone(), metrics.clone());
        router(Arc::new(AppState {
            controller,
            authorizer,
            repository,
            metrics,
            config,
        }))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo("1.2.3.4:5555".parse().unwrap())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_token_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; auth_token=abc123".parse().unwrap());
        assert_eq!(presented_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert_eq!(presented_token(&headers).as_deref(), Some("xyz"));

        assert_eq!(presented_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_client_address_forwarding() {
        let peer: SocketAddr = "10.0.0.1:80".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

        assert_eq!(client_address(&headers, peer, false), "10.0.0.1");
        assert_eq!(client_address(&headers, peer, true), "203.0.113.9");
        assert_eq!(client_address(&HeaderMap::new(), peer, true), "10.0.0.1");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_send_and_read_over_http() {
        let app = app();

        let response = app
            .clone()
            .oneshot(Request::post("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key(header::SET_COOKIE));
        let created = body_json(response).await;
        let user_id = created["userId"].as_str().unwrap().to_string();
        let token = created["token"].as_str().unwrap().to_string();

        let mut send = Request::post("/api/send-message")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "userId": user_id, "message": "hello" }).to_string(),
            ))
            .unwrap();
        send.extensions_mut().insert(peer());
        let response = app.clone().oneshot(send).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let read = Request::get(format!("/api/messages?ownerId={user_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(read).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let messages = body_json(response).await;
        assert_eq!(messages.as_array().unwrap().len(), 1);
        assert!(messages[0].get("sourceAddress").is_none());

        let read = Request::get(format!("/api/messages?ownerId={user_id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(read).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let mut send = Request::post("/api/send-message")
            .body(Body::from("{not json"))
            .unwrap();
        send.extensions_mut().insert(peer());
        let response = app().oneshot(send).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_unknown_owner_profile_not_found() {
        let response = app()
            .oneshot(
                Request::get("/api/users/00000000-0000-0000-0000-000000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
