//! REST API server for the banking concierge
//!
//! Thin transport adapter over the orchestrator; no business rules live
//! here. Authentication tokens arrive in the Authorization header and are
//! resolved through the `Authenticator` collaborator.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Authenticator, DevAuthenticator};
use crate::models::AuthContext;
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub session_id: String,
    pub transaction_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    pub session_id: String,
    pub transaction_id: Uuid,
    pub choice: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub authenticator: Arc<DevAuthenticator>,
}

async fn resolve_auth(state: &ApiState, headers: &HeaderMap) -> Option<AuthContext> {
    let token = headers.get("Authorization")?.to_str().ok()?;
    state.authenticator.verify(token).await
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message is required".to_string())),
        );
    }

    let auth = resolve_auth(&state, &headers).await;

    let response = state
        .orchestrator
        .handle(&req.message, req.session_id.as_deref(), auth)
        .await;

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

/// =============================
/// Authentication Endpoints
/// =============================

async fn request_otp(
    State(state): State<ApiState>,
    Json(req): Json<OtpRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let otp = state.authenticator.generate_otp(&req.user_id).await;

    // Dev-only: a real deployment sends the OTP out of band.
    info!(user_id = %req.user_id, otp = %otp, "OTP issued");

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "message": "OTP sent successfully"
        }))),
    )
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.authenticator.login(&req.user_id, &req.otp).await {
        Some(token) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "token": token,
                "user_id": req.user_id,
            }))),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid credentials".to_string())),
        ),
    }
}

/// =============================
/// Transaction Endpoints
/// =============================

async fn confirm_transaction(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(auth) = resolve_auth(&state, &headers).await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Authentication required".to_string())),
        );
    };

    let response = state
        .orchestrator
        .confirm(&req.session_id, req.transaction_id, Some(auth))
        .await;

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

async fn cancel_transaction(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(auth) = resolve_auth(&state, &headers).await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Authentication required".to_string())),
        );
    };

    let response = state
        .orchestrator
        .cancel(&req.session_id, req.transaction_id, Some(auth))
        .await;

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

async fn clarify_transaction(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<ClarifyRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(auth) = resolve_auth(&state, &headers).await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Authentication required".to_string())),
        );
    };

    let response = state
        .orchestrator
        .clarify(&req.session_id, req.transaction_id, &req.choice, Some(auth))
        .await;

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

/// =============================
/// Session Endpoints
/// =============================

async fn session_info(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.orchestrator.session_info(&session_id).await {
        Some(info) => (StatusCode::OK, Json(ApiResponse::success(info))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session not found".to_string())),
        ),
    }
}

async fn clear_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    if state.orchestrator.clear_session(&session_id).await {
        (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "cleared": true }))),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session not found".to_string())),
        )
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(
    orchestrator: Arc<Orchestrator>,
    authenticator: Arc<DevAuthenticator>,
) -> Router {
    let state = ApiState {
        orchestrator,
        authenticator,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/auth/request-otp", post(request_otp))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/transactions/confirm", post(confirm_transaction))
        .route("/api/v1/transactions/cancel", post(cancel_transaction))
        .route("/api/v1/transactions/clarify", post(clarify_transaction))
        .route("/api/v1/sessions/:id", get(session_info).delete(clear_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    authenticator: Arc<DevAuthenticator>,
    host: &str,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator, authenticator);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on {}", addr);
    axum::serve(listener, router).await?;

    Ok(())
}
