//! HTTP endpoint handlers.
//!
//! The webhook handler only captures the body and runs the dispatcher up to the
//! acknowledgment. Business logic runs afterwards on the dispatcher's task set.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::capture::capture;
use crate::dispatch::{Dispatcher, WebhookAck};
use crate::error::WebhookError;
use crate::token::{TokenError, TokenMinter};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub token_minter: Option<Arc<dyn TokenMinter>>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
            token_minter: None,
        }
    }

    pub fn with_token_minter(mut self, minter: Arc<dyn TokenMinter>) -> Self {
        self.token_minter = Some(minter);
        self
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Webhook
// =============================================================================

/// Webhook response.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

impl IntoResponse for WebhookAck {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(WebhookResponse {
                status: self.label(),
            }),
        )
            .into_response()
    }
}

/// Webhook endpoint.
///
/// This endpoint:
/// 1. Buffers the raw body (size-limited)
/// 2. Verifies, decodes and deduplicates through the dispatcher
/// 3. Returns as soon as the event is recorded, before any handler finishes
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> WebhookAck {
    let raw = match capture(headers, body, state.config.max_body_bytes).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, limit = state.config.max_body_bytes, "webhook_capture_failed");
            return WebhookError::from(e).into();
        }
    };

    info!(body_length = raw.body().len(), "webhook_received");

    let ack = state.dispatcher.handle(raw).await;

    info!(status = ack.label(), "webhook_responded");

    ack
}

// =============================================================================
// Access Token
// =============================================================================

#[derive(Serialize)]
pub struct TokenErrorResponse {
    pub error: &'static str,
}

/// Access-token endpoint. 503 when no minter is configured.
pub async fn issue_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(minter) = state.token_minter.as_ref() else {
        warn!("token_minter_not_configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(TokenErrorResponse {
                error: "token issuance is not configured",
            }),
        )
            .into_response();
    };

    match minter.mint(&headers).await {
        Ok(token) => {
            info!("access_token_issued");
            (StatusCode::OK, Json(token)).into_response()
        }
        Err(TokenError::Unauthenticated) => {
            warn!("access_token_unauthenticated");
            (
                StatusCode::UNAUTHORIZED,
                Json(TokenErrorResponse {
                    error: "unauthorized",
                }),
            )
                .into_response()
        }
        Err(TokenError::Upstream(e)) => {
            error!(error = %e, "access_token_upstream_failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(TokenErrorResponse {
                    error: "token provider unavailable",
                }),
            )
                .into_response()
        }
    }
}
