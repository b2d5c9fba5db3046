//! Web server module.
//!
//! This module provides a thin, fast web server that:
//! - Receives provider webhooks and acknowledges them once verified and recorded
//! - Hands verified events to registered handlers in the background
//! - Exposes the access-token boundary and a health check

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, issue_token, receive_webhook, AppState, HealthResponse, TokenErrorResponse,
    WebhookResponse,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/webhooks", post(receive_webhook))
        .route("/api/token", get(issue_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
