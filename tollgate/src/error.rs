//! Error taxonomy for the webhook endpoint.
//!
//! Every rejection the endpoint can produce maps to one variant here, and each
//! variant maps to one stable status code. Handler failures are not part of
//! this type: they happen after the response is sent and only reach the logs.

use axum::http::StatusCode;
use thiserror::Error;

use crate::capture::CaptureError;
use crate::event::DecodeError;
use crate::signature::SignatureError;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// No signing secret. Permanent until the process is reconfigured.
    #[error("webhook endpoint is not configured")]
    Configuration,
    #[error("authentication failed: {0}")]
    Authentication(SignatureError),
    #[error("invalid event: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl From<SignatureError> for WebhookError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::SecretNotConfigured => WebhookError::Configuration,
            other => WebhookError::Authentication(other),
        }
    }
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Authentication(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Decode(_) => StatusCode::BAD_REQUEST,
            WebhookError::Capture(CaptureError::PayloadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            WebhookError::Capture(CaptureError::Read(_)) => StatusCode::BAD_REQUEST,
        }
    }

    /// Response label. All authentication failures share one label.
    pub fn label(&self) -> &'static str {
        match self {
            WebhookError::Configuration => "not_configured",
            WebhookError::Authentication(_) => "unauthorized",
            WebhookError::Decode(_) => "invalid_event",
            WebhookError::Capture(CaptureError::PayloadTooLarge { .. }) => "payload_too_large",
            WebhookError::Capture(CaptureError::Read(_)) => "bad_request",
        }
    }
}
