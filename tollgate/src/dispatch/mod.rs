//! Event dispatch.
//!
//! [`Dispatcher::handle`] runs the synchronous part of a delivery: verify,
//! decode, record the event id, then acknowledge. Matching handlers run on a
//! supervised task set after the acknowledgment, so response latency does not
//! depend on how long business logic takes.
//!
//! ## Request Flow
//!
//! ```text
//! RawRequest → verify → decode → dedup → ack
//!                                         └─(spawned)→ handler → completed | failed (logged)
//! ```

pub mod registry;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures::FutureExt;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::capture::RawRequest;
use crate::config::Config;
use crate::error::WebhookError;
use crate::event::{decode, EventEnvelope};
use crate::ledger::DedupLedger;
use crate::signature::{verify_request, SharedSecret, SignatureError};

pub use registry::{EventHandler, HandlerRegistry, Route};

/// Outcome of sending an envelope towards a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Handed to (or, from [`Dispatcher::process`], completed by) a handler
    Accepted,
    /// Event id already recorded; no handler runs
    Duplicate,
    /// No handler registered for the kind; acknowledged anyway
    UnknownKind,
    /// Handler returned an error or panicked
    HandlerFailed(String),
}

impl DispatchResult {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchResult::Accepted | DispatchResult::HandlerFailed(_) => "accepted",
            DispatchResult::Duplicate => "duplicate",
            DispatchResult::UnknownKind => "ignored",
        }
    }
}

/// What the transport layer should answer.
#[derive(Debug)]
pub enum WebhookAck {
    Acked(DispatchResult),
    Rejected(WebhookError),
}

impl WebhookAck {
    pub fn is_acked(&self) -> bool {
        matches!(self, WebhookAck::Acked(_))
    }

    /// Every ack is a 200, whatever happened to the event afterwards.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookAck::Acked(_) => StatusCode::OK,
            WebhookAck::Rejected(err) => err.status_code(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WebhookAck::Acked(result) => result.label(),
            WebhookAck::Rejected(err) => err.label(),
        }
    }
}

impl From<WebhookError> for WebhookAck {
    fn from(err: WebhookError) -> Self {
        WebhookAck::Rejected(err)
    }
}

/// Verifies, deduplicates and routes webhook deliveries.
///
/// Cheap to clone; clones share the ledger and the task tracker.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    secret: Option<SharedSecret>,
    signature_header: String,
    registry: HandlerRegistry,
    ledger: Arc<dyn DedupLedger>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        secret: Option<SharedSecret>,
        signature_header: impl Into<String>,
        registry: HandlerRegistry,
        ledger: Arc<dyn DedupLedger>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                secret,
                signature_header: signature_header.into(),
                registry,
                ledger,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Build a dispatcher from startup configuration. Only the secret and the
    /// header name are taken from it.
    pub fn from_config(
        config: &Config,
        registry: HandlerRegistry,
        ledger: Arc<dyn DedupLedger>,
    ) -> Self {
        Self::new(
            config.webhook_secret.clone(),
            config.signature_header.clone(),
            registry,
            ledger,
        )
    }

    /// Handle one captured delivery up to the acknowledgment.
    ///
    /// Nothing is dispatched and no id is recorded unless the request both
    /// verifies and decodes. A matching handler is spawned and not awaited.
    pub async fn handle(&self, raw: RawRequest) -> WebhookAck {
        let inner = &self.inner;
        let body_length = raw.body().len();

        let verified = match verify_request(raw, &inner.signature_header, inner.secret.as_ref()) {
            Ok(verified) => verified,
            Err(SignatureError::SecretNotConfigured) => {
                error!("webhook_secret_not_configured");
                return WebhookError::Configuration.into();
            }
            Err(e) => {
                warn!(reason = e.kind(), body_length = body_length, "webhook_signature_rejected");
                return WebhookError::from(e).into();
            }
        };

        let envelope = match decode(verified) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(reason = e.kind(), error = %e, "webhook_decode_failed");
                return WebhookError::from(e).into();
            }
        };

        info!(
            kind = %envelope.kind,
            event_id = id_field(envelope.event_id.as_deref()),
            payload_fields = envelope.payload.len(),
            "webhook_verified"
        );

        match envelope.event_id.as_deref() {
            Some(event_id) => {
                if !inner.ledger.record_if_new(event_id).await {
                    info!(kind = %envelope.kind, event_id = %event_id, "webhook_duplicate");
                    return WebhookAck::Acked(DispatchResult::Duplicate);
                }
            }
            None => {
                warn!(kind = %envelope.kind, "webhook_without_event_id_not_deduplicated");
            }
        }

        let Some(handler) = self.resolve(&envelope) else {
            return WebhookAck::Acked(DispatchResult::UnknownKind);
        };

        inner.tracker.spawn(run_handler(handler, envelope));

        WebhookAck::Acked(DispatchResult::Accepted)
    }

    /// Route an envelope and run its handler to completion.
    ///
    /// Failures are logged and folded into the result; this never panics.
    pub async fn process(&self, envelope: EventEnvelope) -> DispatchResult {
        match self.resolve(&envelope) {
            Some(handler) => run_handler(handler, envelope).await,
            None => DispatchResult::UnknownKind,
        }
    }

    /// Look up the handler for an envelope's kind. Unregistered kinds are
    /// logged at info and yield `None`.
    fn resolve(&self, envelope: &EventEnvelope) -> Option<Arc<dyn EventHandler>> {
        match self.inner.registry.route(&envelope.kind) {
            Route::Handler(handler) => Some(handler),
            Route::Unregistered => {
                info!(
                    kind = %envelope.kind,
                    event_id = id_field(envelope.event_id.as_deref()),
                    "webhook_kind_unregistered"
                );
                None
            }
        }
    }

    /// Number of handler tasks still running.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Stop accepting handler work and wait up to `timeout` for what is running.
    ///
    /// Returns `false` if tasks were still running when the timeout expired.
    /// Deliveries handled after this call still get their id recorded and an
    /// ack, and their handlers are still spawned.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let tracker = &self.inner.tracker;
        tracker.close();

        info!(in_flight = tracker.len(), timeout_secs = timeout.as_secs(), "dispatcher_draining");

        match tokio::time::timeout(timeout, tracker.wait()).await {
            Ok(()) => {
                info!("dispatcher_drained");
                true
            }
            Err(_) => {
                warn!(abandoned = tracker.len(), "dispatcher_drain_timeout");
                false
            }
        }
    }
}

async fn run_handler(handler: Arc<dyn EventHandler>, envelope: EventEnvelope) -> DispatchResult {
    let kind = envelope.kind.as_str();
    let event_id = envelope.event_id.as_deref();

    let outcome = AssertUnwindSafe(handler.handle(kind, &envelope.payload))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            info!(kind = %kind, event_id = id_field(event_id), "webhook_handler_completed");
            DispatchResult::Accepted
        }
        Ok(Err(e)) => {
            error!(
                kind = %kind,
                event_id = id_field(event_id),
                error = %format!("{:#}", e),
                "webhook_handler_failed"
            );
            DispatchResult::HandlerFailed(e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(
                kind = %kind,
                event_id = id_field(event_id),
                panic = %message,
                "webhook_handler_panicked"
            );
            DispatchResult::HandlerFailed(message)
        }
    }
}

/// Log value for an optional event id.
fn id_field(event_id: Option<&str>) -> &str {
    event_id.unwrap_or("none")
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
