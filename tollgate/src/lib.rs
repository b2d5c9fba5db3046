//! Tollgate - Signed webhook receiver for payment provider events.
//!
//! Deliveries are authenticated with HMAC-SHA256 over the raw body,
//! deduplicated by event id, acknowledged immediately, and then handed to the
//! handler registered for their kind on a supervised background task.
//!
//! ## Architecture
//!
//! ```text
//! POST /api/webhooks → capture → signature → event → ledger → 200
//!                                                               └→ dispatch → handler
//! ```

pub mod capture;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handlers;
pub mod ledger;
pub mod shutdown;
pub mod signature;
pub mod token;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchResult, Dispatcher, EventHandler, HandlerRegistry, WebhookAck};
pub use error::WebhookError;
pub use event::{EventEnvelope, EventKind};
pub use ledger::{DedupLedger, MemoryLedger};
pub use signature::{SharedSecret, VerifiedPayload};
pub use web::{router, AppState};
