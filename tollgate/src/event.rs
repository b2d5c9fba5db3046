//! Event decoding.
//!
//! Turns a verified body into an [`EventEnvelope`]. Only the fields needed for
//! routing and deduplication are extracted; the kind-specific payload stays an
//! untyped JSON object until a handler claims it.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::signature::VerifiedPayload;

/// Errors raised while decoding a verified body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("body is not a valid event object: {0}")]
    MalformedBody(String),
    #[error("event kind is missing")]
    MissingEventKind,
}

impl DecodeError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::MalformedBody(_) => "malformed_body",
            DecodeError::MissingEventKind => "missing_event_kind",
        }
    }
}

/// Event kinds the provider is known to send.
///
/// Anything else decodes to `Other`, which keeps unrecognized kinds routable
/// (and acknowledgeable) without a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    PaymentSucceeded,
    PaymentFailed,
    PaymentPending,
    MembershipWentValid,
    MembershipWentInvalid,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::PaymentSucceeded => "payment.succeeded",
            EventKind::PaymentFailed => "payment.failed",
            EventKind::PaymentPending => "payment.pending",
            EventKind::MembershipWentValid => "membership.went_valid",
            EventKind::MembershipWentInvalid => "membership.went_invalid",
            EventKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "payment.succeeded" => EventKind::PaymentSucceeded,
            "payment.failed" => EventKind::PaymentFailed,
            "payment.pending" => EventKind::PaymentPending,
            "membership.went_valid" => EventKind::MembershipWentValid,
            "membership.went_invalid" => EventKind::MembershipWentInvalid,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(kind: String) -> Self {
        EventKind::from(kind.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Routing discriminator
    pub kind: EventKind,
    /// Provider-assigned id. `None` means the event cannot be deduplicated.
    pub event_id: Option<String>,
    /// Kind-specific fields, unvalidated
    pub payload: Map<String, Value>,
}

/// Accepted spellings per field, in priority order. The first non-null one
/// wins and the others are ignored.
const KIND_FIELDS: [&str; 3] = ["action", "kind", "type"];
const ID_FIELDS: [&str; 3] = ["id", "event_id", "eventId"];
const DATA_FIELDS: [&str; 2] = ["data", "payload"];

/// Decode a verified body into an [`EventEnvelope`].
pub fn decode(verified: VerifiedPayload) -> Result<EventEnvelope, DecodeError> {
    decode_bytes(verified.as_bytes())
}

fn decode_bytes(bytes: &[u8]) -> Result<EventEnvelope, DecodeError> {
    let mut object: Map<String, Value> =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::MalformedBody(e.to_string()))?;

    let kind = match take_first(&mut object, &KIND_FIELDS) {
        Some((_, Value::String(kind))) if !kind.is_empty() => kind,
        Some((_, Value::String(_))) | None => return Err(DecodeError::MissingEventKind),
        Some((name, other)) => return Err(not_a(name, "string", &other)),
    };

    let event_id = match take_first(&mut object, &ID_FIELDS) {
        Some((_, Value::String(id))) => Some(id).filter(|id| !id.is_empty()),
        Some((name, other)) => return Err(not_a(name, "string", &other)),
        None => None,
    };

    let payload = match take_first(&mut object, &DATA_FIELDS) {
        Some((_, Value::Object(data))) => data,
        Some((name, other)) => return Err(not_a(name, "object", &other)),
        None => Map::new(),
    };

    Ok(EventEnvelope {
        kind: EventKind::from(kind),
        event_id,
        payload,
    })
}

/// Remove and return the first non-null field among `names`.
fn take_first(
    object: &mut Map<String, Value>,
    names: &[&'static str],
) -> Option<(&'static str, Value)> {
    names.iter().find_map(|&name| match object.remove(name) {
        Some(Value::Null) | None => None,
        Some(value) => Some((name, value)),
    })
}

fn not_a(field: &str, expected: &str, found: &Value) -> DecodeError {
    DecodeError::MalformedBody(format!("`{}` must be a {}, found {}", field, expected, found))
}
