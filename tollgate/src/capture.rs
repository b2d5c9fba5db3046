//! Raw payload capture.
//!
//! The body is buffered once, as received, before anything tries to parse it.
//! Signatures are computed over these exact bytes, so re-serializing a parsed
//! body would break verification for legitimate senders.

use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_LENGTH, HeaderMap},
};
use futures::StreamExt;
use thiserror::Error;

/// Errors raised while buffering a request body.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    Read(String),
}

/// An inbound request exactly as received: headers plus immutable body bytes.
#[derive(Debug, Clone)]
pub struct RawRequest {
    headers: HeaderMap,
    body: Bytes,
}

impl RawRequest {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        Self { headers, body }
    }

    /// Received headers. `HeaderMap` lookups are case-insensitive.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Buffer `body` into a [`RawRequest`], refusing anything over `limit` bytes.
///
/// A declared `Content-Length` over the limit is rejected before reading.
/// Chunked or undeclared bodies are cut off as soon as the running total
/// passes the limit, so oversized input is never fully buffered.
pub async fn capture(
    headers: HeaderMap,
    body: Body,
    limit: usize,
) -> Result<RawRequest, CaptureError> {
    let declared = declared_length(&headers);

    if let Some(declared) = declared {
        if declared > limit as u64 {
            return Err(CaptureError::PayloadTooLarge { limit });
        }
    }

    let mut buf = Vec::with_capacity(declared.map(|d| d as usize).unwrap_or(0));
    let mut stream = body.into_data_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CaptureError::Read(e.to_string()))?;

        if buf.len() + chunk.len() > limit {
            return Err(CaptureError::PayloadTooLarge { limit });
        }

        buf.extend_from_slice(&chunk);
    }

    Ok(RawRequest::new(headers, Bytes::from(buf)))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
