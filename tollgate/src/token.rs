//! Access-token issuance boundary.
//!
//! Embedded provider components fetch a short-lived token from this service.
//! Minting is delegated to the identity provider through [`TokenMinter`]; this
//! crate only owns the HTTP contract around it.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    /// The caller's identity headers were missing or rejected
    #[error("request identity could not be verified")]
    Unauthenticated,
    /// The identity provider failed
    #[error("token provider failed: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub token: String,
}

/// Mints an access token for the user identified by the request headers.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    async fn mint(&self, headers: &HeaderMap) -> Result<AccessToken, TokenError>;
}
