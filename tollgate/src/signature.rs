//! Webhook signature verification.
//!
//! The provider signs the raw request body with HMAC-SHA256 and sends the
//! digest as `sha256=<hex>` in a request header. Verification always runs over
//! the bytes exactly as received, before any JSON parsing.

use std::fmt;

use axum::body::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::capture::RawRequest;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm tag the provider puts in front of the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Output size of HMAC-SHA256 in bytes.
pub const DIGEST_LEN: usize = 32;

/// Reasons a payload fails authentication.
///
/// The transport layer maps every variant except `SecretNotConfigured` to the
/// same 401 response, so callers cannot tell which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("webhook signing secret is not configured")]
    SecretNotConfigured,
    #[error("signature header is missing")]
    MissingSignatureHeader,
    #[error("signature header is malformed")]
    MalformedSignature,
    #[error("signature does not match payload")]
    SignatureMismatch,
}

impl SignatureError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SignatureError::SecretNotConfigured => "secret_not_configured",
            SignatureError::MissingSignatureHeader => "missing_signature_header",
            SignatureError::MalformedSignature => "malformed_signature",
            SignatureError::SignatureMismatch => "signature_mismatch",
        }
    }
}

/// The shared signing secret. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// Build a secret from an environment value. Blank values count as unset.
    pub fn from_env_value(value: String) -> Option<Self> {
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value.into_bytes()))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// A parsed `sha256=<hex>` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    digest: [u8; DIGEST_LEN],
}

impl SignatureHeader {
    /// Parse a header value.
    ///
    /// Only the canonical lowercase hex encoding is accepted, so every distinct
    /// header string maps to a distinct digest.
    /// Senders that emit uppercase hex digests are rejected on purpose.
    pub fn parse(value: &str) -> Result<Self, SignatureError> {
        let hex_digest = value
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(SignatureError::MalformedSignature)?;

        if hex_digest.len() != DIGEST_LEN * 2
            || !hex_digest
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(SignatureError::MalformedSignature);
        }

        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(hex_digest, &mut digest)
            .map_err(|_| SignatureError::MalformedSignature)?;

        Ok(Self { digest })
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }
}

/// Body bytes that passed signature verification.
///
/// There is no public constructor: the only way to obtain one is
/// [`verify_request`], so anything holding a `VerifiedPayload` is working with
/// authenticated bytes.
#[derive(Debug, Clone)]
pub struct VerifiedPayload {
    body: Bytes,
}

impl VerifiedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Verify `raw_body` against a signature header value.
///
/// Checks run in order: secret present, header present, header well formed,
/// digest equal. The digest comparison goes through `Mac::verify_slice`, which
/// is constant time with respect to the position of the first differing byte.
pub fn verify(
    raw_body: &[u8],
    signature_header: Option<&str>,
    secret: Option<&SharedSecret>,
) -> Result<(), SignatureError> {
    let secret = secret.ok_or(SignatureError::SecretNotConfigured)?;
    let header = signature_header.ok_or(SignatureError::MissingSignatureHeader)?;
    let provided = SignatureHeader::parse(header)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::SecretNotConfigured)?;
    mac.update(raw_body);

    mac.verify_slice(provided.digest())
        .map_err(|_| SignatureError::SignatureMismatch)
}

/// Verify a captured request, consuming it.
///
/// `header_name` is looked up case-insensitively. A header value that is not
/// visible ASCII is treated as malformed.
pub fn verify_request(
    raw: RawRequest,
    header_name: &str,
    secret: Option<&SharedSecret>,
) -> Result<VerifiedPayload, SignatureError> {
    // The secret check comes first even when the header is unreadable.
    let secret = secret.ok_or(SignatureError::SecretNotConfigured)?;

    let header = match raw.headers().get(header_name) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| SignatureError::MalformedSignature)?,
        ),
        None => None,
    };

    verify(raw.body(), header, Some(secret))?;

    Ok(VerifiedPayload {
        body: raw.into_body(),
    })
}

/// Produce the `sha256=<hex>` header value for `raw_body`.
pub fn sign(raw_body: &[u8], secret: &SharedSecret) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(raw_body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn secret() -> SharedSecret {
        SharedSecret::new("whsec_test_secret")
    }

    #[test]
    fn test_sign_then_verify() {
        let body = br#"{"action":"payment.succeeded","data":{"id":"pay_1"}}"#;
        let header = sign(body, &secret());

        assert!(header.starts_with("sha256="));
        assert_eq!(header.len(), SIGNATURE_PREFIX.len() + 64);
        assert_eq!(verify(body, Some(&header), Some(&secret())), Ok(()));
    }

    #[test]
    fn test_empty_body_verifies() {
        let header = sign(b"", &secret());
        assert_eq!(verify(b"", Some(&header), Some(&secret())), Ok(()));
    }

    #[test]
    fn test_any_body_bit_flip_fails() {
        let body = b"{\"action\":\"x\"}".to_vec();
        let header = sign(&body, &secret());

        for i in 0..body.len() {
            for bit in 0..8 {
                let mut tampered = body.clone();
                tampered[i] ^= 1 << bit;
                assert_eq!(
                    verify(&tampered, Some(&header), Some(&secret())),
                    Err(SignatureError::SignatureMismatch),
                    "byte {} bit {}",
                    i,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_any_header_bit_flip_fails() {
        let body = b"{\"action\":\"x\"}";
        let header = sign(body, &secret()).into_bytes();

        for i in 0..header.len() {
            for bit in 0..8 {
                let mut tampered = header.clone();
                tampered[i] ^= 1 << bit;
                // Non-UTF-8 values never reach `verify`; the header lookup rejects them.
                if let Ok(tampered) = String::from_utf8(tampered) {
                    assert!(
                        verify(body, Some(&tampered), Some(&secret())).is_err(),
                        "byte {} bit {}",
                        i,
                        bit
                    );
                }
            }
        }
    }

    #[test]
    fn test_wrong_secret_mismatches() {
        let body = b"payload";
        let header = sign(body, &SharedSecret::new("other"));
        assert_eq!(
            verify(body, Some(&header), Some(&secret())),
            Err(SignatureError::SignatureMismatch)
        );
    }

    #[test]
    fn test_secret_checked_first() {
        assert_eq!(
            verify(b"payload", None, None),
            Err(SignatureError::SecretNotConfigured)
        );
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            verify(b"payload", None, Some(&secret())),
            Err(SignatureError::MissingSignatureHeader)
        );
    }

    #[test]
    fn test_malformed_headers() {
        let valid_hex = "ab".repeat(32);
        let cases = [
            valid_hex.clone(),                    // no prefix
            format!("sha1={}", valid_hex),        // wrong algorithm
            format!("SHA256={}", valid_hex),      // prefix is case-sensitive
            format!("sha256={}", &valid_hex[1..]), // odd length
            format!("sha256={}", "ab".repeat(31)), // too short
            format!("sha256={}", "ab".repeat(33)), // too long
            format!("sha256={}", "zz".repeat(32)), // not hex
            format!("sha256={}", "AB".repeat(32)), // not canonical
            "sha256=".to_string(),
            String::new(),
        ];

        for case in cases {
            assert_eq!(
                SignatureHeader::parse(&case),
                Err(SignatureError::MalformedSignature),
                "{}",
                case
            );
        }
    }

    #[test]
    fn test_parse_decodes_digest() {
        let parsed = SignatureHeader::parse(&format!("sha256={}", "0f".repeat(32))).unwrap();
        assert_eq!(parsed.digest(), &[0x0f; DIGEST_LEN]);
    }

    #[test]
    fn test_verify_request_produces_payload() {
        let body = Bytes::from_static(b"{\"action\":\"ping\"}");
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Whop-Signature",
            HeaderValue::from_str(&sign(&body, &secret())).unwrap(),
        );

        let raw = RawRequest::new(headers, body.clone());
        let verified = verify_request(raw, "x-whop-signature", Some(&secret())).unwrap();
        assert_eq!(verified.as_bytes(), &body[..]);
    }

    #[test]
    fn test_verify_request_non_ascii_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-whop-signature",
            HeaderValue::from_bytes(b"sha256=\xff").unwrap(),
        );

        let raw = RawRequest::new(headers, Bytes::from_static(b"{}"));
        assert_eq!(
            verify_request(raw, "x-whop-signature", Some(&secret())).unwrap_err(),
            SignatureError::MalformedSignature
        );
    }

    #[test]
    fn test_verify_request_without_secret() {
        let raw = RawRequest::new(HeaderMap::new(), Bytes::from_static(b"{}"));
        assert_eq!(
            verify_request(raw, "x-whop-signature", None).unwrap_err(),
            SignatureError::SecretNotConfigured
        );
    }

    #[test]
    fn test_secret_debug_redacted() {
        assert_eq!(format!("{:?}", secret()), "SharedSecret(<redacted>)");
        assert!(SharedSecret::from_env_value("   ".to_string()).is_none());
        assert!(SharedSecret::from_env_value("k".to_string()).is_some());
    }
}
