//! Configuration module for environment variable parsing.
//!
//! Everything is read once at process start and handed to the components that
//! need it. Nothing below re-reads the environment after startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::signature::SharedSecret;

/// Header carrying the provider's `sha256=<hex>` signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-whop-signature";

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared signing secret for webhook HMAC verification.
    /// `None` keeps the server up but answers the webhook route with 503.
    pub webhook_secret: Option<SharedSecret>,

    /// Name of the header holding the webhook signature
    pub signature_header: String,

    /// Maximum accepted webhook body size in bytes
    pub max_body_bytes: usize,

    /// How long processed event ids are remembered for deduplication
    pub dedup_retention: Duration,

    /// Interval between ledger purges
    pub dedup_sweep_interval: Duration,

    /// Upper bound on waiting for in-flight handlers at shutdown
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_var("PORT", 8080),

            webhook_secret: env::var("WHOP_WEBHOOK_SECRET")
                .ok()
                .and_then(SharedSecret::from_env_value),

            signature_header: env::var("WEBHOOK_SIGNATURE_HEADER")
                .ok()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string()),

            max_body_bytes: parse_var("WEBHOOK_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),

            dedup_retention: Duration::from_secs(parse_var(
                "WEBHOOK_DEDUP_RETENTION_SECS",
                86_400,
            )),

            // A zero interval would make the sweeper's ticker panic
            dedup_sweep_interval: Duration::from_secs(
                parse_var::<u64>("WEBHOOK_DEDUP_SWEEP_SECS", 300).max(1),
            ),

            shutdown_timeout: Duration::from_secs(parse_var("SHUTDOWN_TIMEOUT_SECS", 30)),
        }
    }

    /// Whether webhook signature verification can run at all.
    pub fn is_webhook_configured(&self) -> bool {
        self.webhook_secret.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            webhook_secret: None,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            dedup_retention: Duration::from_secs(86_400),
            dedup_sweep_interval: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Parse a variable, warning and falling back to `default` on garbage.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_valid() {
        env::set_var("TOLLGATE_TEST_PORT", "9090");
        assert_eq!(parse_var::<u16>("TOLLGATE_TEST_PORT", 1), 9090);
        env::remove_var("TOLLGATE_TEST_PORT");
    }

    #[test]
    fn test_parse_var_invalid_falls_back() {
        env::set_var("TOLLGATE_TEST_LIMIT", "lots");
        assert_eq!(parse_var::<usize>("TOLLGATE_TEST_LIMIT", 42), 42);
        env::remove_var("TOLLGATE_TEST_LIMIT");
    }

    #[test]
    fn test_parse_var_default() {
        assert_eq!(parse_var::<u64>("TOLLGATE_NONEXISTENT_VAR", 7), 7);
    }

    #[test]
    fn test_default_is_not_configured() {
        let config = Config::default();
        assert!(!config.is_webhook_configured());
        assert_eq!(config.signature_header, "x-whop-signature");
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let config = Config {
            webhook_secret: SharedSecret::from_env_value("super-secret-value".to_string()),
            ..Config::default()
        };
        assert!(config.is_webhook_configured());
        assert!(!format!("{:?}", config).contains("super-secret-value"));
    }
}
