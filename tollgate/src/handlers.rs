//! Built-in event handlers.
//!
//! Each handler owns the shape of its payload: the decoder hands over an
//! untyped object and the handler deserializes the fields it needs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::dispatch::EventHandler;

/// Fields of a `payment.succeeded` payload this service cares about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentSucceeded {
    /// Payment id
    pub id: String,
    /// Amount the user paid
    pub final_amount: f64,
    /// Amount received after card fees
    #[serde(default)]
    pub amount_after_fees: Option<f64>,
    pub currency: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl PaymentSucceeded {
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(payload.clone()))
            .context("payment.succeeded payload is missing required fields")
    }
}

/// Logs successful payments.
///
/// Stand-in for crediting the paying user; replace or wrap it with the real
/// balance update. Logging is idempotent, so a replay after an interrupted
/// run is harmless.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentLogger;

#[async_trait]
impl EventHandler for PaymentLogger {
    async fn handle(&self, kind: &str, payload: &Map<String, Value>) -> Result<()> {
        let payment = PaymentSucceeded::from_payload(payload)?;

        info!(
            kind = %kind,
            payment_id = %payment.id,
            user_id = ?payment.user_id,
            final_amount = payment.final_amount,
            amount_after_fees = ?payment.amount_after_fees,
            currency = %payment.currency,
            "payment_succeeded"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_payment() {
        let payment = PaymentSucceeded::from_payload(&payload(json!({
            "id": "pay_1",
            "final_amount": 10.5,
            "amount_after_fees": 9.9,
            "currency": "usd",
            "user_id": "user_1",
            "extra": true
        })))
        .unwrap();

        assert_eq!(payment.id, "pay_1");
        assert_eq!(payment.final_amount, 10.5);
        assert_eq!(payment.amount_after_fees, Some(9.9));
        assert_eq!(payment.user_id.as_deref(), Some("user_1"));
    }

    #[test]
    fn test_parse_payment_nullable_fields() {
        let payment = PaymentSucceeded::from_payload(&payload(json!({
            "id": "pay_2",
            "final_amount": 100,
            "amount_after_fees": null,
            "currency": "eur",
            "user_id": null
        })))
        .unwrap();

        assert_eq!(payment.amount_after_fees, None);
        assert_eq!(payment.user_id, None);
    }

    #[tokio::test]
    async fn test_logger_rejects_incomplete_payload() {
        let result = PaymentLogger
            .handle("payment.succeeded", &payload(json!({"id": "pay_3"})))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_logger_accepts_payment() {
        let result = PaymentLogger
            .handle(
                "payment.succeeded",
                &payload(json!({"id": "pay_4", "final_amount": 5, "currency": "usd"})),
            )
            .await;
        assert!(result.is_ok());
    }
}
