//! Submits marketable-limit orders, with a deterministic client order id and
//! bounded retry on the direct-POST fallback path.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::core::domain::{ExecutionIntent, OrderSubmission, Price, SubmissionStatus, Volume};
use crate::error::Result;

/// Credentials and endpoint for the controlled account's CLOB.
#[derive(Debug, Clone)]
pub struct PolymarketCredentials {
    pub clob_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
}

#[derive(Debug, Clone)]
pub struct OrderClientConfig {
    pub dry_run: bool,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Default for OrderClientConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_retries: 3,
            request_timeout: Duration::from_secs(3),
        }
    }
}

#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn submit_marketable_limit(
        &self,
        intent: &ExecutionIntent,
        price: Price,
        size: Volume,
    ) -> Result<OrderSubmission>;
}

/// Direct-HTTP order client against Polymarket's CLOB. Always takes the
/// direct-POST path: there is no SDK adapter in this deployment, only the
/// fallback strategy from the order client design.
pub struct ClobOrderClient {
    http: Client,
    credentials: PolymarketCredentials,
    config: OrderClientConfig,
}

impl ClobOrderClient {
    #[must_use]
    pub fn new(credentials: PolymarketCredentials, config: OrderClientConfig) -> Self {
        Self {
            http: Client::new(),
            credentials,
            config,
        }
    }

    async fn post_with_retry(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        client_order_id: &str,
    ) -> OrderSubmission {
        for attempt in 1..=self.config.max_retries {
            let sent = self
                .http
                .post(endpoint)
                .timeout(self.config.request_timeout)
                .header("POLY_API_KEY", &self.credentials.api_key)
                .header("POLY_API_SECRET", &self.credentials.api_secret)
                .header("POLY_PASSPHRASE", &self.credentials.api_passphrase)
                .json(payload)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    let response_body = response.json().await.unwrap_or(serde_json::Value::Null);
                    return OrderSubmission {
                        client_order_id: client_order_id.to_string(),
                        endpoint: endpoint.to_string(),
                        payload: payload.clone(),
                        accepted: true,
                        status: SubmissionStatus::Acknowledged,
                        response: response_body,
                        error: String::new(),
                        error_code: String::new(),
                    };
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = format!("http {status}: {body}");
                    warn!(client_order_id, attempt, %error, "order_submit_retry");
                    if attempt == self.config.max_retries {
                        return rejected(endpoint, payload, client_order_id, &error);
                    }
                }
                Err(err) => {
                    warn!(client_order_id, attempt, error = %err, "order_submit_retry");
                    if attempt == self.config.max_retries {
                        return rejected(endpoint, payload, client_order_id, &err.to_string());
                    }
                }
            }
            tokio::time::sleep(Duration::from_secs_f64(0.1 * f64::from(attempt))).await;
        }
        rejected(endpoint, payload, client_order_id, "unreachable")
    }
}

#[async_trait]
impl OrderClient for ClobOrderClient {
    async fn submit_marketable_limit(
        &self,
        intent: &ExecutionIntent,
        price: Price,
        size: Volume,
    ) -> Result<OrderSubmission> {
        let client_order_id = deterministic_client_order_id(intent);
        let payload = serde_json::json!({
            "client_order_id": client_order_id,
            "market_id": intent.market_id,
            "outcome": intent.outcome,
            "side": intent.side.to_string(),
            "price": price.to_string(),
            "size": size.to_string(),
            "order_type": "marketable_limit",
            "max_slippage_bps": intent.max_slippage_bps,
        });
        let endpoint = format!("{}/order", self.credentials.clob_url);

        if self.config.dry_run {
            return Ok(OrderSubmission {
                client_order_id,
                endpoint,
                payload,
                accepted: true,
                status: SubmissionStatus::DryRunAcknowledged,
                response: serde_json::json!({"dry_run": true}),
                error: String::new(),
                error_code: String::new(),
            });
        }

        Ok(self.post_with_retry(&endpoint, &payload, &client_order_id).await)
    }
}

fn rejected(
    endpoint: &str,
    payload: &serde_json::Value,
    client_order_id: &str,
    error: &str,
) -> OrderSubmission {
    OrderSubmission {
        client_order_id: client_order_id.to_string(),
        endpoint: endpoint.to_string(),
        payload: payload.clone(),
        accepted: false,
        status: SubmissionStatus::Rejected,
        response: serde_json::Value::Null,
        error: error.to_string(),
        error_code: classify_error_code(error),
    }
}

/// Identical intents (same market/outcome/side/window/coalesced events/size)
/// must hash to the same id so a retried submission is idempotent at the
/// provider.
#[must_use]
pub fn deterministic_client_order_id(intent: &ExecutionIntent) -> String {
    let digest_input = format!(
        "{}|{}|{}|{}|{}|{}",
        intent.market_id,
        intent.outcome,
        intent.side,
        intent.window_id.as_deref().unwrap_or("na"),
        intent.coalesced_event_ids.join(","),
        intent.target_notional_usd,
    );
    let digest = Sha256::digest(digest_input.as_bytes());
    format!("cb-{}", &hex::encode(digest)[..24])
}

/// Below-minimum-size rejects are expected noise, not a provider fault; they
/// are excluded from reject-rate accounting so they cannot trip the auto
/// kill switch.
#[must_use]
pub fn classify_error_code(error: &str) -> String {
    if error.contains("size") && error.contains("lower than the minimum") {
        "min_size".to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn intent() -> ExecutionIntent {
        ExecutionIntent {
            intent_id: "m1:Up:1".into(),
            market_id: "m1".into(),
            outcome: "Up".into(),
            side: Side::Buy,
            target_notional_usd: dec!(10),
            max_slippage_bps: 120,
            coalesced_event_ids: vec!["evt-1".into(), "evt-2".into()],
            window_id: Some("eth:20260101T0900".into()),
            created_ts: Utc::now(),
        }
    }

    #[test]
    fn identical_intents_hash_to_the_same_client_order_id() {
        assert_eq!(
            deterministic_client_order_id(&intent()),
            deterministic_client_order_id(&intent())
        );
    }

    #[test]
    fn differing_intents_hash_to_different_ids() {
        let mut other = intent();
        other.target_notional_usd = dec!(11);
        assert_ne!(
            deterministic_client_order_id(&intent()),
            deterministic_client_order_id(&other)
        );
    }

    #[test]
    fn client_order_id_has_expected_shape() {
        let id = deterministic_client_order_id(&intent());
        assert!(id.starts_with("cb-"));
        assert_eq!(id.len(), 27);
    }

    #[test]
    fn reject_classification_detects_min_size() {
        let error = "order X is invalid. Size (3.98) lower than the minimum: 5";
        assert_eq!(classify_error_code(error), "min_size");
    }

    #[test]
    fn reject_classification_ignores_unrelated_errors() {
        assert_eq!(classify_error_code("connection reset"), "");
    }

    #[tokio::test]
    async fn dry_run_acknowledges_without_network_io() {
        let client = ClobOrderClient::new(
            PolymarketCredentials {
                clob_url: "https://clob.invalid".into(),
                api_key: String::new(),
                api_secret: String::new(),
                api_passphrase: String::new(),
            },
            OrderClientConfig {
                dry_run: true,
                ..OrderClientConfig::default()
            },
        );
        let submission = client
            .submit_marketable_limit(&intent(), dec!(0.55), dec!(10))
            .await
            .unwrap();
        assert!(submission.accepted);
        assert_eq!(submission.status, crate::core::domain::SubmissionStatus::DryRunAcknowledged);
    }
}
