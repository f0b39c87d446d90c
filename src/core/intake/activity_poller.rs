//! Polls the Activity API for fills by the watched wallet, normalizes them,
//! and emits each unseen one onto the ingress channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::core::domain::{
    build_dedupe_key, parse_market_window, EventKey, Side, SourcePath, TradeEvent,
};
use crate::core::store::StateStore;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ActivityPollerConfig {
    pub data_api_url: String,
    pub source_wallet: String,
    pub poll_interval: Duration,
    pub limit: u32,
    pub stream_name: String,
}

impl Default for ActivityPollerConfig {
    fn default() -> Self {
        Self {
            data_api_url: String::new(),
            source_wallet: String::new(),
            poll_interval: Duration::from_millis(700),
            limit: 200,
            stream_name: "source_activity".to_string(),
        }
    }
}

pub struct ActivityPoller<S> {
    config: ActivityPollerConfig,
    http: Client,
    state: Arc<S>,
}

impl<S: StateStore> ActivityPoller<S> {
    #[must_use]
    pub fn new(config: ActivityPollerConfig, state: Arc<S>) -> Self {
        Self {
            config,
            http: Client::new(),
            state,
        }
    }

    /// Runs until `stop` reports true. Errors within one poll cycle are
    /// logged and backed off from; they never terminate the loop.
    pub async fn run_forever(&self, sender: mpsc::Sender<TradeEvent>, mut stop: tokio::sync::watch::Receiver<bool>) {
        let mut last_checkpoint = self.state.checkpoint_get(&self.config.stream_name).await.ok().flatten();
        let mut initialized = last_checkpoint.is_some();

        loop {
            if *stop.borrow() {
                return;
            }
            match self.poll_once(&mut last_checkpoint, &mut initialized, &sender).await {
                Ok(()) => tokio::time::sleep(self.config.poll_interval).await,
                Err(err) => {
                    warn!(error = %err, "source_poller_error");
                    tokio::time::sleep(self.config.poll_interval.mul_f64(2.0).min(Duration::from_secs(5))).await;
                }
            }
        }
    }

    async fn poll_once(
        &self,
        last_checkpoint: &mut Option<String>,
        initialized: &mut bool,
        sender: &mpsc::Sender<TradeEvent>,
    ) -> Result<()> {
        let poll_cycle_start = Instant::now();
        let fetch_start = Instant::now();
        let events = self.fetch_activity().await?;
        let fetch_ms = fetch_start.elapsed().as_secs_f64() * 1000.0;

        if !*initialized {
            // On first boot, anchor at latest event and avoid replaying stale history.
            if let Some(first) = events.first() {
                let anchor = raw_event_id(first);
                if !anchor.is_empty() {
                    self.state.checkpoint_set(&self.config.stream_name, &anchor).await?;
                    *last_checkpoint = Some(anchor.clone());
                    *initialized = true;
                    info!(event_id = %anchor, "source_anchor_set");
                }
            }
            return Ok(());
        }

        let mut candidates = Vec::new();
        for raw in &events {
            let raw_id = raw_event_id(raw);
            if last_checkpoint.as_deref() == Some(raw_id.as_str()) && !raw_id.is_empty() {
                break;
            }
            candidates.push(raw);
        }

        for raw in candidates.into_iter().rev() {
            let normalize_start = Instant::now();
            let Some(event) = normalize_event(raw, &self.config.source_wallet, Utc::now()) else {
                continue;
            };
            let now = Utc::now();
            let source_exec_to_fetch_ms =
                ((now - event.executed_ts).num_milliseconds() as f64 - fetch_ms).max(0.0);
            let event = TradeEvent {
                received_ts: now,
                source_exec_to_fetch_ms: round3(source_exec_to_fetch_ms),
                source_fetch_to_emit_ms: round3(normalize_start.elapsed().as_secs_f64() * 1000.0),
                source_poll_cycle_ms: round3(poll_cycle_start.elapsed().as_secs_f64() * 1000.0),
                ..event
            };

            let key = EventKey {
                event_id: event.event_id.clone(),
                tx_hash: event.tx_hash.clone(),
                sequence: event.sequence.clone(),
                market_id: event.market_id.clone(),
                seen_at_unix: now.timestamp(),
            };
            let inserted = self.state.dedupe_mark_seen(&key).await?;
            if !inserted {
                *last_checkpoint = Some(event.event_id.clone());
                self.state.checkpoint_set(&self.config.stream_name, &event.event_id).await?;
                continue;
            }

            let event_id = event.event_id.clone();
            if let Err(err) = tokio::time::timeout(Duration::from_secs(1), sender.send(event)).await {
                warn!(event_id = %event_id, error = %err, "ingress_queue_full_dropped");
            }
            *last_checkpoint = Some(event_id.clone());
            self.state.checkpoint_set(&self.config.stream_name, &event_id).await?;
        }
        Ok(())
    }

    async fn fetch_activity(&self) -> Result<Vec<Value>> {
        let query = format!(
            "user={}&type=TRADE&limit={}",
            self.config.source_wallet, self.config.limit
        );
        let urls = [
            format!("{}/activity?{query}", self.config.data_api_url),
            format!("{}/api/activity?{query}", self.config.data_api_url),
        ];
        for url in urls {
            let attempt = self
                .http
                .get(&url)
                .timeout(Duration::from_secs(4))
                .header("Accept", "application/json")
                .send()
                .await;
            let response = match attempt {
                Ok(r) => r,
                Err(err) => {
                    warn!(%url, error = %err, "source_fetch_error");
                    continue;
                }
            };
            let Ok(payload) = response.json::<Value>().await else {
                continue;
            };
            if let Some(items) = activity_items(&payload) {
                return Ok(items);
            }
        }
        Ok(Vec::new())
    }
}

fn activity_items(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) => map.get("data").and_then(|d| d.as_array()).cloned(),
        _ => None,
    }
}

fn raw_event_id(raw: &Value) -> String {
    if let Some(id) = raw.get("id").or_else(|| raw.get("activityId")).and_then(Value::as_str) {
        if !id.is_empty() {
            return id.to_string();
        }
    }
    let tx_hash = raw.get("transactionHash").and_then(Value::as_str).unwrap_or("");
    let ts = raw.get("timestamp").map(value_to_string).unwrap_or_default();
    let asset = raw.get("asset").and_then(Value::as_str).unwrap_or("");
    let usdc = raw
        .get("usdcSize")
        .or_else(|| raw.get("amount"))
        .map(value_to_string)
        .unwrap_or_default();
    format!("{tx_hash}:{asset}:{ts}:{usdc}")
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalizes one raw Activity API record. `None` means the record lacked a
/// usable market id and must be skipped.
fn normalize_event(raw: &Value, source_wallet: &str, now: DateTime<Utc>) -> Option<TradeEvent> {
    let market_id = raw
        .get("market")
        .or_else(|| raw.get("marketId"))
        .or_else(|| raw.get("conditionId"))
        .or_else(|| raw.get("asset"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();

    let event_id = {
        let id = raw_event_id(raw);
        if id.is_empty() {
            return None;
        }
        id
    };

    let side = Side::normalize(raw.get("side").and_then(Value::as_str).unwrap_or("BUY"));
    let price = decimal_field(raw, "price");
    let shares = raw
        .get("size")
        .or_else(|| raw.get("shares"))
        .map(decimal_from_value)
        .unwrap_or_default();
    let notional_usd = raw
        .get("amount")
        .or_else(|| raw.get("usdcSize"))
        .map(decimal_from_value)
        .unwrap_or_default();
    let market_title = raw
        .get("marketTitle")
        .or_else(|| raw.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let executed_ts = parse_timestamp(raw.get("timestamp"), now);

    Some(TradeEvent {
        event_id,
        source_wallet: source_wallet.to_string(),
        market_id,
        market_slug: raw.get("slug").and_then(Value::as_str).unwrap_or("").to_string(),
        outcome: raw.get("outcome").and_then(Value::as_str).unwrap_or("").to_string(),
        side,
        price,
        shares,
        notional_usd,
        executed_ts,
        received_ts: executed_ts,
        window: parse_market_window(market_title, executed_ts),
        source_path: SourcePath::ActivityApi,
        tx_hash: raw.get("transactionHash").and_then(Value::as_str).unwrap_or("").to_string(),
        sequence: raw.get("sequence").map(value_to_string).unwrap_or_default(),
        source_exec_to_fetch_ms: 0.0,
        source_fetch_to_emit_ms: 0.0,
        source_poll_cycle_ms: 0.0,
    })
}

fn decimal_field(raw: &Value, field: &str) -> Decimal {
    raw.get(field).map(decimal_from_value).unwrap_or_default()
}

fn decimal_from_value(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap_or_default(),
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .unwrap_or_default(),
        _ => Decimal::default(),
    }
}

fn parse_timestamp(value: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
            .unwrap_or(now),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now),
        _ => now,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_minimal_record() {
        let raw = json!({
            "id": "act-1",
            "market": "m1",
            "side": "BUY",
            "price": "0.54",
            "size": "10",
            "amount": "5.40",
            "timestamp": 1_700_000_000,
        });
        let event = normalize_event(&raw, "0xabc", Utc::now()).unwrap();
        assert_eq!(event.event_id, "act-1");
        assert_eq!(event.market_id, "m1");
        assert_eq!(event.side, Side::Buy);
    }

    #[test]
    fn missing_market_id_is_skipped() {
        let raw = json!({"id": "act-1"});
        assert!(normalize_event(&raw, "0xabc", Utc::now()).is_none());
    }

    #[test]
    fn falls_back_to_composite_event_id_when_absent() {
        let raw = json!({
            "market": "m1",
            "transactionHash": "0xdead",
            "asset": "m1",
            "timestamp": 1_700_000_000,
            "usdcSize": "5.0",
        });
        let event = normalize_event(&raw, "0xabc", Utc::now()).unwrap();
        assert_eq!(event.event_id, "0xdead:m1:1700000000:5.0");
    }

    #[test]
    fn dedupe_key_is_stable_for_identical_records() {
        let raw = json!({"id": "act-1", "market": "m1"});
        let a = normalize_event(&raw, "0xabc", Utc::now()).unwrap();
        let b = normalize_event(&raw, "0xabc", Utc::now()).unwrap();
        let key_a = build_dedupe_key(&EventKey {
            event_id: a.event_id,
            ..EventKey::default()
        });
        let key_b = build_dedupe_key(&EventKey {
            event_id: b.event_id,
            ..EventKey::default()
        });
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn activity_items_unwraps_data_envelope() {
        let payload = json!({"data": [{"id": "act-1"}]});
        assert_eq!(activity_items(&payload).unwrap().len(), 1);
    }
}
