//! Watches the Polymarket CLOB websocket market channel for fills by the
//! watched wallet, reconnecting with backoff on any drop.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::core::domain::{Side, SourcePath, TradeEvent};
use crate::core::intake::reconnect::Backoff;
use crate::error::Result;

const WALLET_FIELDS: &[&str] = &[
    "owner",
    "user",
    "trader",
    "address",
    "wallet",
    "wallet_address",
    "user_address",
    "owner_address",
    "proxy_wallet",
    "maker",
    "taker",
    "maker_address",
    "taker_address",
];

#[derive(Debug, Clone)]
pub struct WsWatcherConfig {
    pub ws_url: String,
    pub data_api_url: String,
    pub source_wallet: String,
    pub ping_interval: Duration,
}

impl Default for WsWatcherConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            data_api_url: String::new(),
            source_wallet: String::new(),
            ping_interval: Duration::from_secs(20),
        }
    }
}

pub struct TradeFeedWatcher {
    config: WsWatcherConfig,
    http: Client,
}

impl TradeFeedWatcher {
    #[must_use]
    pub fn new(config: WsWatcherConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// Reconnects with exponential backoff (capped at 30s) until `stop`
    /// reports true.
    pub async fn run_forever(&self, sender: mpsc::Sender<TradeEvent>, mut stop: tokio::sync::watch::Receiver<bool>) {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        loop {
            if *stop.borrow() {
                return;
            }
            match self.connect_once(&sender, &mut stop).await {
                Ok(()) => backoff.reset(),
                Err(err) => {
                    warn!(url = %self.config.ws_url, error = %err, "ws_loop_error");
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
        }
    }

    async fn connect_once(
        &self,
        sender: &mpsc::Sender<TradeEvent>,
        stop: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<()> {
        let asset_ids = self.discover_asset_ids().await;
        info!(count = asset_ids.len(), "ws_seed_assets");

        let url = market_ws_url(&self.config.ws_url);
        let (mut stream, _) = tokio_tungstenite::connect_async(&url).await?;

        let subscribe = serde_json::json!({
            "type": "market",
            "assets_ids": asset_ids,
            "custom_feature_enabled": true,
        });
        stream.send(Message::Text(subscribe.to_string())).await?;
        info!(%url, "ws_connected");

        let wallet_lower = self.config.source_wallet.to_lowercase();
        loop {
            tokio::select! {
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return Ok(());
                    }
                }
                next = stream.next() => {
                    let Some(frame) = next else { return Ok(()) };
                    let message = frame?;
                    let Message::Text(text) = message else { continue };
                    let Ok(parsed) = serde_json::from_str::<Value>(&text) else { continue };
                    for row in extract_trade_rows(&parsed) {
                        if !wallet_matches(row, &wallet_lower) {
                            continue;
                        }
                        if let Some(event) = normalize_trade(row, &self.config.source_wallet) {
                            let _ = sender.send(event).await;
                        }
                    }
                }
            }
        }
    }

    async fn discover_asset_ids(&self) -> Vec<String> {
        let query = format!("user={}&type=TRADE&limit=400", self.config.source_wallet);
        let urls = [
            format!("{}/activity?{query}", self.config.data_api_url),
            format!("{}/api/activity?{query}", self.config.data_api_url),
        ];
        let mut seen = std::collections::BTreeSet::new();
        for url in urls {
            let Ok(response) = self.http.get(&url).timeout(Duration::from_secs(4)).send().await else {
                continue;
            };
            let Ok(payload) = response.json::<Value>().await else {
                continue;
            };
            let rows: Vec<&Value> = match &payload {
                Value::Array(items) => items.iter().collect(),
                Value::Object(map) => map
                    .get("data")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().collect())
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            for row in rows {
                let token = row
                    .get("asset")
                    .or_else(|| row.get("asset_id"))
                    .or_else(|| row.get("token_id"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if !token.is_empty() {
                    seen.insert(token);
                }
            }
            if !seen.is_empty() {
                break;
            }
        }
        seen.into_iter().collect()
    }
}

fn market_ws_url(raw_url: &str) -> String {
    let trimmed = raw_url.trim_end_matches('/');
    if trimmed.ends_with("/market") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/market")
    }
}

fn looks_like_trade(payload: &Value) -> bool {
    let Some(map) = payload.as_object() else { return false };
    let has_key = |k: &str| map.contains_key(k) || map.keys().any(|existing| existing.eq_ignore_ascii_case(k));
    has_key("price") || has_key("size") || has_key("usdcsize") || has_key("notional") || has_key("trade_id")
        || matches!(map.get("event_type").and_then(Value::as_str), Some("trade" | "fill"))
}

fn extract_trade_rows(message: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    if looks_like_trade(message) {
        out.push(message);
    }

    match message.get("data") {
        Some(data) if data.is_object() && looks_like_trade(data) => out.push(data),
        Some(data) if data.is_object() => {
            if let Some(nested) = data.get("trade").filter(|t| looks_like_trade(t)) {
                out.push(nested);
            }
        }
        Some(Value::Array(items)) => {
            out.extend(items.iter().filter(|item| looks_like_trade(item)));
        }
        _ => {}
    }

    if let Some(Value::Array(events)) = message.get("events") {
        for item in events {
            if looks_like_trade(item) {
                out.push(item);
            }
            if let Some(nested) = item.get("trade").filter(|t| looks_like_trade(t)) {
                out.push(nested);
            }
            if let Some(nested) = item.get("event").filter(|t| looks_like_trade(t)) {
                out.push(nested);
            }
        }
    }

    if let Some(trade) = message.get("trade").filter(|t| looks_like_trade(t)) {
        out.push(trade);
    }
    out
}

fn wallet_matches(payload: &Value, wallet_lower: &str) -> bool {
    let Some(map) = payload.as_object() else { return false };
    for key in WALLET_FIELDS {
        if let Some(value) = map.get(*key).and_then(Value::as_str) {
            if value.to_lowercase() == wallet_lower {
                return true;
            }
        }
    }
    for container_key in ["maker_orders", "taker_orders", "orders"] {
        let Some(Value::Array(items)) = map.get(container_key) else { continue };
        for item in items {
            let Some(item_map) = item.as_object() else { continue };
            for key in ["owner", "maker_address", "taker_address", "address", "user"] {
                if let Some(value) = item_map.get(key).and_then(Value::as_str) {
                    if value.to_lowercase() == wallet_lower {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn normalize_trade(raw: &Value, source_wallet: &str) -> Option<TradeEvent> {
    let market_id = raw
        .get("market")
        .or_else(|| raw.get("market_id"))
        .or_else(|| raw.get("condition_id"))
        .or_else(|| raw.get("asset_id"))
        .or_else(|| raw.get("token_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();

    let tx_hash = raw
        .get("transaction_hash")
        .or_else(|| raw.get("transactionHash"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let event_id = raw
        .get("id")
        .or_else(|| raw.get("trade_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let ts = raw.get("timestamp").map(plain_string).unwrap_or_default();
            let size = raw
                .get("size")
                .or_else(|| raw.get("shares"))
                .or_else(|| raw.get("usdcSize"))
                .map(plain_string)
                .unwrap_or_default();
            format!("{tx_hash}:{market_id}:{ts}:{size}")
        });
    if event_id.is_empty() {
        return None;
    }

    let price = decimal_or_default(raw.get("price"));
    let shares = decimal_or_default(raw.get("size").or_else(|| raw.get("shares")));
    let notional_usd = raw
        .get("usdcSize")
        .or_else(|| raw.get("notional"))
        .or_else(|| raw.get("amount"))
        .map(|v| decimal_or_default(Some(v)))
        .unwrap_or(shares * price);

    let side_raw = raw
        .get("side")
        .or_else(|| raw.get("direction"))
        .and_then(Value::as_str)
        .unwrap_or("BUY");
    let side = if matches!(side_raw.to_ascii_uppercase().as_str(), "BUY" | "BID") {
        Side::Buy
    } else {
        Side::Sell
    };

    let executed_ts = parse_timestamp(raw.get("timestamp"));
    let now = Utc::now();

    Some(TradeEvent {
        event_id,
        source_wallet: source_wallet.to_string(),
        market_id,
        market_slug: raw
            .get("market_slug")
            .or_else(|| raw.get("slug"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        outcome: raw.get("outcome").and_then(Value::as_str).unwrap_or("").to_string(),
        side,
        price,
        shares,
        notional_usd,
        executed_ts,
        received_ts: now,
        window: None,
        source_path: SourcePath::ClobWs,
        tx_hash,
        sequence: raw.get("sequence").map(plain_string).unwrap_or_default(),
        source_exec_to_fetch_ms: ((now - executed_ts).num_milliseconds() as f64).max(0.0),
        source_fetch_to_emit_ms: 0.0,
        source_poll_cycle_ms: 0.0,
    })
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decimal_or_default(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        Some(Value::Number(n)) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()).unwrap_or_default(),
        _ => Decimal::default(),
    }
}

fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
            .unwrap_or_else(Utc::now),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn market_ws_url_appends_market_path() {
        assert_eq!(market_ws_url("wss://ws.example.com"), "wss://ws.example.com/market");
        assert_eq!(market_ws_url("wss://ws.example.com/market"), "wss://ws.example.com/market");
    }

    #[test]
    fn wallet_matches_case_insensitively() {
        let payload = json!({"owner": "0xABC"});
        assert!(wallet_matches(&payload, "0xabc"));
    }

    #[test]
    fn wallet_matches_nested_orders() {
        let payload = json!({"maker_orders": [{"owner": "0xabc"}]});
        assert!(wallet_matches(&payload, "0xabc"));
    }

    #[test]
    fn looks_like_trade_detects_price_and_size() {
        assert!(looks_like_trade(&json!({"price": "0.5", "size": "10"})));
        assert!(!looks_like_trade(&json!({"status": "ok"})));
    }

    #[test]
    fn extract_trade_rows_walks_events_array() {
        let message = json!({"events": [{"price": "0.5", "size": "1", "owner": "0xabc"}]});
        assert_eq!(extract_trade_rows(&message).len(), 1);
    }

    #[test]
    fn normalize_trade_falls_back_to_composite_event_id() {
        let raw = json!({
            "market": "m1",
            "transaction_hash": "0xdead",
            "timestamp": 1_700_000_000,
            "size": "4",
        });
        let event = normalize_trade(&raw, "0xabc").unwrap();
        assert_eq!(event.event_id, "0xdead:m1:1700000000:4");
    }
}
