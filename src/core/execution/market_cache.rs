//! TTL cache of per-market metadata: active/closed flags, tick size,
//! outcome-label to token-id map, settlement prices, and winning outcome.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::core::domain::Price;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct MarketMetadata {
    pub market_id: String,
    pub active: bool,
    pub closed: bool,
    pub tick_size: Decimal,
    pub token_ids: HashMap<String, String>,
    pub settle_prices: HashMap<String, Price>,
    pub winning_outcome: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MarketCacheConfig {
    pub gamma_api_url: String,
    pub ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for MarketCacheConfig {
    fn default() -> Self {
        Self {
            gamma_api_url: String::new(),
            ttl: Duration::from_secs(60),
            request_timeout: Duration::from_secs(4),
        }
    }
}

pub struct MarketMetadataCache {
    http: Client,
    config: MarketCacheConfig,
    entries: RwLock<HashMap<String, (Instant, MarketMetadata)>>,
}

impl MarketMetadataCache {
    #[must_use]
    pub fn new(config: MarketCacheConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Preloads `market_ids`, ignoring individual fetch failures so one
    /// unreachable market doesn't block warming the rest.
    pub async fn warm(&self, market_ids: &[String]) {
        for market_id in market_ids {
            if let Err(err) = self.get(market_id).await {
                debug!(market_id, error = %err, "market_cache_warm_failed");
            }
        }
    }

    /// Returns cached metadata if its TTL hasn't elapsed, else refetches.
    pub async fn get(&self, market_id: &str) -> Result<MarketMetadata> {
        if let Some((fetched_at, meta)) = self.entries.read().get(market_id).cloned() {
            if fetched_at.elapsed() < self.config.ttl {
                return Ok(meta);
            }
        }
        let meta = self.fetch(market_id).await?;
        self.entries
            .write()
            .insert(market_id.to_string(), (Instant::now(), meta.clone()));
        Ok(meta)
    }

    async fn fetch(&self, market_id: &str) -> Result<MarketMetadata> {
        for url in candidate_urls(&self.config.gamma_api_url, market_id) {
            let response = match self
                .http
                .get(&url)
                .timeout(self.config.request_timeout)
                .send()
                .await
            {
                Ok(r) => r,
                Err(_) => continue,
            };
            if !response.status().is_success() {
                continue;
            }
            let Ok(payload) = response.json::<Value>().await else {
                continue;
            };
            if let Some(item) = first_market_record(&payload) {
                return Ok(metadata_from_record(market_id, item));
            }
        }
        Err(Error::Execution(format!(
            "no candidate URL returned a market record for {market_id}"
        )))
    }
}

/// Candidate Gamma API shapes, probed in order; the first that looks like a
/// market record wins.
fn candidate_urls(base_url: &str, market_id: &str) -> Vec<String> {
    vec![
        format!("{base_url}/markets?id={market_id}"),
        format!("{base_url}/markets/{market_id}"),
        format!("{base_url}/markets?condition_id={market_id}"),
    ]
}

/// A payload "looks like a market record" if it carries any of
/// `conditionId`/`slug`/`outcomes`/`outcomePrices`, whether returned bare, as
/// the first element of a list, or nested under `data`.
fn first_market_record(payload: &Value) -> Option<&Value> {
    let candidate = match payload {
        Value::Array(items) => items.first()?,
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.first()?,
            _ => payload,
        },
        _ => return None,
    };
    let has_market_fields = ["conditionId", "slug", "outcomes", "outcomePrices"]
        .iter()
        .any(|key| candidate.get(key).is_some());
    has_market_fields.then_some(candidate)
}

fn metadata_from_record(market_id: &str, item: &Value) -> MarketMetadata {
    let outcomes = extract_outcome_labels(item);
    let prices = extract_outcome_prices(item);
    let token_ids = extract_token_ids(item, &outcomes);

    let mut settle_prices = HashMap::new();
    for (label, price) in outcomes.iter().zip(prices.iter()) {
        settle_prices.insert(label.clone(), *price);
    }

    MarketMetadata {
        market_id: market_id.to_string(),
        active: item.get("active").and_then(Value::as_bool).unwrap_or(true),
        closed: item.get("closed").and_then(Value::as_bool).unwrap_or(false),
        tick_size: item
            .get("minimumTickSize")
            .or_else(|| item.get("tickSize"))
            .and_then(json_decimal)
            .unwrap_or(Decimal::new(1, 2)),
        token_ids,
        winning_outcome: infer_winning_outcome(item, &settle_prices),
        settle_prices,
    }
}

fn extract_outcome_labels(item: &Value) -> Vec<String> {
    json_string_array(item.get("outcomes"))
}

/// `outcomePrices` is sometimes a JSON array and sometimes a JSON array
/// encoded as a string; both shapes are accepted.
fn extract_outcome_prices(item: &Value) -> Vec<Decimal> {
    json_decimal_array(item.get("outcomePrices"))
}

fn extract_token_ids(item: &Value, outcomes: &[String]) -> HashMap<String, String> {
    let ids = json_string_array(item.get("clobTokenIds"));
    outcomes
        .iter()
        .cloned()
        .zip(ids)
        .filter(|(label, id)| !label.is_empty() && !id.is_empty())
        .collect()
}

/// No explicit `winningOutcome` field: infer it from exactly one outcome
/// priced at `1.0`.
fn infer_winning_outcome(item: &Value, settle_prices: &HashMap<String, Price>) -> Option<String> {
    if let Some(explicit) = item.get("winningOutcome").and_then(Value::as_str) {
        if !explicit.is_empty() {
            return Some(explicit.to_string());
        }
    }
    let mut winners = settle_prices
        .iter()
        .filter(|(_, price)| **price == Decimal::ONE);
    let winner = winners.next()?;
    if winners.next().is_some() {
        return None;
    }
    Some(winner.0.clone())
}

fn json_string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(raw)) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn json_decimal_array(value: Option<&Value>) -> Vec<Decimal> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(json_decimal).collect(),
        Some(Value::String(raw)) => serde_json::from_str::<Vec<String>>(raw)
            .unwrap_or_default()
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    }
}
