//! Buckets same-key trade events for a quiet period, then nets them into one
//! `ExecutionIntent`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::domain::{ExecutionIntent, Side, TradeEvent};

#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    pub coalesce_ms: i64,
    pub net_opposite_trades: bool,
    pub max_slippage_bps: u32,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            coalesce_ms: 300,
            net_opposite_trades: true,
            max_slippage_bps: 120,
        }
    }
}

struct Bucket {
    events: Vec<TradeEvent>,
    first_seen: DateTime<Utc>,
}

/// Nets same-key bursts of source fills into one `ExecutionIntent` per quiet
/// period. Bucket age is inspected on each `flush_ready` call rather than
/// scheduled via per-bucket timers; both are valid per the flush-at-or-after
/// contract.
pub struct Coalescer {
    config: CoalescerConfig,
    buckets: HashMap<String, Bucket>,
}

impl Coalescer {
    #[must_use]
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
        }
    }

    /// Places `event` into its bucket, starting the bucket's quiet timer if
    /// this is the first event for the key.
    pub fn push(&mut self, event: TradeEvent, now: DateTime<Utc>) {
        let key = coalesce_key(&event, self.config.net_opposite_trades);
        self.buckets
            .entry(key)
            .or_insert_with(|| Bucket {
                events: Vec::new(),
                first_seen: now,
            })
            .events
            .push(event);
    }

    /// Drains and nets every bucket whose quiet period has elapsed,
    /// returning one intent per bucket that didn't net to zero.
    pub fn flush_ready(&mut self, now: DateTime<Utc>) -> Vec<ExecutionIntent> {
        let coalesce_ms = self.config.coalesce_ms;
        let ready_keys: Vec<String> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| (now - bucket.first_seen).num_milliseconds() >= coalesce_ms)
            .map(|(key, _)| key.clone())
            .collect();

        let mut intents = Vec::with_capacity(ready_keys.len());
        for key in ready_keys {
            let Some(bucket) = self.buckets.remove(&key) else {
                continue;
            };
            if let Some(intent) = to_intent(
                bucket.events,
                self.config.net_opposite_trades,
                self.config.max_slippage_bps,
                now,
            ) {
                intents.push(intent);
            }
        }
        intents
    }
}

fn coalesce_key(event: &TradeEvent, net_opposite_trades: bool) -> String {
    let window_id = event
        .window
        .as_ref()
        .map_or_else(|| "na".to_string(), |w| w.window_id.clone());
    if net_opposite_trades {
        format!("{}:{}:{}", event.market_id, window_id, event.outcome)
    } else {
        format!(
            "{}:{}:{}:{}",
            event.market_id, window_id, event.outcome, event.side
        )
    }
}

fn to_intent(
    mut events: Vec<TradeEvent>,
    net_opposite_trades: bool,
    max_slippage_bps: u32,
    now: DateTime<Utc>,
) -> Option<ExecutionIntent> {
    events.sort_by_key(|e| e.executed_ts);
    let first = events.first()?;
    let market_id = first.market_id.clone();
    let outcome = first.outcome.clone();
    let window_id = first.window.as_ref().map(|w| w.window_id.clone());
    let coalesced_event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();

    let (side, target_notional_usd) = if net_opposite_trades {
        let net: Decimal = events
            .iter()
            .map(|e| Decimal::from(e.side.sign()) * e.notional_usd)
            .sum();
        if net.is_zero() {
            return None;
        }
        let side = if net > Decimal::ZERO { Side::Buy } else { Side::Sell };
        (side, net.abs())
    } else {
        let total: Decimal = events.iter().map(|e| e.notional_usd).sum();
        (first.side, total)
    };

    Some(ExecutionIntent {
        intent_id: format!("{market_id}:{outcome}:{}", now.timestamp_millis()),
        market_id,
        outcome,
        side,
        target_notional_usd,
        max_slippage_bps,
        coalesced_event_ids,
        window_id,
        created_ts: now,
    })
}
