//! One observed fill on the watched wallet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MarketWindow, Price, Side, Usd, Volume};

/// Which producer emitted this event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourcePath {
    ActivityApi,
    ClobWs,
}

impl SourcePath {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActivityApi => "activity_api",
            Self::ClobWs => "clob_ws",
        }
    }
}

/// A normalized fill from the watched wallet, immutable after emission.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    pub event_id: String,
    pub source_wallet: String,
    pub market_id: String,
    pub market_slug: String,
    pub outcome: String,
    pub side: Side,
    pub price: Price,
    pub shares: Volume,
    pub notional_usd: Usd,
    pub executed_ts: DateTime<Utc>,
    pub received_ts: DateTime<Utc>,
    pub window: Option<MarketWindow>,
    pub source_path: SourcePath,
    pub tx_hash: String,
    pub sequence: String,
    /// Latency from the fill's on-chain execution to the producer observing it.
    pub source_exec_to_fetch_ms: f64,
    /// Latency from observing the fill to normalizing and emitting it.
    pub source_fetch_to_emit_ms: f64,
    /// Wall-clock duration of the poll cycle that produced this event.
    pub source_poll_cycle_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> TradeEvent {
        TradeEvent {
            event_id: "evt-1".into(),
            source_wallet: "0xabc".into(),
            market_id: "m1".into(),
            market_slug: "m1-slug".into(),
            outcome: "Up".into(),
            side: Side::Buy,
            price: dec!(0.54),
            shares: dec!(10),
            notional_usd: dec!(5.40),
            executed_ts: Utc::now(),
            received_ts: Utc::now(),
            window: None,
            source_path: SourcePath::ActivityApi,
            tx_hash: String::new(),
            sequence: String::new(),
            source_exec_to_fetch_ms: 0.0,
            source_fetch_to_emit_ms: 0.0,
            source_poll_cycle_ms: 0.0,
        }
    }

    #[test]
    fn source_path_as_str_matches_wire_values() {
        assert_eq!(SourcePath::ActivityApi.as_str(), "activity_api");
        assert_eq!(SourcePath::ClobWs.as_str(), "clob_ws");
    }

    #[test]
    fn trade_event_carries_side_and_notional() {
        let event = sample();
        assert_eq!(event.side, Side::Buy);
        assert_eq!(event.notional_usd, dec!(5.40));
    }
}
