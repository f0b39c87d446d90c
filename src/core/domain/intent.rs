//! The coalesced, signed decision to place one order.

use chrono::{DateTime, Utc};

use super::{Side, Usd};
use crate::error::{Error, Result};

/// A single order decision, net of one coalesce bucket's source fills.
#[derive(Debug, Clone)]
pub struct ExecutionIntent {
    pub intent_id: String,
    pub market_id: String,
    pub outcome: String,
    pub side: Side,
    /// Always positive; `side` carries direction.
    pub target_notional_usd: Usd,
    pub max_slippage_bps: u32,
    pub coalesced_event_ids: Vec<String>,
    pub window_id: Option<String>,
    pub created_ts: DateTime<Utc>,
}

impl ExecutionIntent {
    /// Validates the invariants spelled out for this type: positive
    /// notional and at least one coalesced event.
    pub fn validate(&self) -> Result<()> {
        if self.target_notional_usd <= rust_decimal::Decimal::ZERO {
            return Err(Error::Domain(format!(
                "intent {} has non-positive target_notional_usd",
                self.intent_id
            )));
        }
        if self.coalesced_event_ids.is_empty() {
            return Err(Error::Domain(format!(
                "intent {} has no coalesced events",
                self.intent_id
            )));
        }
        Ok(())
    }

    /// Returns a copy with a new `target_notional_usd`, preserving every
    /// other field. Used by the sizing policy to produce a sized intent.
    #[must_use]
    pub fn resized(&self, target_notional_usd: Usd, max_slippage_bps: u32) -> Self {
        Self {
            target_notional_usd,
            max_slippage_bps,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> ExecutionIntent {
        ExecutionIntent {
            intent_id: "m1:Up:123".into(),
            market_id: "m1".into(),
            outcome: "Up".into(),
            side: Side::Buy,
            target_notional_usd: dec!(10),
            max_slippage_bps: 120,
            coalesced_event_ids: vec!["evt-1".into()],
            window_id: None,
            created_ts: Utc::now(),
        }
    }

    #[test]
    fn validate_rejects_non_positive_notional() {
        let mut intent = sample();
        intent.target_notional_usd = dec!(0);
        assert!(intent.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_coalesced_events() {
        let mut intent = sample();
        intent.coalesced_event_ids.clear();
        assert!(intent.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_intent() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn resized_preserves_other_fields() {
        let intent = sample();
        let resized = intent.resized(dec!(25), 80);
        assert_eq!(resized.target_notional_usd, dec!(25));
        assert_eq!(resized.max_slippage_bps, 80);
        assert_eq!(resized.market_id, intent.market_id);
        assert_eq!(resized.coalesced_event_ids, intent.coalesced_event_ids);
    }
}
