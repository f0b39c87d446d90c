//! Staleness/near-expiry guards and sizing rules applied to a coalesced
//! intent before it reaches the risk tracker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::domain::ExecutionIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    Fixed,
    Proportional,
    CappedProportional,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub near_expiry_cutoff_seconds: i64,
    pub max_source_staleness_ms: i64,
    pub sizing_mode: SizingMode,
    pub fixed_order_notional_usd: Decimal,
    pub size_multiplier: Decimal,
    pub min_order_notional_usd: Decimal,
    pub max_notional_per_order_usd: Decimal,
}

/// Outcome of applying policy to one coalesced intent.
pub enum DecisionResult {
    Sized(ExecutionIntent),
    Blocked { reason: &'static str },
}

pub struct IntentPolicy {
    config: PolicyConfig,
}

impl IntentPolicy {
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Applies the guards and sizing rules in spec order: near-expiry,
    /// source staleness, then sizing with a minimum-notional floor.
    #[must_use]
    pub fn apply(
        &self,
        intent: &ExecutionIntent,
        last_event_executed_ts: DateTime<Utc>,
        window_remaining_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> DecisionResult {
        if let Some(remaining) = window_remaining_seconds {
            if remaining <= self.config.near_expiry_cutoff_seconds {
                return DecisionResult::Blocked {
                    reason: "near_expiry_cutoff",
                };
            }
        }

        let staleness_ms = (now - last_event_executed_ts).num_milliseconds();
        if staleness_ms > self.config.max_source_staleness_ms {
            return DecisionResult::Blocked {
                reason: "source_stale",
            };
        }

        let sized = self.size_notional(intent.target_notional_usd);
        if sized < self.config.min_order_notional_usd {
            return DecisionResult::Blocked {
                reason: "below_min_order_notional",
            };
        }

        DecisionResult::Sized(ExecutionIntent {
            target_notional_usd: sized,
            ..intent.clone()
        })
    }

    fn size_notional(&self, source_notional: Decimal) -> Decimal {
        let sized = match self.config.sizing_mode {
            SizingMode::Fixed => self.config.fixed_order_notional_usd,
            SizingMode::Proportional => source_notional * self.config.size_multiplier,
            SizingMode::CappedProportional => {
                (source_notional * self.config.size_multiplier)
                    .min(self.config.max_notional_per_order_usd)
            }
        };
        sized.min(self.config.max_notional_per_order_usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Side;
    use rust_decimal_macros::dec;

    fn config() -> PolicyConfig {
        PolicyConfig {
            near_expiry_cutoff_seconds: 30,
            max_source_staleness_ms: 4000,
            sizing_mode: SizingMode::Fixed,
            fixed_order_notional_usd: dec!(10),
            size_multiplier: dec!(1),
            min_order_notional_usd: dec!(2),
            max_notional_per_order_usd: dec!(50),
        }
    }

    fn intent() -> ExecutionIntent {
        ExecutionIntent {
            intent_id: "m1:Up:1".into(),
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
    fn blocks_near_expiry() {
        let policy = IntentPolicy::new(config());
        let now = Utc::now();
        let result = policy.apply(&intent(), now, Some(10), now);
        assert!(matches!(
            result,
            DecisionResult::Blocked { reason: "near_expiry_cutoff" }
        ));
    }

    #[test]
    fn blocks_stale_source_event() {
        let policy = IntentPolicy::new(config());
        let now = Utc::now();
        let stale_event = now - chrono::Duration::seconds(10);
        let result = policy.apply(&intent(), stale_event, None, now);
        assert!(matches!(
            result,
            DecisionResult::Blocked { reason: "source_stale" }
        ));
    }

    #[test]
    fn fixed_sizing_uses_configured_notional() {
        let policy = IntentPolicy::new(config());
        let now = Utc::now();
        let result = policy.apply(&intent(), now, None, now);
        match result {
            DecisionResult::Sized(sized) => assert_eq!(sized.target_notional_usd, dec!(10)),
            DecisionResult::Blocked { .. } => panic!("expected sized intent"),
        }
    }

    #[test]
    fn proportional_sizing_scales_source_notional() {
        let mut cfg = config();
        cfg.sizing_mode = SizingMode::Proportional;
        cfg.size_multiplier = dec!(2);
        let policy = IntentPolicy::new(cfg);
        let now = Utc::now();
        let mut src = intent();
        src.target_notional_usd = dec!(5);
        match policy.apply(&src, now, None, now) {
            DecisionResult::Sized(sized) => assert_eq!(sized.target_notional_usd, dec!(10)),
            DecisionResult::Blocked { .. } => panic!("expected sized intent"),
        }
    }

    #[test]
    fn capped_proportional_sizing_respects_per_order_cap() {
        let mut cfg = config();
        cfg.sizing_mode = SizingMode::CappedProportional;
        cfg.size_multiplier = dec!(10);
        cfg.max_notional_per_order_usd = dec!(20);
        let policy = IntentPolicy::new(cfg);
        let now = Utc::now();
        let mut src = intent();
        src.target_notional_usd = dec!(5);
        match policy.apply(&src, now, None, now) {
            DecisionResult::Sized(sized) => assert_eq!(sized.target_notional_usd, dec!(20)),
            DecisionResult::Blocked { .. } => panic!("expected sized intent"),
        }
    }

    #[test]
    fn blocks_below_minimum_notional() {
        let mut cfg = config();
        cfg.fixed_order_notional_usd = dec!(1);
        let policy = IntentPolicy::new(cfg);
        let now = Utc::now();
        let result = policy.apply(&intent(), now, None, now);
        assert!(matches!(
            result,
            DecisionResult::Blocked { reason: "below_min_order_notional" }
        ));
    }
}
