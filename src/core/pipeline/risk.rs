//! Per-window, per-market, and per-day notional caps. Counters are a
//! trade-volume budget: they never decrease, and the day counter only rolls
//! at UTC midnight.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::core::domain::RiskSnapshot;

const NO_WINDOW: &str = "na";

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub max_total_notional_per_15m_window_usd: Decimal,
    pub max_notional_per_market_usd: Decimal,
    pub max_daily_traded_volume_usd: Decimal,
}

pub struct WindowRiskTracker {
    config: RiskConfig,
    window_notional: HashMap<String, Decimal>,
    market_notional: HashMap<String, Decimal>,
    daily_notional: Decimal,
    daily_reset_date: NaiveDate,
}

impl WindowRiskTracker {
    #[must_use]
    pub fn new(config: RiskConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            window_notional: HashMap::new(),
            market_notional: HashMap::new(),
            daily_notional: Decimal::ZERO,
            daily_reset_date: now.date_naive(),
        }
    }

    /// Evaluates and, if admitted, commits `target` against the window,
    /// market, then daily caps in that order. `window_id` is `None` for
    /// intents with no parsed market window and is budgeted under a shared
    /// `"na"` key.
    pub fn check_and_apply(
        &mut self,
        market_id: &str,
        window_id: Option<&str>,
        target: Decimal,
        now: DateTime<Utc>,
    ) -> RiskSnapshot {
        self.roll_day_if_needed(now);

        let window_id = window_id.unwrap_or(NO_WINDOW);
        let window_current = *self.window_notional.get(window_id).unwrap_or(&Decimal::ZERO);
        let market_current = *self.market_notional.get(market_id).unwrap_or(&Decimal::ZERO);

        if window_current + target > self.config.max_total_notional_per_15m_window_usd {
            return self.snapshot_blocked(window_id, "window_cap_exceeded");
        }
        if market_current + target > self.config.max_notional_per_market_usd {
            return self.snapshot_blocked(window_id, "market_cap_exceeded");
        }
        if self.daily_notional + target > self.config.max_daily_traded_volume_usd {
            return self.snapshot_blocked(window_id, "daily_cap_exceeded");
        }

        *self.window_notional.entry(window_id.to_string()).or_insert(Decimal::ZERO) += target;
        self.daily_notional += target;
        *self.market_notional.entry(market_id.to_string()).or_insert(Decimal::ZERO) += target;

        RiskSnapshot {
            total_notional_today_usd: self.daily_notional,
            total_notional_current_15m_window_usd: *self
                .window_notional
                .get(window_id)
                .unwrap_or(&Decimal::ZERO),
            market_exposure_usd: self.market_notional.clone(),
            blocked: false,
            blocked_reason: String::new(),
        }
    }

    fn roll_day_if_needed(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.daily_reset_date {
            self.daily_notional = Decimal::ZERO;
            self.daily_reset_date = today;
        }
    }

    fn snapshot_blocked(&self, window_id: &str, reason: &str) -> RiskSnapshot {
        RiskSnapshot {
            total_notional_today_usd: self.daily_notional,
            total_notional_current_15m_window_usd: *self
                .window_notional
                .get(window_id)
                .unwrap_or(&Decimal::ZERO),
            market_exposure_usd: self.market_notional.clone(),
            blocked: true,
            blocked_reason: reason.to_string(),
        }
    }
}
