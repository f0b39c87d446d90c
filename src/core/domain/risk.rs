//! Outcome of a pre-trade risk check.

use std::collections::HashMap;

use super::Usd;

/// A point-in-time view of the risk tracker's counters, produced per intent.
/// When not blocked, values reflect state *after* admission.
#[derive(Debug, Clone, Default)]
pub struct RiskSnapshot {
    pub total_notional_today_usd: Usd,
    pub total_notional_current_15m_window_usd: Usd,
    pub market_exposure_usd: HashMap<String, Usd>,
    pub blocked: bool,
    pub blocked_reason: String,
}

impl RiskSnapshot {
    #[must_use]
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            blocked_reason: reason.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_sets_flag_and_reason() {
        let snapshot = RiskSnapshot::blocked("window_cap_exceeded");
        assert!(snapshot.blocked);
        assert_eq!(snapshot.blocked_reason, "window_cap_exceeded");
    }

    #[test]
    fn default_is_unblocked() {
        let snapshot = RiskSnapshot::default();
        assert!(!snapshot.blocked);
        assert!(snapshot.blocked_reason.is_empty());
    }
}
