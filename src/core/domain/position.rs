//! Per-`(market, outcome)` position held by the controlled account.

use super::{Price, Volume};

/// A signed share count and its volume-weighted average entry price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub qty: Volume,
    pub avg_price: Price,
}

impl Position {
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }

    #[must_use]
    pub fn is_long(&self) -> bool {
        self.qty > Volume::ZERO
    }

    #[must_use]
    pub fn is_short(&self) -> bool {
        self.qty < Volume::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_position_is_flat() {
        assert!(Position::default().is_flat());
    }

    #[test]
    fn long_and_short_classification() {
        let long = Position {
            qty: dec!(4),
            avg_price: dec!(0.4),
        };
        let short = Position {
            qty: dec!(-4),
            avg_price: dec!(0.4),
        };
        assert!(long.is_long());
        assert!(!long.is_short());
        assert!(short.is_short());
        assert!(!short.is_long());
    }
}
