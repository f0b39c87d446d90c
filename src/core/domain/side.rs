//! Trade direction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Direction of a fill or intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Signed multiplier used to net opposing fills: `BUY = +1`, `SELL = -1`.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }

    /// Parses a free-form upstream side string. Unknown strings normalize to
    /// `SELL`, matching the source feed's documented fallback.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Self::Buy,
            _ => Self::Sell,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_recognizes_buy() {
        assert_eq!(Side::normalize("buy"), Side::Buy);
        assert_eq!(Side::normalize("BUY"), Side::Buy);
        assert_eq!(Side::normalize("Buy"), Side::Buy);
    }

    #[test]
    fn normalize_falls_back_to_sell() {
        assert_eq!(Side::normalize("sell"), Side::Sell);
        assert_eq!(Side::normalize("short"), Side::Sell);
        assert_eq!(Side::normalize(""), Side::Sell);
    }

    #[test]
    fn sign_matches_direction() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
    }
}
