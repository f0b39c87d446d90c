//! Position book, mark table, and realized/unrealized PnL accounting.

use std::collections::HashMap;

use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;

use crate::core::domain::{Position, Price, Side, Usd, Volume};

/// A full PnL snapshot: trading and settlement realizations, unrealized
/// mark-to-market, accrued fees, and the net of all four.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PnLSnapshot {
    pub realized_trading_usd: Usd,
    pub realized_settled_usd: Usd,
    pub unrealized_usd: Usd,
    pub fees_usd: Usd,
    pub net_usd: Usd,
}

/// Tracks positions and PnL per `(market_id, outcome)`.
#[derive(Debug, Default)]
pub struct PnLTracker {
    fee_bps: Decimal,
    positions: HashMap<(String, String), Position>,
    marks: HashMap<(String, String), Price>,
    realized_trading_usd: Usd,
    realized_settled_usd: Usd,
    fees_usd: Usd,
}

impl PnLTracker {
    #[must_use]
    pub fn new(fee_bps: Decimal) -> Self {
        Self {
            fee_bps,
            ..Self::default()
        }
    }

    /// Applies one fill to the position for `(market_id, outcome)`, updating
    /// the weighted-average entry price, realizing trading PnL on any
    /// reducing leg, and accruing the fee.
    pub fn apply_fill(&mut self, market_id: &str, outcome: &str, side: Side, price: Price, qty: Volume) {
        self.fees_usd += (qty * price).abs() * self.fee_bps / Decimal::from(10_000);

        let key = (market_id.to_string(), outcome.to_string());
        let position = self.positions.entry(key).or_default();
        let signed_qty = qty * Decimal::from(side.sign());
        apply_signed_fill(position, signed_qty, price, &mut self.realized_trading_usd);
    }

    /// Records the latest observed price for `(market_id, outcome)`.
    pub fn set_mark(&mut self, market_id: &str, outcome: &str, price: Price) {
        self.marks
            .insert((market_id.to_string(), outcome.to_string()), price);
    }

    /// Resolves every open position in `market_id`. For each outcome, the
    /// settlement price is the explicit override if given, else `1` for the
    /// winning outcome, else `0`. Returns the count of positions settled.
    pub fn settle_market(
        &mut self,
        market_id: &str,
        winning_outcome: Option<&str>,
        outcome_settle_prices: &HashMap<String, Price>,
    ) -> usize {
        let keys: Vec<(String, String)> = self
            .positions
            .keys()
            .filter(|(m, _)| m == market_id)
            .cloned()
            .collect();

        let mut settled = 0;
        for key in keys {
            let position = match self.positions.get_mut(&key) {
                Some(p) if !p.is_flat() => p,
                _ => continue,
            };
            let outcome = &key.1;
            let settle_px = outcome_settle_prices.get(outcome).copied().unwrap_or_else(|| {
                if winning_outcome == Some(outcome.as_str()) {
                    Decimal::ONE
                } else {
                    Decimal::ZERO
                }
            });
            self.realized_settled_usd += (settle_px - position.avg_price) * position.qty;
            position.qty = Decimal::ZERO;
            position.avg_price = Decimal::ZERO;
            self.marks.insert(key, settle_px);
            settled += 1;
        }
        settled
    }

    #[must_use]
    pub fn position(&self, market_id: &str, outcome: &str) -> Position {
        self.positions
            .get(&(market_id.to_string(), outcome.to_string()))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> PnLSnapshot {
        let unrealized_usd: Usd = self
            .positions
            .iter()
            .map(|(key, position)| {
                let mark = self.marks.get(key).copied().unwrap_or(position.avg_price);
                (mark - position.avg_price) * position.qty
            })
            .sum();

        let net_usd = self.realized_trading_usd + self.realized_settled_usd + unrealized_usd
            - self.fees_usd;

        PnLSnapshot {
            realized_trading_usd: self.realized_trading_usd,
            realized_settled_usd: self.realized_settled_usd,
            unrealized_usd,
            fees_usd: self.fees_usd,
            net_usd,
        }
    }
}

/// BUY is the mirror image of SELL: both widen a same-direction position by
/// weighted-averaging price, and realize PnL only on the leg that reduces or
/// flips an existing position.
fn apply_signed_fill(position: &mut Position, signed_qty: Decimal, price: Price, realized: &mut Usd) {
    if position.qty.is_zero() || position.qty.signum() == signed_qty.signum() {
        let new_qty = position.qty + signed_qty;
        if new_qty.is_zero() {
            position.qty = Decimal::ZERO;
            position.avg_price = Decimal::ZERO;
        } else {
            position.avg_price =
                (position.avg_price * position.qty.abs() + price * signed_qty.abs()) / new_qty.abs();
            position.qty = new_qty;
        }
        return;
    }

    // Reducing or flipping fill: realize PnL on the closed portion.
    let closing_qty = signed_qty.abs().min(position.qty.abs());
    let direction = position.qty.signum();
    *realized += (price - position.avg_price) * closing_qty * direction;

    let remaining = position.qty + signed_qty;
    if remaining.signum() != position.qty.signum() && !remaining.is_zero() {
        // Flipped through flat: open a fresh position at the fill price.
        position.qty = remaining;
        position.avg_price = price;
    } else {
        position.qty = remaining;
        if position.qty.is_zero() {
            position.avg_price = Decimal::ZERO;
        }
    }
}
