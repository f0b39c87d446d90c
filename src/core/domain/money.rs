//! Monetary types. All prices, sizes, notionals, and PnL are exact decimal;
//! this crate never represents money as binary floating point.

use rust_decimal::Decimal;

/// Price of one share, in USD.
pub type Price = Decimal;

/// Size of a fill or position, in shares.
pub type Volume = Decimal;

/// A USD notional amount.
pub type Usd = Decimal;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_and_volume_are_decimal() {
        let price: Price = dec!(0.54);
        let volume: Volume = dec!(10);

        assert_eq!(price * volume, dec!(5.40));
    }
}
