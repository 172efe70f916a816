//! Money helpers using rust_decimal for precision
//!
//! Prices are snapshotted into carts at currency precision (2 decimal places,
//! half away from zero). Totals are computed in `Decimal`, never in `f64`, so
//! `total == Σ price × quantity` holds exactly.

use rust_decimal::prelude::*;
use thiserror::Error;

/// Currency precision
pub const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed price per item
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Maximum allowed quantity per cart item
pub const MAX_QUANTITY: u32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    #[error("price exceeds maximum allowed ({max}), got {0}", max = MAX_PRICE)]
    PriceTooLarge(Decimal),
}

/// Round a monetary value to currency precision
pub fn to_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate and normalize a unit price before it is snapshotted into a cart
pub fn normalize_price(price: Decimal) -> Result<Decimal, MoneyError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(MoneyError::NegativePrice(price));
    }
    if price > MAX_PRICE {
        return Err(MoneyError::PriceTooLarge(price));
    }
    Ok(to_currency(price))
}

/// Line total: `price × quantity`
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price * Decimal::from(quantity)
}

/// Sum of line totals
pub fn sum_lines<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    lines
        .into_iter()
        .fold(Decimal::ZERO, |acc, (price, qty)| acc + line_total(price, qty))
}
