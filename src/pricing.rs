//! Pricing
//!
//! Money helpers shared by the cart, discount and total calculations. Amounts at
//! rest are [`Money`] with two fractional digits; intermediate arithmetic stays in
//! [`Decimal`] and is rounded half-up only when it is turned back into [`Money`].

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::cart::CartLine;

/// Number of fractional digits in the currency's minor unit.
pub const MINOR_UNIT_DIGITS: u32 = 2;

/// Errors that can occur while pricing an order.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// An amount is too large to be represented in minor units.
    #[error("amount {0} cannot be represented in minor units")]
    Overflow(Decimal),

    /// A money value does not use the store currency.
    #[error("amount has currency {actual}, but the store uses {expected}")]
    CurrencyMismatch {
        /// Store currency code
        expected: &'static str,
        /// Currency code of the offending amount
        actual: &'static str,
    },

    /// The computed total came out negative. This is an internal defect, never a
    /// user error.
    #[error(
        "order total is negative: subtotal {subtotal} - discount {discount} + shipping {shipping} = {total}"
    )]
    NegativeTotal {
        /// Rounded subtotal
        subtotal: Decimal,
        /// Clamped discount amount
        discount: Decimal,
        /// Shipping cost (zero when unresolved)
        shipping: Decimal,
        /// Resulting total
        total: Decimal,
    },

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Round an amount to the minor unit using round-half-up.
pub fn round_to_minor(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_DIGITS, RoundingStrategy::MidpointAwayFromZero)
}

/// Round an amount to the minor unit and wrap it as [`Money`].
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the rounded amount does not fit in `i64` minor units.
pub fn to_money(
    amount: Decimal,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, PricingError> {
    let minor = round_to_minor(amount)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|value| value.to_i64())
        .ok_or(PricingError::Overflow(amount))?;

    Ok(Money::from_minor(minor, currency))
}

/// The exact decimal value of a money amount.
pub fn to_decimal(money: &Money<'_, Currency>) -> Decimal {
    Decimal::new(money.to_minor_units(), MINOR_UNIT_DIGITS)
}

/// Zero in the given currency.
pub fn zero(currency: &'static Currency) -> Money<'static, Currency> {
    Money::from_minor(0, currency)
}

/// Check that a money value is in the expected currency.
///
/// # Errors
///
/// Returns [`PricingError::CurrencyMismatch`] when the currencies differ.
pub fn ensure_currency(
    money: &Money<'_, Currency>,
    currency: &'static Currency,
) -> Result<(), PricingError> {
    if money.currency() == currency {
        Ok(())
    } else {
        Err(PricingError::CurrencyMismatch {
            expected: currency.iso_alpha_code,
            actual: money.currency().iso_alpha_code,
        })
    }
}

/// Calculates the subtotal of a list of cart lines.
///
/// Line totals are summed at full precision and rounded once at the end.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the sum cannot be represented.
pub fn subtotal(
    lines: &[CartLine],
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, PricingError> {
    let exact = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        line.line_total()
            .and_then(|total| acc.checked_add(total))
            .ok_or(PricingError::Overflow(acc))
    })?;

    to_money(exact, currency)
}
