//! Discounts
//!
//! Discount codes are server-owned configuration. A code maps to one of two
//! effects: a percentage off the subtotal, or free shipping.
//!
//! The engine is stateless. [`DiscountEngine::apply`] either returns a fresh
//! [`DiscountResult`] or an error and never touches anything else; keeping a
//! previously applied discount when a re-application fails is the caller's job
//! (see [`crate::checkout::CheckoutSession::apply_discount`]).

use std::fmt;

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

use crate::pricing::{PricingError, ensure_currency, zero};

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    /// The code is not configured.
    #[error("discount code {0} is not valid")]
    InvalidCode(String),

    /// A blank code was presented; clearing is a separate operation.
    #[error("no discount code given")]
    EmptyCode,

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// The subtotal is not in the store currency.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Errors raised when building a discount table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountTableError {
    /// Two codes normalize to the same key.
    #[error("discount code {0} is defined more than once")]
    DuplicateCode(String),

    /// A code is blank after trimming.
    #[error("discount codes cannot be blank")]
    BlankCode,
}

/// Effect of a discount code.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DiscountKind {
    /// Take a percentage off the subtotal (e.g., "10% off")
    PercentOff(Percentage),

    /// Zero the shipping line
    FreeShipping,
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountKind::PercentOff(percent) => {
                write!(f, "{}% off", ((*percent) * Decimal::ONE_HUNDRED).normalize())
            }
            DiscountKind::FreeShipping => f.write_str("free shipping"),
        }
    }
}

/// A configured discount code.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountCode {
    code: String,
    kind: DiscountKind,
}

impl DiscountCode {
    /// Create a discount code. The code is trimmed and upper-cased.
    pub fn new(code: &str, kind: DiscountKind) -> Self {
        Self {
            code: normalize_code(code),
            kind,
        }
    }

    /// Normalized code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Effect of the code
    pub fn kind(&self) -> DiscountKind {
        self.kind
    }
}

/// Outcome of applying a discount to a subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountResult {
    code: Option<String>,
    amount: Money<'static, Currency>,
    is_free_shipping: bool,
}

impl DiscountResult {
    /// No discount in the given currency.
    pub fn none(currency: &'static Currency) -> Self {
        Self {
            code: None,
            amount: zero(currency),
            is_free_shipping: false,
        }
    }

    /// Code that produced this result, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Amount taken off the subtotal
    pub fn amount(&self) -> Money<'static, Currency> {
        self.amount
    }

    /// Whether shipping must be zeroed
    pub fn is_free_shipping(&self) -> bool {
        self.is_free_shipping
    }
}

/// Looks up discount codes and evaluates them against a subtotal.
#[derive(Debug, Clone)]
pub struct DiscountEngine {
    codes: FxHashMap<String, DiscountCode>,
    currency: &'static Currency,
}

impl DiscountEngine {
    /// Build an engine from configured codes.
    ///
    /// # Errors
    ///
    /// - [`DiscountTableError::BlankCode`]: a code is blank.
    /// - [`DiscountTableError::DuplicateCode`]: two codes differ only by case or whitespace.
    pub fn new(
        codes: impl IntoIterator<Item = DiscountCode>,
        currency: &'static Currency,
    ) -> Result<Self, DiscountTableError> {
        let mut table = FxHashMap::default();

        for code in codes {
            if code.code.is_empty() {
                return Err(DiscountTableError::BlankCode);
            }

            if let Some(existing) = table.insert(code.code.clone(), code) {
                return Err(DiscountTableError::DuplicateCode(existing.code));
            }
        }

        Ok(Self {
            codes: table,
            currency,
        })
    }

    /// Resolve a code, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// - [`DiscountError::EmptyCode`]: the code is blank.
    /// - [`DiscountError::InvalidCode`]: the code is not configured.
    pub fn lookup(&self, code: &str) -> Result<&DiscountCode, DiscountError> {
        let key = normalize_code(code);

        if key.is_empty() {
            return Err(DiscountError::EmptyCode);
        }

        self.codes
            .get(&key)
            .ok_or(DiscountError::InvalidCode(key))
    }

    /// Apply a code to a subtotal.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is blank or unknown, or if the subtotal is in
    /// another currency.
    pub fn apply(
        &self,
        code: &str,
        subtotal: Money<'static, Currency>,
    ) -> Result<DiscountResult, DiscountError> {
        let discount = self.lookup(code)?;

        self.evaluate(discount, subtotal)
    }

    /// Evaluate an already resolved code against a subtotal.
    ///
    /// Re-evaluating the same code against the same subtotal always yields the
    /// same result, and the amount never exceeds the subtotal.
    ///
    /// # Errors
    ///
    /// Returns an error if the subtotal is in another currency or the percentage
    /// cannot be applied.
    pub fn evaluate(
        &self,
        discount: &DiscountCode,
        subtotal: Money<'static, Currency>,
    ) -> Result<DiscountResult, DiscountError> {
        ensure_currency(&subtotal, self.currency)?;

        let result = match discount.kind {
            DiscountKind::PercentOff(percent) => {
                let subtotal_minor = subtotal.to_minor_units();
                let amount =
                    percent_of_minor(&percent, subtotal_minor)?.clamp(0, subtotal_minor.max(0));

                DiscountResult {
                    code: Some(discount.code.clone()),
                    amount: Money::from_minor(amount, self.currency),
                    is_free_shipping: false,
                }
            }
            DiscountKind::FreeShipping => DiscountResult {
                code: Some(discount.code.clone()),
                amount: zero(self.currency),
                is_free_shipping: true,
            },
        };

        debug!(
            code = %discount.code,
            kind = %discount.kind,
            amount = %result.amount,
            "applied discount code"
        );

        Ok(result)
    }

    /// Reset discount state: no amount, no free shipping.
    pub fn clear(&self) -> DiscountResult {
        DiscountResult::none(self.currency)
    }

    /// Store currency
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Number of configured codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Check if no codes are configured.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// Rounds half away from zero, which is round-half-up for the non-negative
/// amounts discounts are applied to.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::{EUR, USD};
    use testresult::TestResult;

    use super::*;

    fn engine() -> TestResult<DiscountEngine> {
        Ok(DiscountEngine::new(
            [
                DiscountCode::new("SAVE10", DiscountKind::PercentOff(Percentage::from(dec!(0.10)))),
                DiscountCode::new("freeship", DiscountKind::FreeShipping),
                DiscountCode::new("ALL", DiscountKind::PercentOff(Percentage::from(dec!(1)))),
            ],
            EUR,
        )?)
    }

    #[test]
    fn apply_percent_off() -> TestResult {
        let result = engine()?.apply("SAVE10", Money::from_minor(40_00, EUR))?;

        assert_eq!(result.amount(), Money::from_minor(4_00, EUR));
        assert!(!result.is_free_shipping());
        assert_eq!(result.code(), Some("SAVE10"));

        Ok(())
    }

    #[test]
    fn apply_rounds_half_up() -> TestResult {
        // 10% of 0.05 is 0.005
        let result = engine()?.apply("SAVE10", Money::from_minor(5, EUR))?;

        assert_eq!(result.amount(), Money::from_minor(1, EUR));

        Ok(())
    }

    #[test]
    fn apply_ignores_case_and_whitespace() -> TestResult {
        let engine = engine()?;

        let result = engine.apply("  save10 ", Money::from_minor(10_00, EUR))?;
        let free = engine.apply("FreeShip", Money::from_minor(10_00, EUR))?;

        assert_eq!(result.amount(), Money::from_minor(1_00, EUR));
        assert!(free.is_free_shipping());
        assert_eq!(free.amount(), Money::from_minor(0, EUR));

        Ok(())
    }

    #[test]
    fn apply_unknown_code_fails() -> TestResult {
        let result = engine()?.apply("bogus", Money::from_minor(10_00, EUR));

        assert_eq!(result, Err(DiscountError::InvalidCode("BOGUS".into())));

        Ok(())
    }

    #[test]
    fn apply_blank_code_is_not_a_clear() -> TestResult {
        let result = engine()?.apply("   ", Money::from_minor(10_00, EUR));

        assert_eq!(result, Err(DiscountError::EmptyCode));

        Ok(())
    }

    #[test]
    fn apply_never_exceeds_subtotal() -> TestResult {
        let engine = engine()?;

        for minor in [0, 1, 99, 12_345, 1_000_000] {
            let subtotal = Money::from_minor(minor, EUR);

            let result = engine.apply("ALL", subtotal)?;

            assert!(result.amount().to_minor_units() <= minor);
        }

        Ok(())
    }

    #[test]
    fn apply_is_idempotent() -> TestResult {
        let engine = engine()?;
        let subtotal = Money::from_minor(33_33, EUR);

        assert_eq!(
            engine.apply("SAVE10", subtotal)?,
            engine.apply("SAVE10", subtotal)?
        );

        Ok(())
    }

    #[test]
    fn apply_rejects_foreign_subtotal() -> TestResult {
        let result = engine()?.apply("SAVE10", Money::from_minor(10_00, USD));

        assert!(matches!(
            result,
            Err(DiscountError::Pricing(PricingError::CurrencyMismatch { .. }))
        ));

        Ok(())
    }

    #[test]
    fn clear_resets_to_none() -> TestResult {
        let cleared = engine()?.clear();

        assert_eq!(cleared, DiscountResult::none(EUR));
        assert!(!cleared.is_free_shipping());
        assert_eq!(cleared.code(), None);

        Ok(())
    }

    #[test]
    fn new_rejects_duplicate_codes() {
        let result = DiscountEngine::new(
            [
                DiscountCode::new("FREESHIP", DiscountKind::FreeShipping),
                DiscountCode::new(" freeship", DiscountKind::FreeShipping),
            ],
            EUR,
        );

        assert_eq!(
            result.err(),
            Some(DiscountTableError::DuplicateCode("FREESHIP".into()))
        );
    }

    #[test]
    fn new_rejects_blank_codes() {
        let result = DiscountEngine::new([DiscountCode::new(" ", DiscountKind::FreeShipping)], EUR);

        assert_eq!(result.err(), Some(DiscountTableError::BlankCode));
    }

    #[test]
    fn kind_display() -> TestResult {
        let ten = DiscountKind::PercentOff(Percentage::from(dec!(0.10)));

        assert_eq!(ten.to_string(), "10% off");
        assert_eq!(DiscountKind::FreeShipping.to_string(), "free shipping");

        Ok(())
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() -> TestResult {
        // 1e20 is representable as a Decimal, but multiplying by a very large minor value should
        // overflow the Decimal range.
        let percent = Percentage::from(dec!(100000000000000000000));
        let result = percent_of_minor(&percent, i64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));

        Ok(())
    }

    #[test]
    fn percent_of_minor_calculates_correctly() -> TestResult {
        let percent = Percentage::from(dec!(0.25));
        let result = percent_of_minor(&percent, 200)?;

        assert_eq!(result, 50);

        Ok(())
    }
}
