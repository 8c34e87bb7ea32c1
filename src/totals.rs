//! Order totals
//!
//! [`OrderTotalCalculator::compute`] is the only place an order total is
//! produced. The client preview and the server's pre- and post-capture checks
//! all go through it, so the displayed and charged totals cannot drift.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::Serialize;
use tracing::error;

use crate::{
    address::NormalizedAddress,
    cart::CartLine,
    discounts::DiscountResult,
    pricing::{PricingError, ensure_currency, subtotal, to_decimal, to_money},
    shipping::ShippingCostResolver,
};

/// Shipping line of an order total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShippingCost {
    /// Shipping has been priced for a destination.
    Resolved(Money<'static, Currency>),

    /// No destination yet; shown as "calculated at checkout".
    Unresolved,
}

impl ShippingCost {
    /// The resolved cost, if any.
    pub fn amount(&self) -> Option<Money<'static, Currency>> {
        match self {
            ShippingCost::Resolved(amount) => Some(*amount),
            ShippingCost::Unresolved => None,
        }
    }

    /// Whether shipping has been priced.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ShippingCost::Resolved(_))
    }
}

/// Priced order: `total == subtotal - discount_amount + shipping`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotal {
    subtotal: Money<'static, Currency>,
    discount_amount: Money<'static, Currency>,
    shipping: ShippingCost,
    total: Money<'static, Currency>,
}

impl OrderTotal {
    /// Sum of all lines, before discount and shipping
    pub fn subtotal(&self) -> Money<'static, Currency> {
        self.subtotal
    }

    /// Discount taken off the subtotal, never more than the subtotal
    pub fn discount_amount(&self) -> Money<'static, Currency> {
        self.discount_amount
    }

    /// Shipping line
    pub fn shipping(&self) -> ShippingCost {
        self.shipping
    }

    /// Amount to charge. Excludes shipping while shipping is unresolved.
    pub fn total(&self) -> Money<'static, Currency> {
        self.total
    }

    /// Whether the total is final, i.e. shipping is resolved.
    pub fn is_final(&self) -> bool {
        self.shipping.is_resolved()
    }

    /// Currency of every amount in this total
    pub fn currency(&self) -> &'static Currency {
        self.total.currency()
    }
}

/// Serializable view of an [`OrderTotal`] with decimal amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotalSummary {
    /// Currency code
    pub currency: &'static str,
    /// Subtotal
    pub subtotal: Decimal,
    /// Discount amount
    pub discount_amount: Decimal,
    /// Shipping cost, `None` when unresolved
    pub shipping_cost: Option<Decimal>,
    /// Total
    pub total: Decimal,
}

impl From<&OrderTotal> for OrderTotalSummary {
    fn from(total: &OrderTotal) -> Self {
        Self {
            currency: total.currency().iso_alpha_code,
            subtotal: to_decimal(&total.subtotal),
            discount_amount: to_decimal(&total.discount_amount),
            shipping_cost: total.shipping.amount().as_ref().map(to_decimal),
            total: to_decimal(&total.total),
        }
    }
}

/// Composes subtotal, discount and shipping into an [`OrderTotal`].
#[derive(Debug, Clone)]
pub struct OrderTotalCalculator {
    shipping: ShippingCostResolver,
}

impl OrderTotalCalculator {
    /// Create a calculator using the given shipping resolver.
    pub fn new(shipping: ShippingCostResolver) -> Self {
        Self { shipping }
    }

    /// Shipping resolver used for destinations
    pub fn shipping(&self) -> &ShippingCostResolver {
        &self.shipping
    }

    /// Store currency
    pub fn currency(&self) -> &'static Currency {
        self.shipping.currency()
    }

    /// Compute the total for a cart, an optional validated address and an
    /// optional discount.
    ///
    /// This is a pure function of its inputs.
    ///
    /// # Errors
    ///
    /// - [`PricingError::Overflow`]: amounts cannot be represented.
    /// - [`PricingError::CurrencyMismatch`]: the discount is in another currency.
    /// - [`PricingError::NegativeTotal`]: the total came out negative, which is
    ///   an internal defect and must abort the checkout attempt.
    pub fn compute(
        &self,
        lines: &[CartLine],
        address: Option<&NormalizedAddress>,
        discount: Option<&DiscountResult>,
    ) -> Result<OrderTotal, PricingError> {
        let currency = self.currency();
        let subtotal = subtotal(lines, currency)?;

        let discount_amount = match discount {
            Some(discount) => {
                ensure_currency(&discount.amount(), currency)?;

                Money::from_minor(
                    discount
                        .amount()
                        .to_minor_units()
                        .min(subtotal.to_minor_units()),
                    currency,
                )
            }
            None => Money::from_minor(0, currency),
        };

        let shipping = if discount.is_some_and(DiscountResult::is_free_shipping) {
            ShippingCost::Resolved(Money::from_minor(0, currency))
        } else if let Some(address) = address {
            ShippingCost::Resolved(self.shipping.resolve(address.country_name(), subtotal)?)
        } else {
            ShippingCost::Unresolved
        };

        let shipping_decimal = shipping.amount().as_ref().map_or(Decimal::ZERO, to_decimal);

        let subtotal_decimal = to_decimal(&subtotal);
        let discount_decimal = to_decimal(&discount_amount);
        let total_decimal = subtotal_decimal - discount_decimal + shipping_decimal;

        if total_decimal < Decimal::ZERO {
            error!(
                subtotal = %subtotal_decimal,
                discount = %discount_decimal,
                shipping = %shipping_decimal,
                total = %total_decimal,
                "order total invariant violated"
            );

            return Err(PricingError::NegativeTotal {
                subtotal: subtotal_decimal,
                discount: discount_decimal,
                shipping: shipping_decimal,
                total: total_decimal,
            });
        }

        Ok(OrderTotal {
            subtotal,
            discount_amount,
            shipping,
            total: to_money(total_decimal, currency)?,
        })
    }
}

#[cfg(test)]
mod tests {

    use decimal_percentage::Percentage;
    use rust_decimal_macros::dec;
    use rusty_money::iso::{EUR, GBP};
    use testresult::TestResult;

    use super::*;
    use crate::{
        address::{AddressValidator, ShippingAddress},
        countries::{CountryRecord, CountryTable, PhonePlan},
        discounts::{DiscountCode, DiscountEngine, DiscountKind},
    };

    fn countries() -> TestResult<CountryTable> {
        Ok(CountryTable::new([
            CountryRecord::new(
                "Germany",
                "DE",
                Money::from_minor(5_12, EUR),
                PhonePlan::new(49, Some("0".into()), 6..=11, [], [3], "15123456789"),
            ),
            CountryRecord::new(
                "Switzerland",
                "CH",
                Money::from_minor(15_49, EUR),
                PhonePlan::new(41, Some("0".into()), 9..=9, [], [2, 3, 2], "781234567"),
            ),
        ])?)
    }

    fn calculator() -> TestResult<OrderTotalCalculator> {
        Ok(OrderTotalCalculator::new(ShippingCostResolver::new(
            countries()?,
            Some(Money::from_minor(100_00, EUR)),
            Money::from_minor(9_99, EUR),
        )))
    }

    fn engine() -> TestResult<DiscountEngine> {
        Ok(DiscountEngine::new(
            [
                DiscountCode::new("SAVE10", DiscountKind::PercentOff(Percentage::from(dec!(0.1)))),
                DiscountCode::new("FREESHIP", DiscountKind::FreeShipping),
            ],
            EUR,
        )?)
    }

    fn swiss_address() -> TestResult<NormalizedAddress> {
        let countries = countries()?;

        Ok(AddressValidator::new(&countries).validate(&ShippingAddress {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            street: "Bahnhofstrasse 1".into(),
            city: "Zürich".into(),
            postal_code: "8001".into(),
            country_name: "Switzerland".into(),
            phone: "+41 78 123 45 67".into(),
        })?)
    }

    fn lines(unit: Decimal, quantity: u32) -> TestResult<Vec<CartLine>> {
        Ok(vec![CartLine::new("tee", unit, quantity, "M", "black")?])
    }

    #[test]
    fn compute_applies_percent_discount_and_shipping() -> TestResult {
        let calculator = calculator()?;
        let lines = lines(dec!(20.00), 2)?;
        let discount = engine()?.apply("SAVE10", Money::from_minor(40_00, EUR))?;

        let total = calculator.compute(&lines, Some(&swiss_address()?), Some(&discount))?;

        assert_eq!(total.subtotal(), Money::from_minor(40_00, EUR));
        assert_eq!(total.discount_amount(), Money::from_minor(4_00, EUR));
        assert_eq!(
            total.shipping(),
            ShippingCost::Resolved(Money::from_minor(15_49, EUR))
        );
        assert_eq!(total.total(), Money::from_minor(51_49, EUR));
        assert!(total.is_final());

        Ok(())
    }

    #[test]
    fn compute_without_address_leaves_shipping_unresolved() -> TestResult {
        let total = calculator()?.compute(&lines(dec!(12.50), 2)?, None, None)?;

        assert_eq!(total.shipping(), ShippingCost::Unresolved);
        assert_eq!(total.total(), Money::from_minor(25_00, EUR));
        assert!(!total.is_final());

        Ok(())
    }

    #[test]
    fn compute_free_shipping_discount_zeroes_shipping_without_address() -> TestResult {
        let discount = engine()?.apply("FREESHIP", Money::from_minor(30_00, EUR))?;

        let total = calculator()?.compute(&lines(dec!(30.00), 1)?, None, Some(&discount))?;

        assert_eq!(
            total.shipping(),
            ShippingCost::Resolved(Money::from_minor(0, EUR))
        );
        assert_eq!(total.total(), Money::from_minor(30_00, EUR));

        Ok(())
    }

    #[test]
    fn compute_clamps_stale_discount_to_subtotal() -> TestResult {
        // discount computed against a larger cart than the one being priced
        let discount = engine()?.apply("SAVE10", Money::from_minor(500_00, EUR))?;

        let total = calculator()?.compute(&lines(dec!(10.00), 1)?, None, Some(&discount))?;

        assert_eq!(total.discount_amount(), Money::from_minor(10_00, EUR));
        assert_eq!(total.total(), Money::from_minor(0, EUR));

        Ok(())
    }

    #[test]
    fn compute_empty_cart_is_zero() -> TestResult {
        let total = calculator()?.compute(&[], None, None)?;

        assert_eq!(total.total(), Money::from_minor(0, EUR));

        Ok(())
    }

    #[test]
    fn compute_is_deterministic() -> TestResult {
        let calculator = calculator()?;
        let lines = lines(dec!(19.99), 3)?;
        let address = swiss_address()?;

        let first = calculator.compute(&lines, Some(&address), None)?;
        let second = calculator.compute(&lines, Some(&address), None)?;

        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn compute_rejects_discount_in_other_currency() -> TestResult {
        let engine = DiscountEngine::new(
            [DiscountCode::new("FREESHIP", DiscountKind::FreeShipping)],
            GBP,
        )?;
        let discount = engine.apply("FREESHIP", Money::from_minor(10_00, GBP))?;

        let result = calculator()?.compute(&lines(dec!(10.00), 1)?, None, Some(&discount));

        assert!(matches!(result, Err(PricingError::CurrencyMismatch { .. })));

        Ok(())
    }

    #[test]
    fn summary_uses_decimals() -> TestResult {
        let total = calculator()?.compute(&lines(dec!(12.50), 2)?, None, None)?;
        let summary = OrderTotalSummary::from(&total);

        assert_eq!(summary.currency, "EUR");
        assert_eq!(summary.total, dec!(25.00));
        assert_eq!(summary.shipping_cost, None);

        Ok(())
    }
}
