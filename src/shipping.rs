//! Shipping

use rusty_money::{Money, iso::Currency};
use tracing::warn;

use crate::{
    countries::CountryTable,
    pricing::{PricingError, ensure_currency, zero},
};

/// Resolves the shipping cost for a destination country and subtotal.
///
/// Country lookup misses never fail: address validation is what guarantees the
/// country is real, so a miss here falls back to the default cost.
#[derive(Debug, Clone)]
pub struct ShippingCostResolver {
    countries: CountryTable,
    free_shipping_threshold: Option<Money<'static, Currency>>,
    default_cost: Money<'static, Currency>,
}

impl ShippingCostResolver {
    /// Create a new resolver.
    ///
    /// A `free_shipping_threshold` of `None` disables the threshold.
    pub fn new(
        countries: CountryTable,
        free_shipping_threshold: Option<Money<'static, Currency>>,
        default_cost: Money<'static, Currency>,
    ) -> Self {
        Self {
            countries,
            free_shipping_threshold,
            default_cost,
        }
    }

    /// Shipping cost for a country, or zero once the subtotal reaches the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::CurrencyMismatch`] if the subtotal is not in the
    /// store currency.
    pub fn resolve(
        &self,
        country_name: &str,
        subtotal: Money<'static, Currency>,
    ) -> Result<Money<'static, Currency>, PricingError> {
        let currency = self.currency();

        ensure_currency(&subtotal, currency)?;

        if self.qualifies_for_free_shipping(subtotal) {
            return Ok(zero(currency));
        }

        match self.countries.get(country_name) {
            Some(country) => Ok(country.base_shipping_cost()),
            None => {
                warn!(
                    country = country_name,
                    default_cost = %self.default_cost,
                    "no shipping cost configured for country, using default"
                );

                Ok(self.default_cost)
            }
        }
    }

    /// Whether the subtotal reaches the free-shipping threshold.
    pub fn qualifies_for_free_shipping(&self, subtotal: Money<'static, Currency>) -> bool {
        self.free_shipping_threshold
            .is_some_and(|threshold| subtotal.to_minor_units() >= threshold.to_minor_units())
    }

    /// Country table the resolver reads from
    pub fn countries(&self) -> &CountryTable {
        &self.countries
    }

    /// Free-shipping threshold, if any
    pub fn free_shipping_threshold(&self) -> Option<Money<'static, Currency>> {
        self.free_shipping_threshold
    }

    /// Cost used for countries missing from the table
    pub fn default_cost(&self) -> Money<'static, Currency> {
        self.default_cost
    }

    /// Store currency
    pub fn currency(&self) -> &'static Currency {
        self.default_cost.currency()
    }
}
