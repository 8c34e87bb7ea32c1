//! Store
//!
//! The store bundles the static reference data loaded at start-up and exposes
//! the pipeline's call points in the order a checkout controller uses them.

use rusty_money::{Money, iso::Currency};

use crate::{
    address::{AddressValidator, FieldErrors, NormalizedAddress, ShippingAddress},
    cart::CartLine,
    countries::CountryTable,
    discounts::{DiscountCode, DiscountEngine, DiscountError, DiscountResult},
    payments::{ReconcileError, reconcile},
    pricing::PricingError,
    shipping::ShippingCostResolver,
    totals::{OrderTotal, OrderTotalCalculator},
};

/// Immutable pricing and validation configuration for one storefront.
#[derive(Debug, Clone)]
pub struct Store {
    calculator: OrderTotalCalculator,
    discounts: DiscountEngine,
}

impl Store {
    /// Create a store from its parts.
    ///
    /// The discount engine and the default shipping cost must share a currency;
    /// [`crate::config::StoreConfig`] guarantees this for loaded stores.
    pub fn new(
        countries: CountryTable,
        discounts: DiscountEngine,
        free_shipping_threshold: Option<Money<'static, Currency>>,
        default_shipping_cost: Money<'static, Currency>,
    ) -> Self {
        let resolver =
            ShippingCostResolver::new(countries, free_shipping_threshold, default_shipping_cost);

        Self {
            calculator: OrderTotalCalculator::new(resolver),
            discounts,
        }
    }

    /// Store currency
    pub fn currency(&self) -> &'static Currency {
        self.calculator.currency()
    }

    /// Countries the store ships to
    pub fn countries(&self) -> &CountryTable {
        self.calculator.shipping().countries()
    }

    /// Shipping cost resolver
    pub fn shipping(&self) -> &ShippingCostResolver {
        self.calculator.shipping()
    }

    /// Discount engine
    pub fn discounts(&self) -> &DiscountEngine {
        &self.discounts
    }

    /// Validate and normalize a shipping address.
    ///
    /// # Errors
    ///
    /// Returns every field problem found; see [`AddressValidator::validate`].
    pub fn validate_address(
        &self,
        address: &ShippingAddress,
    ) -> Result<NormalizedAddress, FieldErrors> {
        AddressValidator::new(self.countries()).validate(address)
    }

    /// Resolve a discount code.
    ///
    /// # Errors
    ///
    /// See [`DiscountEngine::lookup`].
    pub fn lookup_discount(&self, code: &str) -> Result<&DiscountCode, DiscountError> {
        self.discounts.lookup(code)
    }

    /// Apply a discount code to a subtotal.
    ///
    /// # Errors
    ///
    /// See [`DiscountEngine::apply`].
    pub fn apply_discount(
        &self,
        code: &str,
        subtotal: Money<'static, Currency>,
    ) -> Result<DiscountResult, DiscountError> {
        self.discounts.apply(code, subtotal)
    }

    /// Discount state with no code applied.
    pub fn clear_discount(&self) -> DiscountResult {
        self.discounts.clear()
    }

    /// Compute an order total.
    ///
    /// # Errors
    ///
    /// See [`OrderTotalCalculator::compute`].
    pub fn compute_order_total(
        &self,
        lines: &[CartLine],
        address: Option<&NormalizedAddress>,
        discount: Option<&DiscountResult>,
    ) -> Result<OrderTotal, PricingError> {
        self.calculator.compute(lines, address, discount)
    }

    /// Check a captured amount against an expected total.
    ///
    /// # Errors
    ///
    /// See [`reconcile`].
    pub fn reconcile_payment(
        &self,
        expected: &OrderTotal,
        captured: Money<'static, Currency>,
    ) -> Result<(), ReconcileError> {
        reconcile(expected, captured)
    }
}
