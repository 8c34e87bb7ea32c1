//! Checkout
//!
//! A [`CheckoutSession`] owns the inputs of one customer's checkout (cart,
//! shipping address, discount code) and drives the store's call points in
//! order:
//!
//! ```text
//! Editing -> Quoted -> CapturePending -> Reconciled -> Finalized
//!                                     \-> MismatchRejected
//!                                     \-> CaptureFailed
//! ```
//!
//! Every edit recomputes the quote. A failed attempt keeps every input, and
//! the next edit or attempt starts again from `Editing`.

use std::sync::Arc;

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::{Span, debug, info, warn};

use crate::{
    address::{FieldErrors, NormalizedAddress, ShippingAddress},
    cart::{Cart, CartError, CartLine, LineKey},
    discounts::{DiscountCode, DiscountError},
    payments::{CaptureError, PaymentCapture, ReconcileError},
    pricing::{PricingError, subtotal},
    receipt::OrderReceipt,
    store::Store,
    totals::OrderTotal,
};

/// Errors raised while editing or placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The shipping address is invalid.
    #[error(transparent)]
    Validation(#[from] FieldErrors),

    /// The discount code could not be applied.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// The cart edit was rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The order could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The payment processor did not capture the payment.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The captured payment did not match the order.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The order has nothing in it.
    #[error("cart is empty")]
    EmptyCart,

    /// Shipping could not be priced for the order.
    #[error("shipping has not been resolved for this order")]
    ShippingUnresolved,

    /// The order has already been placed.
    #[error("order has already been placed")]
    AlreadyFinalized,
}

impl CheckoutError {
    /// Whether the customer can fix the problem and try again.
    ///
    /// Pricing defects and reconciliation failures are not correctable by the
    /// customer and must be investigated.
    pub fn is_user_correctable(&self) -> bool {
        match self {
            CheckoutError::Validation(_)
            | CheckoutError::Cart(_)
            | CheckoutError::Capture(_)
            | CheckoutError::EmptyCart
            | CheckoutError::ShippingUnresolved => true,
            CheckoutError::Discount(error) => {
                matches!(error, DiscountError::InvalidCode(_) | DiscountError::EmptyCode)
            }
            CheckoutError::Pricing(_)
            | CheckoutError::Reconcile(_)
            | CheckoutError::AlreadyFinalized => false,
        }
    }
}

/// Where a checkout session is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    /// Inputs changed and no quote has been produced yet.
    Editing,

    /// The current inputs were priced.
    Quoted(OrderTotal),

    /// The server-computed total was sent for capture.
    CapturePending(OrderTotal),

    /// The captured amount matched the recomputed total.
    Reconciled(OrderTotal),

    /// The order was placed.
    Finalized(OrderReceipt),

    /// The processor captured a different amount or currency than the order
    /// total.
    MismatchRejected {
        /// Server-computed total
        expected: Money<'static, Currency>,
        /// Amount the processor reported
        got: Money<'static, Currency>,
    },

    /// The processor failed to capture the payment.
    CaptureFailed(CaptureError),
}

impl CheckoutState {
    /// Whether the session has been finalized.
    pub fn is_finalized(&self) -> bool {
        matches!(self, CheckoutState::Finalized(_))
    }
}

/// One customer's checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    store: Arc<Store>,
    cart: Cart,
    address: Option<ShippingAddress>,
    normalized: Option<NormalizedAddress>,
    discount: Option<DiscountCode>,
    state: CheckoutState,
}

impl CheckoutSession {
    /// Start a session with an empty cart.
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_cart(store, Cart::new())
    }

    /// Start a session with an existing cart.
    pub fn with_cart(store: Arc<Store>, cart: Cart) -> Self {
        Self {
            store,
            cart,
            address: None,
            normalized: None,
            discount: None,
            state: CheckoutState::Editing,
        }
    }

    /// Store the session prices against
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Cart
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Shipping address as last entered
    pub fn address(&self) -> Option<&ShippingAddress> {
        self.address.as_ref()
    }

    /// Shipping address as last validated, if it was valid
    pub fn normalized_address(&self) -> Option<&NormalizedAddress> {
        self.normalized.as_ref()
    }

    /// Applied discount code
    pub fn discount(&self) -> Option<&DiscountCode> {
        self.discount.as_ref()
    }

    /// Current state
    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Add a line to the cart and requote.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart rejects the line or the order cannot be
    /// priced.
    pub fn add_line(&mut self, line: CartLine) -> Result<OrderTotal, CheckoutError> {
        self.ensure_editable()?;
        self.cart.add_line(line)?;

        self.requote()
    }

    /// Remove a line from the cart and requote.
    ///
    /// # Errors
    ///
    /// Returns an error if no line has that key or the order cannot be priced.
    pub fn remove_line(&mut self, key: &LineKey) -> Result<OrderTotal, CheckoutError> {
        self.ensure_editable()?;
        self.cart.remove_line(key)?;

        self.requote()
    }

    /// Change a line's quantity and requote.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is zero, no line has that key, or the
    /// order cannot be priced.
    pub fn update_quantity(
        &mut self,
        key: &LineKey,
        quantity: u32,
    ) -> Result<OrderTotal, CheckoutError> {
        self.ensure_editable()?;
        self.cart.update_quantity(key, quantity)?;

        self.requote()
    }

    /// Set the shipping address and requote.
    ///
    /// The address is kept even when it is invalid so the customer can correct
    /// it; until it validates, shipping stays unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] with every field problem found.
    pub fn set_address(&mut self, address: ShippingAddress) -> Result<OrderTotal, CheckoutError> {
        self.ensure_editable()?;

        let validated = self.store.validate_address(&address);

        self.address = Some(address);

        match validated {
            Ok(normalized) => {
                self.normalized = Some(normalized);

                self.requote()
            }
            Err(errors) => {
                self.normalized = None;
                self.requote()?;

                Err(errors.into())
            }
        }
    }

    /// Apply a discount code and requote.
    ///
    /// A rejected code leaves the previously applied code, the cart and the
    /// address untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Discount`] if the code is blank or unknown.
    pub fn apply_discount(&mut self, code: &str) -> Result<OrderTotal, CheckoutError> {
        self.ensure_editable()?;

        let discount = self.store.lookup_discount(code)?.clone();

        self.discount = Some(discount);

        self.requote()
    }

    /// Remove the discount code and requote.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be priced.
    pub fn clear_discount(&mut self) -> Result<OrderTotal, CheckoutError> {
        self.ensure_editable()?;

        self.discount = None;

        self.requote()
    }

    /// Price the current inputs.
    ///
    /// Shipping is unresolved until a valid address is set, unless a
    /// free-shipping code is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the order cannot be priced.
    pub fn quote(&self) -> Result<OrderTotal, CheckoutError> {
        self.compute(self.normalized.as_ref())
    }

    /// Place the order.
    ///
    /// The address is revalidated and the total recomputed from the session's
    /// own inputs before capture. After capture the total is recomputed again
    /// and the captured amount must match it exactly. Any failure leaves every
    /// input in place.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::AlreadyFinalized`]: the order was already placed.
    /// - [`CheckoutError::EmptyCart`]: there is nothing to order.
    /// - [`CheckoutError::Validation`]: the address is missing or invalid.
    /// - [`CheckoutError::Capture`]: the processor did not capture the payment.
    /// - [`CheckoutError::Reconcile`]: the captured amount does not match.
    #[tracing::instrument(
        name = "checkout.session.place_order",
        skip(self, payments),
        fields(
            lines = self.cart.len(),
            total = tracing::field::Empty,
            transaction_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn place_order(
        &mut self,
        payments: &dyn PaymentCapture,
    ) -> Result<OrderReceipt, CheckoutError> {
        self.ensure_editable()?;

        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let entered = self.address.clone().unwrap_or_default();

        let address = match self.store.validate_address(&entered) {
            Ok(address) => address,
            Err(errors) => {
                self.normalized = None;
                self.state = CheckoutState::Editing;

                return Err(errors.into());
            }
        };

        let expected = self.compute(Some(&address))?;

        if !expected.is_final() {
            return Err(CheckoutError::ShippingUnresolved);
        }

        Span::current().record("total", tracing::field::display(expected.total()));

        self.normalized = Some(address.clone());
        self.state = CheckoutState::CapturePending(expected);

        let capture = match payments.capture(expected.total()).await {
            Ok(capture) => capture,
            Err(error) => {
                warn!(%error, "payment capture failed");

                self.state = CheckoutState::CaptureFailed(error.clone());

                return Err(error.into());
            }
        };

        Span::current().record("transaction_id", capture.transaction_id.as_str());

        let recomputed = self.compute(Some(&address))?;

        if let Err(error) = self.store.reconcile_payment(&recomputed, capture.captured_amount) {
            self.state = CheckoutState::MismatchRejected {
                expected: recomputed.total(),
                got: capture.captured_amount,
            };

            return Err(error.into());
        }

        self.state = CheckoutState::Reconciled(recomputed);

        let receipt = OrderReceipt::new(
            capture.transaction_id,
            address,
            self.cart.lines().to_vec(),
            self.discount.as_ref().map(|code| code.code().to_string()),
            recomputed,
        );

        info!(total = %recomputed.total(), "order finalized");

        self.state = CheckoutState::Finalized(receipt.clone());

        Ok(receipt)
    }

    fn ensure_editable(&self) -> Result<(), CheckoutError> {
        if self.state.is_finalized() {
            return Err(CheckoutError::AlreadyFinalized);
        }

        Ok(())
    }

    fn requote(&mut self) -> Result<OrderTotal, CheckoutError> {
        self.state = CheckoutState::Editing;

        let total = self.quote()?;

        debug!(
            total = %total.total(),
            is_final = total.is_final(),
            "checkout requoted"
        );

        self.state = CheckoutState::Quoted(total);

        Ok(total)
    }

    fn compute(&self, address: Option<&NormalizedAddress>) -> Result<OrderTotal, CheckoutError> {
        let lines = self.cart.lines();

        let discount = match &self.discount {
            Some(code) => {
                let subtotal = subtotal(lines, self.store.currency())?;

                Some(self.store.discounts().evaluate(code, subtotal)?)
            }
            None => None,
        };

        Ok(self
            .store
            .compute_order_total(lines, address, discount.as_ref())?)
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
        countries::{CountryRecord, CountryTable, PhonePlan},
        discounts::{DiscountEngine, DiscountKind},
        payments::{Capture, MockPaymentCapture},
        totals::ShippingCost,
    };

    fn store() -> TestResult<Arc<Store>> {
        let countries = CountryTable::new([CountryRecord::new(
            "Switzerland",
            "CH",
            Money::from_minor(15_49, EUR),
            PhonePlan::new(41, Some("0".into()), 9..=9, [], [2, 3, 2], "781234567"),
        )])?;

        let discounts = DiscountEngine::new(
            [
                DiscountCode::new("SAVE10", DiscountKind::PercentOff(Percentage::from(dec!(0.10)))),
                DiscountCode::new("FREESHIP", DiscountKind::FreeShipping),
            ],
            EUR,
        )?;

        Ok(Arc::new(Store::new(
            countries,
            discounts,
            Some(Money::from_minor(100_00, EUR)),
            Money::from_minor(9_99, EUR),
        )))
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            street: "Bahnhofstrasse 1".into(),
            city: "Zürich".into(),
            postal_code: "8001".into(),
            country_name: "Switzerland".into(),
            phone: "+41 78 123 45 67".into(),
        }
    }

    fn session() -> TestResult<CheckoutSession> {
        let mut session = CheckoutSession::new(store()?);

        session.add_line(CartLine::new("tee", dec!(20.00), 2, "M", "black")?)?;
        session.set_address(address())?;
        session.apply_discount("save10")?;

        Ok(session)
    }

    fn paying(amount: i64) -> MockPaymentCapture {
        let mut payments = MockPaymentCapture::new();

        payments
            .expect_capture()
            .once()
            .withf(|requested| *requested == Money::from_minor(51_49, EUR))
            .return_once(move |_| {
                Ok(Capture {
                    captured_amount: Money::from_minor(amount, EUR),
                    transaction_id: "txn_1".to_string(),
                })
            });

        payments
    }

    #[test]
    fn edits_requote() -> TestResult {
        let mut session = CheckoutSession::new(store()?);
        let key = LineKey::new("tee", "M", "black");

        let total = session.add_line(CartLine::new("tee", dec!(20.00), 1, "M", "black")?)?;

        assert_eq!(total.shipping(), ShippingCost::Unresolved);
        assert_eq!(session.state(), &CheckoutState::Quoted(total));

        let total = session.update_quantity(&key, 2)?;

        assert_eq!(total.subtotal(), Money::from_minor(40_00, EUR));

        let total = session.set_address(address())?;

        assert_eq!(total.total(), Money::from_minor(55_49, EUR));

        let total = session.remove_line(&key)?;

        assert_eq!(total.subtotal(), Money::from_minor(0, EUR));
        assert!(session.cart().is_empty());

        Ok(())
    }

    #[test]
    fn discount_tracks_cart_changes() -> TestResult {
        let mut session = session()?;

        assert_eq!(session.quote()?.discount_amount(), Money::from_minor(4_00, EUR));

        let total = session.update_quantity(&LineKey::new("tee", "M", "black"), 3)?;

        assert_eq!(total.discount_amount(), Money::from_minor(6_00, EUR));

        Ok(())
    }

    #[test]
    fn rejected_code_keeps_previous_discount() -> TestResult {
        let mut session = session()?;
        let before = session.quote()?;

        let result = session.apply_discount("BOGUS");

        assert!(matches!(
            result,
            Err(CheckoutError::Discount(DiscountError::InvalidCode(_)))
        ));
        assert_eq!(session.discount().map(DiscountCode::code), Some("SAVE10"));
        assert_eq!(session.quote()?, before);

        Ok(())
    }

    #[test]
    fn clear_discount_removes_amount() -> TestResult {
        let mut session = session()?;

        let total = session.clear_discount()?;

        assert_eq!(total.discount_amount(), Money::from_minor(0, EUR));
        assert!(session.discount().is_none());

        Ok(())
    }

    #[test]
    fn invalid_address_is_kept_and_unresolves_shipping() -> TestResult {
        let mut session = session()?;
        let mut address = address();

        address.country_name = "Switzerlnd".into();

        let result = session.set_address(address);

        assert!(matches!(result, Err(CheckoutError::Validation(_))));
        assert_eq!(
            session.address().map(|address| address.country_name.as_str()),
            Some("Switzerlnd")
        );
        assert!(session.normalized_address().is_none());
        assert_eq!(session.quote()?.shipping(), ShippingCost::Unresolved);

        Ok(())
    }

    #[test]
    fn user_correctable_errors() {
        assert!(CheckoutError::EmptyCart.is_user_correctable());
        assert!(CheckoutError::Discount(DiscountError::EmptyCode).is_user_correctable());
        assert!(CheckoutError::Capture(CaptureError::Timeout).is_user_correctable());
        assert!(!CheckoutError::Reconcile(ReconcileError::ProvisionalTotal).is_user_correctable());
        assert!(!CheckoutError::AlreadyFinalized.is_user_correctable());
    }

    #[tokio::test]
    async fn place_order_finalizes_on_exact_capture() -> TestResult {
        let mut session = session()?;
        let payments = paying(51_49);

        let receipt = session.place_order(&payments).await?;

        assert_eq!(receipt.transaction_id(), "txn_1");
        assert_eq!(receipt.total(), Money::from_minor(51_49, EUR));
        assert_eq!(receipt.discount_code(), Some("SAVE10"));
        assert_eq!(receipt.address().phone(), "+41 78 123 45 67");
        assert!(session.state().is_finalized());

        Ok(())
    }

    #[tokio::test]
    async fn place_order_rejects_mismatched_capture() -> TestResult {
        let mut session = session()?;
        let payments = paying(50_00);

        let result = session.place_order(&payments).await;

        assert!(matches!(
            result,
            Err(CheckoutError::Reconcile(ReconcileError::AmountMismatch { .. }))
        ));
        assert_eq!(
            session.state(),
            &CheckoutState::MismatchRejected {
                expected: Money::from_minor(51_49, EUR),
                got: Money::from_minor(50_00, EUR),
            }
        );

        // inputs survive the failed attempt
        assert_eq!(session.cart().item_count(), 2);
        assert!(session.discount().is_some());

        Ok(())
    }

    #[tokio::test]
    async fn place_order_keeps_capture_in_other_currency() -> TestResult {
        let mut session = session()?;
        let mut payments = MockPaymentCapture::new();

        payments.expect_capture().once().return_once(|_| {
            Ok(Capture {
                captured_amount: Money::from_minor(51_49, GBP),
                transaction_id: "txn_gbp".into(),
            })
        });

        let result = session.place_order(&payments).await;

        assert!(matches!(
            result,
            Err(CheckoutError::Reconcile(ReconcileError::CurrencyMismatch {
                expected: "EUR",
                got: "GBP"
            }))
        ));
        assert_eq!(
            session.state(),
            &CheckoutState::MismatchRejected {
                expected: Money::from_minor(51_49, EUR),
                got: Money::from_minor(51_49, GBP),
            }
        );
        assert!(session.normalized_address().is_some());

        Ok(())
    }

    #[tokio::test]
    async fn place_order_records_capture_failure() -> TestResult {
        let mut session = session()?;
        let mut payments = MockPaymentCapture::new();

        payments
            .expect_capture()
            .once()
            .return_once(|_| Err(CaptureError::Declined("insufficient funds".into())));

        let result = session.place_order(&payments).await;

        assert!(matches!(result, Err(CheckoutError::Capture(_))));
        assert_eq!(
            session.state(),
            &CheckoutState::CaptureFailed(CaptureError::Declined("insufficient funds".into()))
        );

        // a retry goes through
        let receipt = session.place_order(&paying(51_49)).await?;

        assert_eq!(receipt.total(), Money::from_minor(51_49, EUR));

        Ok(())
    }

    #[tokio::test]
    async fn place_order_requires_address() -> TestResult {
        let mut session = CheckoutSession::new(store()?);
        let mut payments = MockPaymentCapture::new();

        payments.expect_capture().never();

        session.add_line(CartLine::new("tee", dec!(20.00), 1, "M", "black")?)?;

        let result = session.place_order(&payments).await;

        let Err(CheckoutError::Validation(errors)) = result else {
            return Err("expected validation errors".into());
        };

        assert_eq!(errors.len(), 7);

        Ok(())
    }

    #[tokio::test]
    async fn place_order_rejects_empty_cart() -> TestResult {
        let mut session = CheckoutSession::new(store()?);
        let mut payments = MockPaymentCapture::new();

        payments.expect_capture().never();

        session.set_address(address())?;

        assert!(matches!(
            session.place_order(&payments).await,
            Err(CheckoutError::EmptyCart)
        ));

        Ok(())
    }

    #[tokio::test]
    async fn finalized_session_rejects_edits() -> TestResult {
        let mut session = session()?;

        session.place_order(&paying(51_49)).await?;

        assert!(matches!(
            session.apply_discount("FREESHIP"),
            Err(CheckoutError::AlreadyFinalized)
        ));
        assert!(matches!(
            session.place_order(&MockPaymentCapture::new()).await,
            Err(CheckoutError::AlreadyFinalized)
        ));

        Ok(())
    }
}
