//! Cart

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to cart construction or edits.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// Unit prices must be strictly positive.
    #[error("unit price for {product_id} must be greater than zero, got {price}")]
    NonPositivePrice {
        /// Product the line refers to
        product_id: String,
        /// Rejected price
        price: Decimal,
    },

    /// Quantities start at one; use removal to drop a line.
    #[error("quantity for {0} must be at least 1")]
    ZeroQuantity(String),

    /// No line matches the given key.
    #[error("no cart line for {0}")]
    LineNotFound(String),

    /// Adding to an existing line would overflow its quantity.
    #[error("quantity for {0} is too large")]
    QuantityOverflow(String),
}

/// Identifies a cart line: a product in a particular size and colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    /// Product identifier
    pub product_id: String,

    /// Size variant
    pub size: String,

    /// Colour variant
    pub color: String,
}

impl LineKey {
    /// Create a new line key.
    pub fn new(
        product_id: impl Into<String>,
        size: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
            color: color.into(),
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.product_id, self.size, self.color)
    }
}

/// A product in the cart with its unit price and quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    key: LineKey,
    unit_price: Decimal,
    quantity: u32,
}

impl CartLine {
    /// Create a new cart line.
    ///
    /// # Errors
    ///
    /// - [`CartError::NonPositivePrice`]: `unit_price` is zero or negative.
    /// - [`CartError::ZeroQuantity`]: `quantity` is zero.
    pub fn new(
        product_id: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
        size: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<Self, CartError> {
        Self::with_key(LineKey::new(product_id, size, color), unit_price, quantity)
    }

    /// Create a new cart line from an existing key.
    ///
    /// # Errors
    ///
    /// See [`CartLine::new`].
    pub fn with_key(key: LineKey, unit_price: Decimal, quantity: u32) -> Result<Self, CartError> {
        if unit_price <= Decimal::ZERO {
            return Err(CartError::NonPositivePrice {
                product_id: key.product_id,
                price: unit_price,
            });
        }

        if quantity == 0 {
            return Err(CartError::ZeroQuantity(key.to_string()));
        }

        Ok(Self {
            key,
            unit_price,
            quantity,
        })
    }

    /// Line key (product, size, colour)
    pub fn key(&self) -> &LineKey {
        &self.key
    }

    /// Product identifier
    pub fn product_id(&self) -> &str {
        &self.key.product_id
    }

    /// Size variant
    pub fn size(&self) -> &str {
        &self.key.size
    }

    /// Colour variant
    pub fn color(&self) -> &str {
        &self.key.color
    }

    /// Unit price at full precision
    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Quantity, always at least one
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unrounded `unit_price × quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Cart
///
/// Lines keep insertion order. Adding a line whose key is already present merges
/// the quantities and keeps the latest unit price.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cart from the given lines, merging duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::QuantityOverflow`] if merged quantities overflow.
    pub fn with_lines(lines: impl IntoIterator<Item = CartLine>) -> Result<Self, CartError> {
        let mut cart = Self::new();

        lines.into_iter().try_for_each(|line| cart.add_line(line))?;

        Ok(cart)
    }

    /// Add a line, merging it into an existing line with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::QuantityOverflow`] if the merged quantity overflows.
    pub fn add_line(&mut self, line: CartLine) -> Result<(), CartError> {
        match self.lines.iter_mut().find(|existing| existing.key == line.key) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| CartError::QuantityOverflow(line.key.to_string()))?;
                existing.unit_price = line.unit_price;
            }
            None => self.lines.push(line),
        }

        Ok(())
    }

    /// Remove the line with the given key and return it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if no line has that key.
    pub fn remove_line(&mut self, key: &LineKey) -> Result<CartLine, CartError> {
        let position = self
            .lines
            .iter()
            .position(|line| &line.key == key)
            .ok_or_else(|| CartError::LineNotFound(key.to_string()))?;

        Ok(self.lines.remove(position))
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// - [`CartError::ZeroQuantity`]: `quantity` is zero; remove the line instead.
    /// - [`CartError::LineNotFound`]: no line has that key.
    pub fn update_quantity(&mut self, key: &LineKey, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity(key.to_string()));
        }

        let line = self
            .lines
            .iter_mut()
            .find(|line| &line.key == key)
            .ok_or_else(|| CartError::LineNotFound(key.to_string()))?;

        line.quantity = quantity;

        Ok(())
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Get the number of lines in the cart.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;

    fn test_cart() -> Result<Cart, CartError> {
        Cart::with_lines([
            CartLine::new("tee", dec!(19.99), 2, "M", "black")?,
            CartLine::new("hoodie", dec!(49.00), 1, "L", "grey")?,
        ])
    }

    #[test]
    fn new_line_rejects_non_positive_price() {
        let result = CartLine::new("tee", Decimal::ZERO, 1, "M", "black");

        assert!(matches!(result, Err(CartError::NonPositivePrice { .. })));
    }

    #[test]
    fn new_line_rejects_zero_quantity() {
        let result = CartLine::new("tee", dec!(1.00), 0, "M", "black");

        assert!(matches!(result, Err(CartError::ZeroQuantity(_))));
    }

    #[test]
    fn line_total_is_unrounded() -> TestResult {
        let line = CartLine::new("tee", dec!(0.335), 3, "M", "black")?;

        assert_eq!(line.line_total(), Some(dec!(1.005)));

        Ok(())
    }

    #[test]
    fn add_line_merges_same_variant() -> TestResult {
        let mut cart = test_cart()?;

        cart.add_line(CartLine::new("tee", dec!(19.99), 3, "M", "black")?)?;

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.item_count(), 6);

        Ok(())
    }

    #[test]
    fn add_line_keeps_other_variants_separate() -> TestResult {
        let mut cart = test_cart()?;

        cart.add_line(CartLine::new("tee", dec!(19.99), 1, "S", "black")?)?;

        assert_eq!(cart.len(), 3);

        Ok(())
    }

    #[test]
    fn update_quantity_sets_quantity() -> TestResult {
        let mut cart = test_cart()?;
        let key = LineKey::new("hoodie", "L", "grey");

        cart.update_quantity(&key, 4)?;

        assert_eq!(
            cart.lines().iter().find(|l| l.key() == &key).map(CartLine::quantity),
            Some(4)
        );

        Ok(())
    }

    #[test]
    fn update_quantity_rejects_zero() -> TestResult {
        let mut cart = test_cart()?;
        let key = LineKey::new("hoodie", "L", "grey");

        assert!(matches!(
            cart.update_quantity(&key, 0),
            Err(CartError::ZeroQuantity(_))
        ));

        Ok(())
    }

    #[test]
    fn remove_line_removes_and_reports_missing() -> TestResult {
        let mut cart = test_cart()?;
        let key = LineKey::new("tee", "M", "black");

        let removed = cart.remove_line(&key)?;

        assert_eq!(removed.quantity(), 2);
        assert_eq!(cart.len(), 1);
        assert!(matches!(
            cart.remove_line(&key),
            Err(CartError::LineNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn is_empty() -> TestResult {
        assert!(Cart::new().is_empty());
        assert!(!test_cart()?.is_empty());

        Ok(())
    }
}
