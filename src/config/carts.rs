//! Cart fixtures
//!
//! A cart file describes one checkout attempt: the lines, and optionally the
//! shipping address and discount code the customer entered.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rusty_money::iso::Currency;
use serde::Deserialize;

use crate::{
    address::ShippingAddress,
    cart::{Cart, CartLine},
    config::{ConfigError, DEFAULT_BASE_PATH, parse_amount},
};

/// Cart file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CartConfig {
    /// Cart lines
    pub lines: Vec<CartLineConfig>,

    /// Shipping address, in the same shape the storefront submits
    #[serde(default)]
    pub address: Option<ShippingAddress>,

    /// Discount code entered by the customer
    #[serde(default)]
    pub discount_code: Option<String>,
}

/// Cart line entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CartLineConfig {
    /// Product identifier
    pub product_id: String,

    /// Unit price (e.g., "19.99 EUR")
    pub unit_price: String,

    /// Quantity
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Size variant
    #[serde(default)]
    pub size: String,

    /// Colour variant
    #[serde(default)]
    pub color: String,
}

fn default_quantity() -> u32 {
    1
}

impl CartConfig {
    /// Parse a cart from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not match the expected shape.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Read a cart file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Load a named cart from `./fixtures/carts/<name>.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, ConfigError> {
        Self::from_set_in(DEFAULT_BASE_PATH, name)
    }

    /// Load a named cart from `<base>/carts/<name>.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set_in(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, ConfigError> {
        Self::from_path(base_path.into().join("carts").join(format!("{name}.yml")))
    }

    /// Build the cart, checking every price is in the store currency.
    ///
    /// Lines sharing a product, size and colour are merged.
    ///
    /// # Errors
    ///
    /// Returns an error if a price cannot be parsed, is in another currency, or
    /// if a line is rejected by the cart.
    pub fn cart(&self, currency: &'static Currency) -> Result<Cart, ConfigError> {
        let mut cart = Cart::new();

        for line in &self.lines {
            let (unit_price, line_currency) = parse_amount(&line.unit_price)?;

            if line_currency != currency {
                return Err(ConfigError::CurrencyMismatch {
                    expected: currency.iso_alpha_code,
                    found: line_currency.iso_alpha_code,
                });
            }

            cart.add_line(CartLine::new(
                line.product_id.as_str(),
                unit_price,
                line.quantity,
                line.size.as_str(),
                line.color.as_str(),
            )?)?;
        }

        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::{EUR, GBP};
    use testresult::TestResult;

    use super::*;
    use crate::cart::CartError;

    const CART: &str = r#"
lines:
  - product_id: tee
    unit_price: 20.00 EUR
    quantity: 2
    size: M
    color: black
  - product_id: socks
    unit_price: 4.50 EUR
address:
  firstName: Grace
  lastName: Hopper
  street: Bahnhofstrasse 1
  city: Zürich
  postalCode: "8001"
  countryName: Switzerland
  phoneE164: "+41 78 123 45 67"
discount_code: SAVE10
"#;

    #[test]
    fn cart_builds_lines() -> TestResult {
        let config = CartConfig::from_yaml_str(CART)?;
        let cart = config.cart(EUR)?;

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.item_count(), 3);

        let socks = cart.lines().get(1).ok_or("socks missing")?;

        assert_eq!(socks.unit_price(), dec!(4.50));
        assert_eq!(socks.quantity(), 1);

        assert_eq!(config.discount_code.as_deref(), Some("SAVE10"));

        let address = config.address.ok_or("address missing")?;

        assert_eq!(address.country_name, "Switzerland");
        assert_eq!(address.phone, "+41 78 123 45 67");

        Ok(())
    }

    #[test]
    fn cart_merges_repeated_lines() -> TestResult {
        let yaml = CART.replace("product_id: socks", "product_id: tee");
        let yaml = yaml.replace(
            "unit_price: 4.50 EUR",
            "unit_price: 20.00 EUR\n    size: M\n    color: black",
        );

        let cart = CartConfig::from_yaml_str(&yaml)?.cart(EUR)?;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.item_count(), 3);

        Ok(())
    }

    #[test]
    fn cart_rejects_foreign_currency() -> TestResult {
        let result = CartConfig::from_yaml_str(CART)?.cart(GBP);

        assert!(matches!(
            result,
            Err(ConfigError::CurrencyMismatch {
                expected: "GBP",
                found: "EUR"
            })
        ));

        Ok(())
    }

    #[test]
    fn cart_rejects_zero_quantity() -> TestResult {
        let yaml = CART.replace("quantity: 2", "quantity: 0");
        let result = CartConfig::from_yaml_str(&yaml)?.cart(EUR);

        assert!(matches!(
            result,
            Err(ConfigError::Cart(CartError::ZeroQuantity(_)))
        ));

        Ok(())
    }
}
