//! Store configuration
//!
//! Stores and carts are described in YAML. A store file holds the currency, the
//! free-shipping threshold, the default shipping cost, the country table with
//! numbering plans and the discount codes:
//!
//! ```yaml
//! currency: EUR
//! free_shipping_threshold: 100.00 EUR
//! default_shipping_cost: 9.99 EUR
//! countries:
//!   - name: Germany
//!     iso_code: DE
//!     shipping_cost: 5.12 EUR
//!     phone:
//!       calling_code: 49
//!       trunk_prefix: "0"
//!       min_length: 6
//!       max_length: 11
//!       groups: [3]
//!       example: "15123456789"
//! discount_codes:
//!   - code: SAVE10
//!     percent_off: 10%
//!   - code: FREESHIP
//!     free_shipping: true
//! ```
//!
//! Everything is validated at load time, so a [`Store`] built from a config
//! never meets malformed reference data at checkout.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    cart::CartError,
    countries::{CountryRecord, CountryTable, CountryTableError, PhonePlan},
    discounts::{DiscountCode, DiscountEngine, DiscountKind, DiscountTableError},
    store::Store,
};

pub mod carts;
pub mod parse;

pub use carts::CartConfig;
pub use parse::{parse_amount, parse_currency, parse_percentage, parse_price};

/// Default base directory for named configuration sets
pub const DEFAULT_BASE_PATH: &str = "./fixtures";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading a configuration file
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format or value
    #[error("invalid percentage: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A price is not in the store currency
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Store currency
        expected: &'static str,
        /// Currency of the offending price
        found: &'static str,
    },

    /// A shipping cost is negative
    #[error("shipping cost for {0} cannot be negative")]
    NegativeShippingCost(String),

    /// A discount code entry is malformed
    #[error("invalid discount code {code}: {reason}")]
    InvalidDiscount {
        /// Code as written in the file
        code: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// A country's numbering plan is malformed
    #[error("invalid phone plan for {country}: {reason}")]
    InvalidPhonePlan {
        /// Country name
        country: String,
        /// What is wrong with it
        reason: String,
    },

    /// Country table error
    #[error(transparent)]
    Countries(#[from] CountryTableError),

    /// Discount table error
    #[error(transparent)]
    Discounts(#[from] DiscountTableError),

    /// Cart line error
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Store configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store currency code (EUR, GBP or USD)
    pub currency: String,

    /// Subtotal at which shipping becomes free (e.g., "100.00 EUR")
    #[serde(default)]
    pub free_shipping_threshold: Option<String>,

    /// Shipping cost for countries missing from the table
    pub default_shipping_cost: String,

    /// Countries the store ships to
    pub countries: Vec<CountryConfig>,

    /// Discount codes
    #[serde(default)]
    pub discount_codes: Vec<DiscountConfig>,
}

/// Country entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountryConfig {
    /// Display name
    pub name: String,

    /// ISO 3166-1 alpha-2 code
    pub iso_code: String,

    /// Base shipping cost (e.g., "5.12 EUR")
    pub shipping_cost: String,

    /// Numbering plan
    pub phone: PhoneConfig,
}

/// Numbering plan entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhoneConfig {
    /// International calling code, without `+`
    pub calling_code: u16,

    /// Digits dialled before national numbers, usually "0"
    #[serde(default)]
    pub trunk_prefix: Option<String>,

    /// Minimum national number length
    pub min_length: usize,

    /// Maximum national number length
    pub max_length: usize,

    /// Allowed leading digits; empty allows any
    #[serde(default)]
    pub leading_digits: Vec<String>,

    /// Display group sizes
    #[serde(default)]
    pub groups: Vec<usize>,

    /// Valid example national number
    pub example: String,
}

/// Discount code entry. Exactly one of `percent_off` and `free_shipping` must
/// be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscountConfig {
    /// Code as customers type it
    pub code: String,

    /// Percentage off the subtotal ("10%" or "0.10")
    #[serde(default)]
    pub percent_off: Option<String>,

    /// Whether the code waives shipping
    #[serde(default)]
    pub free_shipping: bool,
}

impl StoreConfig {
    /// Parse a store configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not match the expected shape.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Read a store configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Load a named store from `./fixtures/stores/<name>.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, ConfigError> {
        Self::from_set_in(DEFAULT_BASE_PATH, name)
    }

    /// Load a named store from `<base>/stores/<name>.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set_in(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, ConfigError> {
        Self::from_path(base_path.into().join("stores").join(format!("{name}.yml")))
    }

    /// Validate the configuration and build a [`Store`].
    ///
    /// # Errors
    ///
    /// Returns the first problem found: unparseable or foreign-currency prices,
    /// negative shipping costs, malformed numbering plans, malformed or duplicate
    /// discount codes, or duplicate country names.
    pub fn build(&self) -> Result<Store, ConfigError> {
        let currency = parse_currency(&self.currency)?;

        let threshold = self
            .free_shipping_threshold
            .as_deref()
            .map(|threshold| store_price(threshold, currency))
            .transpose()?;

        let default_cost = store_price(&self.default_shipping_cost, currency)?;

        if default_cost.to_minor_units() < 0 {
            return Err(ConfigError::NegativeShippingCost("default".to_string()));
        }

        let records = self
            .countries
            .iter()
            .map(|country| country.to_record(currency))
            .collect::<Result<Vec<_>, _>>()?;

        let codes = self
            .discount_codes
            .iter()
            .map(DiscountConfig::to_code)
            .collect::<Result<Vec<_>, _>>()?;

        let countries = CountryTable::new(records)?;
        let discounts = DiscountEngine::new(codes, currency)?;

        info!(
            currency = currency.iso_alpha_code,
            countries = countries.len(),
            discount_codes = discounts.len(),
            "store configuration loaded"
        );

        Ok(Store::new(countries, discounts, threshold, default_cost))
    }
}

impl CountryConfig {
    fn to_record(&self, currency: &'static Currency) -> Result<CountryRecord, ConfigError> {
        let cost = store_price(&self.shipping_cost, currency)?;

        if cost.to_minor_units() < 0 {
            return Err(ConfigError::NegativeShippingCost(self.name.clone()));
        }

        let phone = self.phone.to_plan(&self.name)?;

        Ok(CountryRecord::new(
            self.name.trim(),
            self.iso_code.trim(),
            cost,
            phone,
        ))
    }
}

impl PhoneConfig {
    fn to_plan(&self, country: &str) -> Result<PhonePlan, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPhonePlan {
            country: country.to_string(),
            reason,
        };

        if self.calling_code == 0 {
            return Err(invalid("calling code cannot be 0".to_string()));
        }

        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(invalid(format!(
                "length range {}..={} is empty",
                self.min_length, self.max_length
            )));
        }

        let all_digits = |value: &str| value.chars().all(|c| c.is_ascii_digit());

        if let Some(prefix) = &self.trunk_prefix
            && !all_digits(prefix)
        {
            return Err(invalid(format!("trunk prefix {prefix:?} is not numeric")));
        }

        if let Some(leading) = self
            .leading_digits
            .iter()
            .find(|leading| leading.is_empty() || !all_digits(leading))
        {
            return Err(invalid(format!("leading digits {leading:?} are not numeric")));
        }

        let plan = PhonePlan::new(
            self.calling_code,
            self.trunk_prefix.clone(),
            self.min_length..=self.max_length,
            self.leading_digits.iter().cloned(),
            self.groups.iter().copied(),
            self.example.trim(),
        );

        plan.parse(plan.example())
            .map_err(|err| invalid(format!("example number is invalid: {err}")))?;

        Ok(plan)
    }
}

impl DiscountConfig {
    fn to_code(&self) -> Result<DiscountCode, ConfigError> {
        let invalid = |reason| ConfigError::InvalidDiscount {
            code: self.code.clone(),
            reason,
        };

        let kind = match (&self.percent_off, self.free_shipping) {
            (Some(percent), false) => DiscountKind::PercentOff(parse_percentage(percent)?),
            (None, true) => DiscountKind::FreeShipping,
            (Some(_), true) => {
                return Err(invalid("set either percent_off or free_shipping, not both"));
            }
            (None, false) => return Err(invalid("no discount effect configured")),
        };

        Ok(DiscountCode::new(&self.code, kind))
    }
}

fn store_price(
    s: &str,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, ConfigError> {
    let price = parse_price(s)?;

    if price.currency() != currency {
        return Err(ConfigError::CurrencyMismatch {
            expected: currency.iso_alpha_code,
            found: price.currency().iso_alpha_code,
        });
    }

    Ok(price)
}
