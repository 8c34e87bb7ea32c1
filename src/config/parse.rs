//! Value parsers shared by the configuration files

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, USD},
};

use crate::{
    config::ConfigError,
    pricing::{MINOR_UNIT_DIGITS, to_money},
};

/// Parse a currency code. Only the store currencies are accepted.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownCurrency`] for any other code.
pub fn parse_currency(code: &str) -> Result<&'static Currency, ConfigError> {
    match code.trim() {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        other => Err(ConfigError::UnknownCurrency(other.to_string())),
    }
}

/// Parse a price string (e.g., "5.12 EUR") into a decimal amount and currency.
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY" or
/// the currency code is not recognized.
pub fn parse_amount(s: &str) -> Result<(Decimal, &'static Currency), ConfigError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ConfigError::InvalidPrice(format!(
            "expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| ConfigError::InvalidPrice(s.to_string()))?;

    Ok((amount, parse_currency(code)?))
}

/// Parse a price string into money.
///
/// # Errors
///
/// See [`parse_amount`]; also fails if the amount has more than two fractional
/// digits or does not fit in minor units.
pub fn parse_price(s: &str) -> Result<Money<'static, Currency>, ConfigError> {
    let (amount, currency) = parse_amount(s)?;

    if amount.normalize().scale() > MINOR_UNIT_DIGITS {
        return Err(ConfigError::InvalidPrice(format!(
            "more than {MINOR_UNIT_DIGITS} fractional digits: {s}"
        )));
    }

    to_money(amount, currency).map_err(|_err| ConfigError::InvalidPrice(s.to_string()))
}

/// Parse a percentage string (e.g., "10%" or "0.10") into a `Percentage`.
///
/// Accepts two formats:
/// - Percentage format: "10%" for 10%
/// - Decimal format: "0.10" for 10%
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPercentage`] if the string cannot be parsed or
/// the value lies outside 0% to 100%.
pub fn parse_percentage(s: &str) -> Result<Percentage, ConfigError> {
    let trimmed = s.trim();
    let invalid = || ConfigError::InvalidPercentage(s.to_string());

    let ratio = if let Some(percent_str) = trimmed.strip_suffix('%') {
        percent_str
            .trim()
            .parse::<Decimal>()
            .map_err(|_err| invalid())?
            .checked_div(Decimal::ONE_HUNDRED)
            .ok_or_else(invalid)?
    } else {
        trimmed.parse::<Decimal>().map_err(|_err| invalid())?
    };

    if ratio < Decimal::ZERO || ratio > Decimal::ONE {
        return Err(invalid());
    }

    Ok(Percentage::from(ratio))
}
