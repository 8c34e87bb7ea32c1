//! Receipt
//!
//! An [`OrderReceipt`] exists only for a finalized checkout: it is built by
//! [`crate::checkout::CheckoutSession::place_order`] after the captured amount
//! reconciled against the recomputed total.

use std::io;

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::{
    address::NormalizedAddress,
    cart::CartLine,
    pricing::{PricingError, to_decimal, to_money},
    totals::{OrderTotal, OrderTotalSummary, ShippingCost},
};

/// Label shown for shipping that has not been priced yet.
pub const UNRESOLVED_SHIPPING: &str = "calculated at checkout";

/// Errors that can occur when rendering an order.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Line totals could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Record of a finalized order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    transaction_id: String,
    address: NormalizedAddress,
    lines: Vec<CartLine>,
    discount_code: Option<String>,
    totals: OrderTotal,
}

impl OrderReceipt {
    pub(crate) fn new(
        transaction_id: String,
        address: NormalizedAddress,
        lines: Vec<CartLine>,
        discount_code: Option<String>,
        totals: OrderTotal,
    ) -> Self {
        Self {
            transaction_id,
            address,
            lines,
            discount_code,
            totals,
        }
    }

    /// Payment processor transaction reference
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Validated shipping address
    pub fn address(&self) -> &NormalizedAddress {
        &self.address
    }

    /// Lines as they were charged
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Applied discount code, if any
    pub fn discount_code(&self) -> Option<&str> {
        self.discount_code.as_deref()
    }

    /// Reconciled totals
    pub fn totals(&self) -> &OrderTotal {
        &self.totals
    }

    /// Amount charged
    pub fn total(&self) -> Money<'static, Currency> {
        self.totals.total()
    }

    /// Amount taken off the subtotal by the discount code
    pub fn savings(&self) -> Money<'static, Currency> {
        self.totals.discount_amount()
    }

    /// Savings as a fraction of the subtotal
    pub fn savings_percent(&self) -> Percentage {
        let subtotal = to_decimal(&self.totals.subtotal());

        if subtotal.is_zero() {
            return Percentage::from(Decimal::ZERO);
        }

        Percentage::from(to_decimal(&self.savings()) / subtotal)
    }

    /// Serializable view of the receipt.
    pub fn summary(&self) -> ReceiptSummary<'_> {
        ReceiptSummary {
            transaction_id: &self.transaction_id,
            address: &self.address,
            lines: &self.lines,
            discount_code: self.discount_code.as_deref(),
            totals: OrderTotalSummary::from(&self.totals),
        }
    }

    /// Writes the receipt as a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        writeln!(out, "Order {}", self.transaction_id)?;
        writeln!(
            out,
            "Ship to {} {}, {}, {} {}, {} ({})",
            self.address.first_name(),
            self.address.last_name(),
            self.address.street(),
            self.address.postal_code(),
            self.address.city(),
            self.address.country_name(),
            self.address.phone(),
        )?;

        write_order_table(&mut out, &self.lines, &self.totals, self.discount_code())
    }
}

/// Serializable view of an [`OrderReceipt`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary<'a> {
    /// Payment processor transaction reference
    pub transaction_id: &'a str,
    /// Shipping address
    pub address: &'a NormalizedAddress,
    /// Lines charged
    pub lines: &'a [CartLine],
    /// Applied discount code
    pub discount_code: Option<&'a str>,
    /// Totals
    pub totals: OrderTotalSummary,
}

/// Writes cart lines and an order total as a table followed by a summary.
///
/// Unresolved shipping is shown as "calculated at checkout".
///
/// # Errors
///
/// Returns an error if a line total cannot be priced or the output cannot be
/// written.
pub fn write_order_table(
    out: &mut impl io::Write,
    lines: &[CartLine],
    totals: &OrderTotal,
    discount_code: Option<&str>,
) -> Result<(), ReceiptError> {
    let currency = totals.currency();
    let mut builder = Builder::default();

    builder.push_record(["Item", "Size", "Colour", "Qty", "Unit Price", "Line Total"]);

    for line in lines {
        let line_total = line
            .line_total()
            .ok_or(PricingError::Overflow(line.unit_price()))?;

        builder.push_record([
            line.product_id().to_string(),
            line.size().to_string(),
            line.color().to_string(),
            line.quantity().to_string(),
            format!("{}", to_money(line.unit_price(), currency)?),
            format!("{}", to_money(line_total, currency)?),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(3..), Alignment::right());

    writeln!(out, "\n{table}")?;

    let discount_label = match discount_code {
        Some(code) => format!("Discount ({code}):"),
        None => "Discount:".to_string(),
    };

    let shipping = match totals.shipping() {
        ShippingCost::Resolved(amount) => format!("{amount}"),
        ShippingCost::Unresolved => UNRESOLVED_SHIPPING.to_string(),
    };

    let rows = [
        ("Subtotal:".to_string(), format!("{}", totals.subtotal())),
        (discount_label, format!("-{}", totals.discount_amount())),
        ("Shipping:".to_string(), shipping),
        ("Total:".to_string(), format!("{}", totals.total())),
    ];

    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

    for (label, value) in &rows {
        writeln!(out, " {label:>label_width$}  {value:>value_width$}")?;
    }

    writeln!(out)?;

    Ok(())
}
