//! Payments
//!
//! The payment processor is reached only through [`PaymentCapture`]. Whatever it
//! reports as captured is checked against the server's own total with
//! [`reconcile`] before an order may be finalized.

use async_trait::async_trait;
use mockall::automock;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::error;

use crate::totals::OrderTotal;

/// Result of a successful capture, as reported by the processor.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Amount the processor says it charged
    pub captured_amount: Money<'static, Currency>,

    /// Processor transaction reference
    pub transaction_id: String,
}

/// Errors reported by the payment processor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The processor declined the payment.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The processor did not answer in time.
    #[error("payment capture timed out")]
    Timeout,

    /// The processor could not be reached or failed internally.
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),
}

/// Opaque payment capture service.
///
/// Implementations own their timeout and idempotency policy.
#[automock]
#[async_trait]
pub trait PaymentCapture: Send + Sync {
    /// Capture `amount` in its currency.
    async fn capture(&self, amount: Money<'static, Currency>) -> Result<Capture, CaptureError>;
}

/// Reasons a captured payment cannot be accepted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconcileError {
    /// The captured amount differs from the expected total.
    #[error("payment amount does not match order total (expected {expected}, got {got})")]
    AmountMismatch {
        /// Server-computed total
        expected: Money<'static, Currency>,
        /// Amount reported by the processor
        got: Money<'static, Currency>,
    },

    /// The captured amount is in a different currency.
    #[error("payment currency {got} does not match order currency {expected}")]
    CurrencyMismatch {
        /// Order currency code
        expected: &'static str,
        /// Captured currency code
        got: &'static str,
    },

    /// The expected total still has unresolved shipping.
    #[error("order total is provisional; shipping has not been resolved")]
    ProvisionalTotal,
}

/// Accept a captured amount only if it equals the expected total exactly, to the
/// minor unit.
///
/// # Errors
///
/// - [`ReconcileError::ProvisionalTotal`]: `expected` has unresolved shipping.
/// - [`ReconcileError::CurrencyMismatch`]: the currencies differ.
/// - [`ReconcileError::AmountMismatch`]: the amounts differ by any amount.
pub fn reconcile(
    expected: &OrderTotal,
    captured: Money<'static, Currency>,
) -> Result<(), ReconcileError> {
    if !expected.is_final() {
        return Err(ReconcileError::ProvisionalTotal);
    }

    let total = expected.total();

    if total.currency() != captured.currency() {
        error!(
            expected = total.currency().iso_alpha_code,
            got = captured.currency().iso_alpha_code,
            "captured payment currency does not match order"
        );

        return Err(ReconcileError::CurrencyMismatch {
            expected: total.currency().iso_alpha_code,
            got: captured.currency().iso_alpha_code,
        });
    }

    if total.to_minor_units() != captured.to_minor_units() {
        error!(
            expected = %total,
            got = %captured,
            "captured payment amount does not match order total"
        );

        return Err(ReconcileError::AmountMismatch {
            expected: total,
            got: captured,
        });
    }

    Ok(())
}
