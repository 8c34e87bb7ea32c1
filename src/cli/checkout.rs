//! `tally checkout`
//!
//! Runs a full checkout against a stand-in payment processor that captures a
//! fixed amount, so reconciliation can be exercised from the command line.

use std::io::{self, Write};

use async_trait::async_trait;
use clap::Args;
use rusty_money::{Money, iso::Currency};
use tally::{
    checkout::CheckoutError,
    config::parse_price,
    payments::{Capture, CaptureError, PaymentCapture},
};
use tracing::info;

use super::{OrderArgs, OutputFormat, PreparedOrder, write_yaml};

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    #[command(flatten)]
    order: OrderArgs,

    /// Amount the processor reports as captured (e.g., "50.00 EUR"); defaults
    /// to the requested amount
    #[arg(long)]
    captured: Option<String>,

    /// Make the processor decline with this reason
    #[arg(long, conflicts_with = "captured")]
    decline: Option<String>,

    /// Transaction reference the processor returns
    #[arg(long, default_value = "txn_cli")]
    transaction_id: String,
}

/// Payment processor stand-in.
#[derive(Debug)]
struct FixedCapture {
    captured: Option<Money<'static, Currency>>,
    decline: Option<String>,
    transaction_id: String,
}

#[async_trait]
impl PaymentCapture for FixedCapture {
    async fn capture(&self, amount: Money<'static, Currency>) -> Result<Capture, CaptureError> {
        if let Some(reason) = &self.decline {
            return Err(CaptureError::Declined(reason.clone()));
        }

        let captured_amount = self.captured.unwrap_or(amount);

        info!(requested = %amount, captured = %captured_amount, "payment captured");

        Ok(Capture {
            captured_amount,
            transaction_id: self.transaction_id.clone(),
        })
    }
}

pub(crate) async fn run(args: CheckoutArgs) -> anyhow::Result<()> {
    let PreparedOrder { mut session, notes } = args.order.prepare()?;

    let payments = FixedCapture {
        captured: args.captured.as_deref().map(parse_price).transpose()?,
        decline: args.decline,
        transaction_id: args.transaction_id,
    };

    let result = session.place_order(&payments).await;
    let mut out = io::stdout().lock();

    for note in &notes {
        writeln!(out, "note: {note}")?;
    }

    let receipt = match result {
        Ok(receipt) => receipt,
        Err(error @ CheckoutError::Reconcile(_)) => {
            writeln!(out, "order not placed: {error}")?;

            return Err(error.into());
        }
        Err(error) => return Err(error.into()),
    };

    match args.order.format {
        OutputFormat::Table => receipt.write_to(&mut out)?,
        OutputFormat::Yaml => write_yaml(&mut out, &receipt.summary())?,
    }

    Ok(())
}
