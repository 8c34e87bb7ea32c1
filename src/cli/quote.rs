//! `tally quote`

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use tally::{
    cart::CartLine, discounts::DiscountCode, receipt::write_order_table,
    totals::OrderTotalSummary,
};

use super::{OrderArgs, OutputFormat, PreparedOrder, write_yaml};

#[derive(Debug, Args)]
pub(crate) struct QuoteArgs {
    #[command(flatten)]
    order: OrderArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteOutput<'a> {
    lines: &'a [CartLine],
    discount_code: Option<&'a str>,
    totals: OrderTotalSummary,
    notes: &'a [String],
}

pub(crate) fn run(args: &QuoteArgs) -> anyhow::Result<()> {
    let PreparedOrder { session, notes } = args.order.prepare()?;

    let total = session.quote()?;
    let lines = session.cart().lines();
    let discount_code = session.discount().map(DiscountCode::code);

    let mut out = io::stdout().lock();

    match args.order.format {
        OutputFormat::Table => {
            write_order_table(&mut out, lines, &total, discount_code)?;

            for note in &notes {
                writeln!(out, "note: {note}")?;
            }
        }
        OutputFormat::Yaml => write_yaml(
            &mut out,
            &QuoteOutput {
                lines,
                discount_code,
                totals: OrderTotalSummary::from(&total),
                notes: &notes,
            },
        )?,
    }

    Ok(())
}
