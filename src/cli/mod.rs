//! Command line interface

use std::{io, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tally::{
    checkout::{CheckoutError, CheckoutSession},
    config::{CartConfig, StoreConfig},
};
use tracing::warn;
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

mod checkout;
mod quote;

#[derive(Debug, Parser)]
#[command(name = "tally", about = "Checkout pricing and validation", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Price a cart against a store
    Quote(quote::QuoteArgs),

    /// Price a cart, capture the payment and print the receipt
    Checkout(checkout::CheckoutArgs),
}

impl Cli {
    pub(crate) fn init_logging(&self) -> anyhow::Result<()> {
        self.logging.init()
    }

    pub(crate) async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Quote(args) => quote::run(&args),
            Commands::Checkout(args) => checkout::run(args).await,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

#[derive(Debug, Args)]
struct LoggingArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "TALLY_LOG", default_value = "warn")]
    log_level: String,

    /// Log format (compact, json)
    #[arg(long, global = true, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

impl LoggingArgs {
    fn init(&self) -> anyhow::Result<()> {
        match self.log_format {
            LogFormat::Compact => self.init_with_layer(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(io::stderr),
            ),
            LogFormat::Json => self.init_with_layer(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(io::stderr),
            ),
        }
    }

    fn init_with_layer<L>(&self, fmt_layer: L) -> anyhow::Result<()>
    where
        L: Layer<Registry> + Send + Sync + 'static,
    {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init()
            .context("failed to install log subscriber")
    }
}

/// Output format for command results.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,

    /// YAML document
    Yaml,
}

/// Where the store and cart come from, and what the customer entered.
#[derive(Debug, Args)]
struct OrderArgs {
    /// Named store under ./fixtures/stores
    #[arg(long, env = "TALLY_STORE", default_value = "default")]
    store: String,

    /// Store configuration file; takes precedence over --store
    #[arg(long, env = "TALLY_STORE_FILE")]
    store_file: Option<PathBuf>,

    /// Named cart under ./fixtures/carts
    #[arg(long, required_unless_present = "cart_file")]
    cart: Option<String>,

    /// Cart file; takes precedence over --cart
    #[arg(long)]
    cart_file: Option<PathBuf>,

    /// Discount code; replaces the code in the cart file
    #[arg(long)]
    code: Option<String>,

    /// Ignore the discount code in the cart file
    #[arg(long, conflicts_with = "code")]
    no_code: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

/// A session built from [`OrderArgs`], plus the problems the customer could
/// correct.
struct PreparedOrder {
    session: CheckoutSession,
    notes: Vec<String>,
}

impl OrderArgs {
    fn prepare(&self) -> anyhow::Result<PreparedOrder> {
        let store_config = match &self.store_file {
            Some(path) => StoreConfig::from_path(path)
                .with_context(|| format!("failed to load store file {}", path.display()))?,
            None => StoreConfig::from_set(&self.store)
                .with_context(|| format!("failed to load store {}", self.store))?,
        };

        let cart_config = match (&self.cart_file, &self.cart) {
            (Some(path), _) => CartConfig::from_path(path)
                .with_context(|| format!("failed to load cart file {}", path.display()))?,
            (None, Some(name)) => CartConfig::from_set(name)
                .with_context(|| format!("failed to load cart {name}"))?,
            (None, None) => anyhow::bail!("either --cart or --cart-file is required"),
        };

        let store = Arc::new(store_config.build().context("invalid store configuration")?);
        let cart = cart_config
            .cart(store.currency())
            .context("invalid cart")?;

        let mut session = CheckoutSession::with_cart(store, cart);
        let mut notes = Vec::new();

        if let Some(address) = cart_config.address {
            note_correctable(session.set_address(address), &mut notes)?;
        }

        let code = if self.no_code {
            None
        } else {
            self.code.as_ref().or(cart_config.discount_code.as_ref())
        };

        if let Some(code) = code {
            note_correctable(session.apply_discount(code), &mut notes)?;
        }

        Ok(PreparedOrder { session, notes })
    }
}

/// Keep going on problems the customer could fix, recording them as notes.
fn note_correctable<T>(
    result: Result<T, CheckoutError>,
    notes: &mut Vec<String>,
) -> anyhow::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(error) if error.is_user_correctable() => {
            warn!(%error, "customer input rejected");

            notes.push(error.to_string());

            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

fn write_yaml(out: &mut impl io::Write, value: &impl Serialize) -> anyhow::Result<()> {
    let yaml = serde_norway::to_string(value)?;

    out.write_all(yaml.as_bytes())?;

    Ok(())
}
