//! Tally command line
//!
//! Quotes carts against a store configuration and runs checkouts against a
//! stand-in payment processor.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use crate::cli::Cli;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(init_error) = cli.init_logging() {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized, must use eprintln for setup errors"
        )]
        {
            eprintln!("{init_error:#}");
        }

        return ExitCode::FAILURE;
    }

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(run_error) => {
            error!("{run_error:#}");

            #[expect(
                clippy::print_stderr,
                reason = "errors are reported to the terminal regardless of log level"
            )]
            {
                eprintln!("error: {run_error:#}");
            }

            ExitCode::FAILURE
        }
    }
}
