//! Binary crate for the `geoloc` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Loading `.env` and setting up logging
//! - Interactive configuration

use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the key may come from the shell or the config file.
    dotenvy::dotenv().ok();

    let cmd = cli::Cli::parse();
    logging::init(cmd.verbose);
    cmd.run().await
}
