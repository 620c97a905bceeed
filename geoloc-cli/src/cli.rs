use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use geoloc_core::{Config, LocationResolver};
use inquire::{Password, PasswordDisplayMode};
use tracing::debug;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "geoloc",
    version,
    about = "Fetch latitude, longitude and place details for city/state pairs or US ZIP codes",
    subcommand_negates_reqs = true
)]
pub struct Cli {
    /// City/state pairs ("Madison, WI") or ZIP codes ("12345").
    #[arg(long, num_args = 1.., required = true, value_name = "LOCATION")]
    pub locations: Vec<String>,

    /// Log requests and responses to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Some(Command::Configure) => configure(),
            None => lookup(&self.locations).await,
        }
    }
}

async fn lookup(locations: &[String]) -> anyhow::Result<()> {
    let config = Config::load()?.with_env_overrides()?;
    debug!(base_url = %config.base_url, timeout_secs = config.timeout_secs, "loaded config");

    let resolver = LocationResolver::from_config(&config)?;
    resolver
        .process(&mut std::io::stdout(), locations)
        .await
        .context("Failed to write results to stdout")
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.to_string());
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}
