// PageLens Gateway - Main Entry Point
//
// Serves the analysis API behind per-tenant admission control and the
// result cache.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pagelens_gateway::{config::Config, http, logging};
use std::path::PathBuf;
use tracing::info;

/// PageLens: request governance for the page analysis API
#[derive(Parser, Debug)]
#[command(name = "pagelens")]
#[command(author = "PageLens Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Tenant-aware admission control and result caching for page analysis", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a TOML config file (defaults to the XDG config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway (default)
    Serve,
    /// Validate the configuration and print it as JSON
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            logging::init(&config.logging, args.verbose)?;
            info!("PageLens gateway v{} starting...", env!("CARGO_PKG_VERSION"));
            http::serve(config).await?;
        }
        Commands::CheckConfig => {
            let rendered =
                serde_json::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
    }

    Ok(())
}
