//! PM100 CLI - Command-line interface for PM100 controllers.
//!
//! Finds controllers on the local subnet, pushes network settings or resets
//! them, and receives the telemetry they stream back, from scripts or a
//! terminal.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::config::load_config;
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `-v`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "pm100_core=debug,pm100_cli=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let json = cli.json;
    let path = cli.config;

    match cli.command {
        Commands::Config(args) => commands::run_config(args, path, json).await,
        Commands::Scan(args) => {
            let config = load_config(path.as_deref()).await?;
            commands::run_scan(args, config.discovery, json).await
        }
        Commands::Reset(args) => {
            let config = load_config(path.as_deref()).await?;
            commands::run_reset(args, config.discovery, json).await
        }
        Commands::Update(args) => {
            let config = load_config(path.as_deref()).await?;
            commands::run_update(args, config.discovery, json).await
        }
        Commands::Serve(args) => {
            let config = load_config(path.as_deref()).await?;
            commands::run_serve(args, config.server, json).await
        }
        Commands::Interfaces => {
            let config = load_config(path.as_deref()).await?;
            commands::run_interfaces(&config.discovery, json)
        }
    }
}
