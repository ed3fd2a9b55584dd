//! `sgate` -- CLI binary for the stratagate provider gateway.
//!
//! Provides the following subcommands:
//!
//! - `sgate generate` -- Send a prompt through the provider fallback chain.
//! - `sgate chunk` -- Show how a file would be split into chunks.
//! - `sgate estimate` -- Estimate the token count of a file.
//! - `sgate status` -- Show configuration, key availability and TPM usage.

use clap::{Parser, Subcommand};

mod commands;

/// stratagate provider gateway CLI.
#[derive(Parser)]
#[command(name = "sgate", about = "stratagate provider gateway CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Generate text for a prompt.
    Generate(commands::generate::GenerateArgs),

    /// Split a file into provider-sized chunks.
    Chunk(commands::chunk::ChunkArgs),

    /// Estimate the token count of a file.
    Estimate(commands::estimate::EstimateArgs),

    /// Show configuration status.
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate(args) => commands::generate::run(args, &config).await?,
        Commands::Chunk(args) => commands::chunk::run(args, &config)?,
        Commands::Estimate(args) => commands::estimate::run(args, &config)?,
        Commands::Status(args) => commands::status::run(args, &config, cli.config.as_deref())?,
    }

    Ok(())
}
