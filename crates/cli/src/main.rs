//! Packhash CLI - Main Entry Point
//!
//! Computes, stores, and compares content identities of package
//! directories and zip archives.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use packhash_common::{BuilderConfig, ManifestBuilder};

mod commands;
mod output;

use commands::{diff, hash, verify};

/// Packhash CLI - order-independent package content hashes
#[derive(Parser)]
#[command(name = "packhash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Builder configuration file (TOML)
    #[arg(long, env = "PACKHASH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a package manifest and print its package hash
    Hash(hash::HashArgs),

    /// Check a package against a stored manifest
    Verify(verify::VerifyArgs),

    /// Show which files differ between two packages
    Diff(diff::DiffArgs),

    /// Digest a single file
    File(hash::FileArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new(log_level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(packhash_common::default_config_path);
    let config = BuilderConfig::load(&config_path)?;
    let builder = ManifestBuilder::new(config)?;

    match cli.command {
        Commands::Hash(args) => hash::execute(args, &builder, cli.format).await?,
        Commands::Verify(args) => {
            if !verify::execute(args, &builder, cli.format).await? {
                std::process::exit(1);
            }
        }
        Commands::Diff(args) => diff::execute(args, &builder, cli.format).await?,
        Commands::File(args) => hash::execute_file(args, &builder, cli.format).await?,
        Commands::Version => {
            println!("Packhash CLI v{}", packhash_common::VERSION);
            println!("Digest: SHA-256, manifests from directories and zip archives");
        }
    }

    Ok(())
}
