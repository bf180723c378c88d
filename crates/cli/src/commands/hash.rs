//! Manifest and package hash commands

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use packhash_common::ManifestBuilder;
use serde::Serialize;
use tracing::info;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HashArgs {
    /// Package directory or zip archive
    #[arg(required = true)]
    pub path: PathBuf,

    /// Write the serialized manifest to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print only the package hash
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct FileArgs {
    /// File to digest
    #[arg(required = true)]
    pub path: PathBuf,
}

#[derive(Serialize)]
struct HashReport<'a> {
    path: String,
    package_hash: String,
    files: &'a BTreeMap<String, String>,
}

pub async fn execute(
    args: HashArgs,
    builder: &ManifestBuilder,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let manifest = builder.build(&args.path).await?;
    let package_hash = manifest.compute_aggregate_digest();

    if let Some(ref out) = args.output {
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(out, manifest.serialize()).await?;
        info!("Wrote manifest to {}", out.display());
    }

    if args.quiet {
        println!("{}", package_hash);
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let report = HashReport {
                path: args.path.display().to_string(),
                package_hash,
                files: manifest.digests_by_path(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            output::print_list(&output::entry_rows(&manifest), format);
            output::print_field("Files", &manifest.len().to_string(), format);
            output::print_field("Package hash", &package_hash, format);
        }
    }

    Ok(())
}

pub async fn execute_file(
    args: FileArgs,
    builder: &ManifestBuilder,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let digest = builder.digester().digest_file(&args.path).await?;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "path": args.path.display().to_string(),
                "sha256": digest,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => println!("{}  {}", digest, args.path.display()),
        OutputFormat::Table => output::print_field(&args.path.display().to_string(), &digest, format),
    }

    Ok(())
}
