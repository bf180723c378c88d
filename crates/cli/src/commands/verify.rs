//! Verify a package against a stored manifest

use std::path::PathBuf;

use clap::Args;
use packhash_common::{ManifestBuilder, PackageManifest};
use tracing::debug;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct VerifyArgs {
    /// Package directory or zip archive
    #[arg(required = true)]
    pub path: PathBuf,

    /// Previously written manifest; a missing file counts as empty
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Also require this package hash
    #[arg(long)]
    pub expect_hash: Option<String>,
}

/// Returns whether the package matched
pub async fn execute(
    args: VerifyArgs,
    builder: &ManifestBuilder,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let stored = match tokio::fs::read_to_string(&args.manifest).await {
        Ok(text) => PackageManifest::deserialize(&text),
        Err(e) => {
            debug!("No stored manifest at {}: {}", args.manifest.display(), e);
            output::print_warning(&format!(
                "{} not readable, comparing against an empty manifest",
                args.manifest.display()
            ));
            PackageManifest::new()
        }
    };

    let current = builder.build(&args.path).await?;
    let diff = stored.diff(&current);
    let package_hash = current.compute_aggregate_digest();

    output::print_diff(&diff, format);

    let mut matched = diff.is_empty();
    if let Some(ref expected) = args.expect_hash {
        if !expected.eq_ignore_ascii_case(&package_hash) {
            output::print_error(&format!(
                "Package hash mismatch: expected {}, got {}",
                expected, package_hash
            ));
            matched = false;
        }
    }

    if matched {
        if !matches!(format, OutputFormat::Json) {
            output::print_success(&format!("Package matches ({})", package_hash));
        }
    } else {
        output::print_error("Package content differs from manifest");
    }

    Ok(matched)
}
