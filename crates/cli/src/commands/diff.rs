//! Compare two packages

use std::path::PathBuf;

use clap::Args;
use packhash_common::ManifestBuilder;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct DiffArgs {
    /// Old package (directory or zip archive)
    #[arg(required = true)]
    pub old: PathBuf,

    /// New package (directory or zip archive)
    #[arg(required = true)]
    pub new: PathBuf,
}

pub async fn execute(
    args: DiffArgs,
    builder: &ManifestBuilder,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (old, new) = tokio::try_join!(builder.build(&args.old), builder.build(&args.new))?;

    if !matches!(format, OutputFormat::Json) {
        output::print_field("Old", &old.compute_aggregate_digest(), format);
        output::print_field("New", &new.compute_aggregate_digest(), format);
    }
    output::print_diff(&old.diff(&new), format);

    Ok(())
}
