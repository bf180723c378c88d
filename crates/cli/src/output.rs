//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use packhash_common::{ManifestDiff, PackageManifest};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One manifest entry
#[derive(Debug, Clone, Serialize)]
pub struct EntryRow {
    pub path: String,
    pub digest: String,
}

impl TableDisplay for EntryRow {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "SHA-256"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.path.clone(), self.digest.clone()]
    }
}

/// Rows for every entry of `manifest`, sorted by path
pub fn entry_rows(manifest: &PackageManifest) -> Vec<EntryRow> {
    manifest
        .digests_by_path()
        .iter()
        .map(|(path, digest)| EntryRow {
            path: path.clone(),
            digest: digest.clone(),
        })
        .collect()
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No entries.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for item in items {
                println!("{}", item.row().join("  "));
            }
        }
    }
}

/// Print the paths that differ between two manifests
pub fn print_diff(diff: &ManifestDiff, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(diff).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for path in &diff.added {
                println!("A {}", path);
            }
            for path in &diff.removed {
                println!("D {}", path);
            }
            for path in &diff.changed {
                println!("M {}", path);
            }
        }
        OutputFormat::Table => {
            if diff.is_empty() {
                println!("{}", "No content changes".green());
                return;
            }
            for path in &diff.added {
                println!("  {} {}", "+".green().bold(), path.green());
            }
            for path in &diff.removed {
                println!("  {} {}", "-".red().bold(), path.red());
            }
            for path in &diff.changed {
                println!("  {} {}", "~".yellow().bold(), path.yellow());
            }
            println!(
                "{} added, {} removed, {} changed",
                diff.added.len(),
                diff.removed.len(),
                diff.changed.len()
            );
        }
    }
}

/// Print a labelled value, plain when machine-readable output is requested
pub fn print_field(label: &str, value: &str, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{} {}", format!("{}:", label).bold(), value),
        _ => println!("{}: {}", label, value),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", message);
}
