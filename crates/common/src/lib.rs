//! Packhash Common Library
//!
//! Content identity for packages. Builds a path to SHA-256 manifest from a
//! directory tree or a zip archive and reduces it to one aggregate digest
//! that is independent of entry order and container format.

pub mod archive;
pub mod builder;
pub mod config;
pub mod digest;
pub mod error;
pub mod filter;
pub mod manifest;
pub mod walk;

// Re-export commonly used types
pub use archive::{ArchiveEntry, ArchiveReader, ZipArchiveReader};
pub use builder::{ArchiveOutcome, ManifestBuilder};
pub use config::BuilderConfig;
pub use digest::StreamDigester;
pub use error::{Error, Result};
pub use filter::{EntryFilter, IgnoreRules};
pub use manifest::{ManifestDiff, PackageManifest};
pub use walk::{FileOpener, FsOpener};

/// Packhash version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".packhash")
        .join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
