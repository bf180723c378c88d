//! Entry filtering
//!
//! Decides which archive or directory entries are platform metadata rather
//! than package content. Archive mode and directory mode share one filter so
//! both produce the same key set for the same files.

use serde::{Deserialize, Serialize};

/// File type mask of a unix mode
pub const S_IFMT: u32 = 0o170000;
/// Regular file type bits
pub const S_IFREG: u32 = 0o100000;
/// Directory type bits
pub const S_IFDIR: u32 = 0o040000;

/// Names of metadata entries to exclude
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRules {
    /// Top-level directories whose whole subtree is ignored
    pub root_dirs: Vec<String>,

    /// File names ignored at any depth (regular files only)
    pub file_names: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            root_dirs: vec!["__MACOSX".to_string()],
            file_names: vec![".DS_Store".to_string()],
        }
    }
}

/// Pure predicate over entry paths
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    rules: IgnoreRules,
}

impl EntryFilter {
    pub fn new(rules: IgnoreRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    /// Whether the entry at `path` (forward-slash separated, relative)
    /// should be left out of the manifest.
    pub fn is_ignored(&self, path: &str, is_regular_file: bool) -> bool {
        let first = path.split('/').next().unwrap_or("");
        if self.rules.root_dirs.iter().any(|d| d == first) {
            return true;
        }

        if !is_regular_file {
            return false;
        }

        let last = path.rsplit('/').next().unwrap_or("");
        self.rules.file_names.iter().any(|n| n == last)
    }
}

/// Regular-file test for an entry's stored unix mode.
///
/// Only the file type bits matter. An entry without a mode, or whose mode
/// carries no type bits, is not provably a regular file, so the file name
/// rules never drop it.
pub fn is_regular_mode(unix_mode: Option<u32>) -> bool {
    unix_mode.is_some_and(|m| m & S_IFMT == S_IFREG)
}
