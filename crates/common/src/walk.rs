//! Directory traversal

use crate::archive::EntryStream;
use crate::{Error, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Opens walked files for digesting
#[async_trait]
pub trait FileOpener: Send + Sync {
    async fn open(&self, path: &Path) -> io::Result<EntryStream>;
}

/// Reads files straight from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

#[async_trait]
impl FileOpener for FsOpener {
    async fn open(&self, path: &Path) -> io::Result<EntryStream> {
        Ok(Box::pin(tokio::fs::File::open(path).await?))
    }
}

/// A regular file found below a package root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Root-relative path, forward-slash separated
    pub relative: String,

    /// Path usable for opening the file
    pub absolute: PathBuf,
}

/// List every regular file below `root`.
///
/// Any traversal error (unreadable directory, broken link when following
/// links) fails the walk.
pub async fn walk_files(root: &Path, follow_links: bool) -> Result<Vec<WalkedFile>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || walk_files_blocking(&root, follow_links)).await?
}

fn walk_files_blocking(root: &Path, follow_links: bool) -> Result<Vec<WalkedFile>> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .follow_links(follow_links)
        .min_depth(1)
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Traversal(format!("{}: {}", entry.path().display(), e)))?;

        files.push(WalkedFile {
            relative: to_slash_path(relative),
            absolute: entry.path().to_path_buf(),
        });
    }

    debug!("Found {} files below {}", files.len(), root.display());
    Ok(files)
}

/// Join path components with `/` regardless of platform
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_walk_lists_nested_files_only() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("b/empty")).unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        std::fs::write(tmp.path().join("b/c.txt"), "world").unwrap();

        let mut files = walk_files(tmp.path(), false).await.unwrap();
        files.sort_by(|x, y| x.relative.cmp(&y.relative));

        let relative: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(relative, vec!["a.txt", "b/c.txt"]);
        assert_eq!(files[1].absolute, tmp.path().join("b").join("c.txt"));
    }

    #[tokio::test]
    async fn test_fs_opener_reads_file() {
        use tokio::io::AsyncReadExt;

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();

        let mut stream = FsOpener.open(&tmp.path().join("a.txt")).await.unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "hello");

        let err = FsOpener.open(&tmp.path().join("missing")).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_to_slash_path() {
        let path: PathBuf = ["dir", "sub", "file.txt"].iter().collect();
        assert_eq!(to_slash_path(&path), "dir/sub/file.txt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_link_fails_when_following() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling")).unwrap();

        let files = walk_files(tmp.path(), false).await.unwrap();
        assert_eq!(files.len(), 1);

        let err = walk_files(tmp.path(), true).await.unwrap_err();
        assert!(matches!(err, Error::Traversal(_)));
    }
}
