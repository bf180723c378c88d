//! Packhash test fixtures
//!
//! Writes package trees and zip archives for the integration tests under
//! `tests/`. Archives are written the way common zip tools write them:
//! one directory entry per folder, unix modes on every entry.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

enum FixtureEntry {
    Dir(String),
    File {
        name: String,
        data: Vec<u8>,
        method: CompressionMethod,
    },
}

/// Zip archive described entry by entry, in archive order
#[derive(Default)]
pub struct ZipFixture {
    entries: Vec<FixtureEntry>,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory entry (`name` should end with `/`)
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(FixtureEntry::Dir(name.to_string()));
        self
    }

    /// Add a deflated file entry
    pub fn file(self, name: &str, data: impl AsRef<[u8]>) -> Self {
        self.file_with(name, data, CompressionMethod::Deflated)
    }

    /// Add an uncompressed file entry
    pub fn stored_file(self, name: &str, data: impl AsRef<[u8]>) -> Self {
        self.file_with(name, data, CompressionMethod::Stored)
    }

    fn file_with(mut self, name: &str, data: impl AsRef<[u8]>, method: CompressionMethod) -> Self {
        self.entries.push(FixtureEntry::File {
            name: name.to_string(),
            data: data.as_ref().to_vec(),
            method,
        });
        self
    }

    /// Write the archive to `path`
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let mut zip = ZipWriter::new(File::create(path)?);

        for entry in &self.entries {
            match entry {
                FixtureEntry::Dir(name) => {
                    zip.add_directory(
                        name.as_str(),
                        SimpleFileOptions::default().unix_permissions(0o755),
                    )?;
                }
                FixtureEntry::File { name, data, method } => {
                    let options = SimpleFileOptions::default()
                        .compression_method(*method)
                        .unix_permissions(0o644);
                    zip.start_file(name.as_str(), options)?;
                    zip.write_all(data)?;
                }
            }
        }

        zip.finish()?;
        Ok(())
    }
}

/// Write `files` below `root`, creating parent directories
pub fn write_tree<D: AsRef<[u8]>>(root: &Path, files: &[(&str, D)]) -> io::Result<()> {
    for (name, data) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
    }
    Ok(())
}

/// Zip up everything below `source_dir`, directories included
pub fn zip_directory(source_dir: &Path, dest: &Path) -> io::Result<()> {
    let mut fixture = ZipFixture::new();

    for entry in walkdir::WalkDir::new(source_dir)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            fixture = fixture.dir(&format!("{}/", name));
        } else if entry.file_type().is_file() {
            fixture = fixture.file(&name, fs::read(entry.path())?);
        }
    }

    fixture.write(dest)
}
