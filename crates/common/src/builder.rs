//! Manifest building
//!
//! Produces a [`PackageManifest`] from either a directory tree or a zip
//! archive. Both paths apply the same [`EntryFilter`] and the same
//! [`StreamDigester`], so the same file set yields the same manifest in
//! either format.
//!
//! Archive mode walks entries strictly one at a time: the next descriptor
//! is requested as soon as the current entry's stream is open, while that
//! stream is digested on its own task. The build is done once the archive
//! reports its end and every digest task has finished. The first failure
//! ends the build; outstanding digest tasks are aborted with it.

use crate::archive::{ArchiveEntry, ArchiveReader, ZipArchiveReader};
use crate::config::BuilderConfig;
use crate::digest::StreamDigester;
use crate::filter::EntryFilter;
use crate::manifest::PackageManifest;
use crate::walk::{walk_files, FileOpener, FsOpener};
use crate::{Error, Result};
use futures::{StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Result of building from a candidate archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The input was an archive and every content entry was digested
    Built(PackageManifest),

    /// The input could not be opened as an archive container
    NotAnArchive,
}

/// A finished digest: archive position, path, hex digest
type EntryDigest = (usize, String, String);

/// Builds manifests according to a [`BuilderConfig`]
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    config: BuilderConfig,
    filter: EntryFilter,
    digester: StreamDigester,
}

impl ManifestBuilder {
    /// Create a builder, rejecting unusable configuration
    pub fn new(config: BuilderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: EntryFilter::new(config.ignore.clone()),
            digester: StreamDigester::new(config.buffer_size),
            config,
        })
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn digester(&self) -> &StreamDigester {
        &self.digester
    }

    /// Build from a directory if `path` is one, otherwise from a zip archive
    pub async fn build(&self, path: impl AsRef<Path>) -> Result<PackageManifest> {
        let path = path.as_ref();
        if is_directory(path).await {
            return self.build_from_directory(path).await;
        }

        match self.build_from_archive(path).await? {
            ArchiveOutcome::Built(manifest) => Ok(manifest),
            ArchiveOutcome::NotAnArchive => Err(Error::InvalidInput(format!(
                "{} is neither a directory nor a zip archive",
                path.display()
            ))),
        }
    }

    /// Digest every content-bearing file below `root`
    pub async fn build_from_directory(&self, root: impl AsRef<Path>) -> Result<PackageManifest> {
        self.build_from_directory_with(root, &FsOpener).await
    }

    /// Like [`Self::build_from_directory`], reading file contents through
    /// `opener`. The first open or read failure fails the whole build.
    pub async fn build_from_directory_with<O: FileOpener>(
        &self,
        root: impl AsRef<Path>,
        opener: &O,
    ) -> Result<PackageManifest> {
        let root = root.as_ref();
        if !is_directory(root).await {
            return Err(Error::InvalidInput(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let files = walk_files(root, self.config.follow_links).await?;
        let digester = self.digester;

        let digests: BTreeMap<String, String> = futures::stream::iter(
            files
                .into_iter()
                .filter(|file| !self.skip(&file.relative, true)),
        )
        .map(move |file| async move {
            let stream = opener
                .open(&file.absolute)
                .await
                .map_err(|e| Error::stream_read(file.relative.clone(), e))?;
            let digest = digester
                .digest(stream)
                .await
                .map_err(|e| Error::stream_read(file.relative.clone(), e))?;
            debug!("Digested {}", file.relative);
            Ok::<_, Error>((file.relative, digest))
        })
        .buffer_unordered(self.config.max_concurrent_reads)
        .try_collect()
        .await?;

        let manifest = PackageManifest::from_map(digests);
        info!(
            "Built manifest for {} ({} files, package hash {})",
            root.display(),
            manifest.len(),
            manifest.compute_aggregate_digest()
        );
        Ok(manifest)
    }

    /// Digest every content-bearing entry of the zip archive at `path`.
    ///
    /// Input that does not open as a zip container is reported as
    /// [`ArchiveOutcome::NotAnArchive`] rather than an error.
    pub async fn build_from_archive(&self, path: impl AsRef<Path>) -> Result<ArchiveOutcome> {
        let path = path.as_ref();
        let Some(reader) = ZipArchiveReader::open(path, self.config.buffer_size).await? else {
            return Ok(ArchiveOutcome::NotAnArchive);
        };

        let manifest = self.build_from_reader(reader).await?;
        info!(
            "Built manifest for {} ({} entries, package hash {})",
            path.display(),
            manifest.len(),
            manifest.compute_aggregate_digest()
        );
        Ok(ArchiveOutcome::Built(manifest))
    }

    /// Drive an already opened archive to completion.
    ///
    /// The reader is closed on every exit path.
    pub async fn build_from_reader<A: ArchiveReader>(&self, mut reader: A) -> Result<PackageManifest> {
        let result = self.drain_archive(&mut reader).await;
        if let Err(e) = reader.close().await {
            warn!("Failed to close archive: {}", e);
        }
        result
    }

    async fn drain_archive<A: ArchiveReader>(&self, reader: &mut A) -> Result<PackageManifest> {
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_reads));
        let mut in_flight: JoinSet<Result<EntryDigest>> = JoinSet::new();
        let mut collected = BTreeMap::new();

        while let Some(entry) = reader.next_entry().await? {
            if entry.is_dir || self.skip(&entry.path, entry.is_regular_file()) {
                continue;
            }

            // Wait for a free slot, collecting finished digests meanwhile so
            // a failure ends the build without waiting for the rest.
            let permit = loop {
                tokio::select! {
                    permit = Arc::clone(&limit).acquire_owned() => {
                        break permit.map_err(|e| Error::Internal(e.to_string()))?;
                    }
                    Some(done) = in_flight.join_next() => record(&mut collected, done)?,
                }
            };

            let stream = reader.open_entry(&entry).await?;
            let digester = self.digester;
            let ArchiveEntry { index, path, .. } = entry;
            in_flight.spawn(async move {
                let _permit = permit;
                let digest = digester
                    .digest(stream)
                    .await
                    .map_err(|e| Error::stream_read(path.clone(), e))?;
                debug!("Digested {}", path);
                Ok((index, path, digest))
            });
        }

        while let Some(done) = in_flight.join_next().await {
            record(&mut collected, done)?;
        }

        Ok(collected
            .into_iter()
            .map(|(path, (_, digest))| (path, digest))
            .collect())
    }

    fn skip(&self, path: &str, is_regular_file: bool) -> bool {
        let ignored = self.filter.is_ignored(path, is_regular_file);
        if ignored {
            debug!("Ignoring {}", path);
        }
        ignored
    }
}

/// Fold one finished digest task into `collected`.
///
/// A path stored twice keeps the entry that comes later in the archive,
/// whichever digest finished first.
fn record(
    collected: &mut BTreeMap<String, (usize, String)>,
    done: std::result::Result<Result<EntryDigest>, JoinError>,
) -> Result<()> {
    let (index, path, digest) = done??;
    let earlier = collected.get(&path).map(|(existing, _)| *existing < index);
    if earlier.is_some() {
        warn!("Archive stores {} more than once; keeping the later entry", path);
    }
    if earlier != Some(false) {
        collected.insert(path, (index, digest));
    }
    Ok(())
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
