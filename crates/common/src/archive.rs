//! Archive reading
//!
//! [`ArchiveReader`] is the lazy, one-entry-at-a-time protocol the manifest
//! builder drives. [`ZipArchiveReader`] implements it over the `zip` crate.
//!
//! Entry descriptors come out strictly in archive order, but each opened
//! entry stream is independent of the reader: it keeps producing bytes
//! after the reader has moved on to later entries.

use crate::filter::is_regular_mode;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tracing::debug;
use zip::ZipArchive;

/// Chunks buffered between a zip decoder thread and its reader
const STREAM_BACKLOG: usize = 4;

/// Byte stream of one archive entry
pub type EntryStream = Pin<Box<dyn AsyncRead + Send>>;

/// One entry descriptor, as stored in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the archive's entry order
    pub index: usize,

    /// Archive-relative path, forward-slash separated
    pub path: String,

    /// Whether the archive marks this entry as a directory
    pub is_dir: bool,

    /// Stored unix mode, if the archive carries one
    pub unix_mode: Option<u32>,
}

impl ArchiveEntry {
    /// See [`is_regular_mode`]
    pub fn is_regular_file(&self) -> bool {
        is_regular_mode(self.unix_mode)
    }
}

/// Lazy archive container
#[async_trait]
pub trait ArchiveReader: Send {
    /// Fetch the next entry descriptor, or `None` once the archive is exhausted
    async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>>;

    /// Open a read stream for `entry`
    async fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<EntryStream>;

    /// Release the container. Streams already opened may still be drained.
    async fn close(&mut self) -> Result<()>;
}

/// Seekable archive file where every clone reads through its own handle.
///
/// A clone starts at its parent's position and opens the file on first use,
/// so entry data is always read from disk.
#[derive(Debug)]
struct ArchiveFile {
    path: Arc<PathBuf>,
    file: Option<File>,
    pos: u64,
}

impl ArchiveFile {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            file: Some(File::open(path)?),
            pos: 0,
        })
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let mut file = File::open(self.path.as_path())?;
                file.seek(SeekFrom::Start(self.pos))?;
                file
            }
        };
        Ok(self.file.insert(file))
    }
}

impl Clone for ArchiveFile {
    fn clone(&self) -> Self {
        Self {
            path: Arc::clone(&self.path),
            file: None,
            pos: self.pos,
        }
    }
}

impl Read for ArchiveFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.handle()?.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ArchiveFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.handle()?.seek(pos)?;
        Ok(self.pos)
    }
}

/// Zip container read from disk.
///
/// Only the central directory is held in memory. Cloning the underlying
/// [`ZipArchive`] shares it, and each entry decodes on its own thread with
/// its own file handle.
pub struct ZipArchiveReader {
    archive: Option<ZipArchive<ArchiveFile>>,
    next_index: usize,
    buffer_size: usize,
}

impl ZipArchiveReader {
    /// Open `path` as a zip archive.
    ///
    /// Returns `Ok(None)` when the file cannot be read as a zip container at
    /// all; callers treat that as "not an archive", not as a failure.
    pub async fn open(path: impl AsRef<Path>, buffer_size: usize) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        let archive = tokio::task::spawn_blocking({
            let path = path.clone();
            move || -> zip::result::ZipResult<ZipArchive<ArchiveFile>> {
                ZipArchive::new(ArchiveFile::open(&path)?)
            }
        })
        .await?;

        match archive {
            Ok(archive) => {
                debug!("Opened zip archive {} ({} entries)", path.display(), archive.len());
                Ok(Some(Self {
                    archive: Some(archive),
                    next_index: 0,
                    buffer_size: buffer_size.max(1),
                }))
            }
            Err(e) => {
                debug!("{} is not a zip archive: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn archive_mut(&mut self) -> Result<&mut ZipArchive<ArchiveFile>> {
        self.archive
            .as_mut()
            .ok_or_else(|| Error::ArchiveProtocol("archive already closed".to_string()))
    }
}

#[async_trait]
impl ArchiveReader for ZipArchiveReader {
    async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let index = self.next_index;
        let archive = self.archive_mut()?;
        if index >= archive.len() {
            return Ok(None);
        }

        let file = archive.by_index_raw(index)?;
        let entry = ArchiveEntry {
            index,
            path: file.name().to_string(),
            is_dir: file.is_dir(),
            unix_mode: file.unix_mode(),
        };
        drop(file);

        self.next_index += 1;
        Ok(Some(entry))
    }

    async fn open_entry(&mut self, entry: &ArchiveEntry) -> Result<EntryStream> {
        let buffer_size = self.buffer_size;
        if entry.index >= self.next_index {
            return Err(Error::ArchiveProtocol(format!(
                "entry {} opened before it was read",
                entry.path
            )));
        }

        // Unsupported compression, encryption or a vanished file surfaces as
        // the stream's first read error.
        let mut archive = self.archive_mut()?.clone();
        let index = entry.index;
        let (tx, rx) = mpsc::channel(STREAM_BACKLOG);
        tokio::task::spawn_blocking(move || pump_entry(&mut archive, index, buffer_size, &tx));

        let chunks = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        Ok(Box::pin(StreamReader::new(chunks)))
    }

    async fn close(&mut self) -> Result<()> {
        if self.archive.take().is_some() {
            debug!("Closed zip archive after {} entries", self.next_index);
        }
        Ok(())
    }
}

/// Decode one entry into `tx` until it ends, fails, or the reader goes away
fn pump_entry(
    archive: &mut ZipArchive<ArchiveFile>,
    index: usize,
    buffer_size: usize,
    tx: &mpsc::Sender<io::Result<Bytes>>,
) {
    let mut file = match archive.by_index(index) {
        Ok(file) => file,
        Err(e) => {
            let _ = tx.blocking_send(Err(e.into()));
            return;
        }
    };

    let mut buffer = vec![0u8; buffer_size];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => return,
            Ok(n) => {
                if tx
                    .blocking_send(Ok(Bytes::copy_from_slice(&buffer[..n])))
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::StreamDigester;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        zip.add_directory("docs/", SimpleFileOptions::default()).unwrap();
        for (name, data) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn test_entries_in_archive_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pkg.zip");
        write_zip(&path, &[("docs/b.txt", &b"b"[..]), ("a.txt", &b"a"[..])]);

        let mut reader = ZipArchiveReader::open(&path, 1024).await.unwrap().unwrap();
        let mut seen = Vec::new();
        while let Some(entry) = reader.next_entry().await.unwrap() {
            seen.push((entry.path.clone(), entry.is_dir, entry.is_regular_file()));
        }

        assert_eq!(
            seen,
            vec![
                ("docs/".to_string(), true, false),
                ("docs/b.txt".to_string(), false, true),
                ("a.txt".to_string(), false, true),
            ]
        );
        reader.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_streams_outlive_advancement() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pkg.zip");
        let big = vec![7u8; 200_000];
        write_zip(&path, &[("big.bin", big.as_slice()), ("small.txt", &b"hello"[..])]);

        let mut reader = ZipArchiveReader::open(&path, 4096).await.unwrap().unwrap();
        let _dir = reader.next_entry().await.unwrap().unwrap();
        let big_entry = reader.next_entry().await.unwrap().unwrap();
        let big_stream = reader.open_entry(&big_entry).await.unwrap();
        let small_entry = reader.next_entry().await.unwrap().unwrap();
        let small_stream = reader.open_entry(&small_entry).await.unwrap();
        assert!(reader.next_entry().await.unwrap().is_none());
        reader.close().await.unwrap();

        let digester = StreamDigester::default();
        assert_eq!(
            digester.digest(small_stream).await.unwrap(),
            StreamDigester::digest_bytes(b"hello")
        );
        assert_eq!(
            digester.digest(big_stream).await.unwrap(),
            StreamDigester::digest_bytes(&big)
        );
    }

    #[tokio::test]
    async fn test_entry_data_is_read_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pkg.zip");
        let big = vec![3u8; 1 << 20];
        write_zip(&path, &[("big.bin", big.as_slice())]);

        let mut reader = ZipArchiveReader::open(&path, 4096).await.unwrap().unwrap();
        let _dir = reader.next_entry().await.unwrap().unwrap();
        let entry = reader.next_entry().await.unwrap().unwrap();

        // Only the central directory was loaded; the entry bytes are gone now
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(0)
            .unwrap();

        let stream = reader.open_entry(&entry).await.unwrap();
        assert!(StreamDigester::default().digest(stream).await.is_err());
        reader.close().await.unwrap();
    }

    #[test]
    fn test_archive_file_clones_read_independently() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut file = ArchiveFile::open(&path).unwrap();
        file.seek(SeekFrom::Start(4)).unwrap();
        let mut copy = file.clone();

        let mut buf = [0u8; 3];
        copy.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"456");
        file.read_exact(&mut buf[..2]).unwrap();
        assert_eq!(&buf[..2], b"45");
        assert_eq!(copy.seek(SeekFrom::Current(0)).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_text_file_is_not_an_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "just some text").unwrap();

        assert!(ZipArchiveReader::open(&path, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_archive() {
        let tmp = TempDir::new().unwrap();
        assert!(ZipArchiveReader::open(tmp.path().join("nope.zip"), 1024)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_use_after_close_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pkg.zip");
        write_zip(&path, &[("a.txt", &b"a"[..])]);

        let mut reader = ZipArchiveReader::open(&path, 1024).await.unwrap().unwrap();
        reader.close().await.unwrap();
        assert!(matches!(
            reader.next_entry().await,
            Err(Error::ArchiveProtocol(_))
        ));
    }
}
