//! Streaming SHA-256 digests
//!
//! Every digest in a manifest, and the aggregate digest itself, comes from
//! here: SHA-256 rendered as 64 lowercase hex characters.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default read chunk size (64KB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Computes one digest per stream.
///
/// Holds no hashing state between calls; each [`StreamDigester::digest`]
/// starts from a fresh hasher, so one digester can be shared across tasks.
#[derive(Debug, Clone, Copy)]
pub struct StreamDigester {
    buffer_size: usize,
}

impl StreamDigester {
    /// Create a digester reading in chunks of `buffer_size` bytes
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Consume `reader` to the end and return its hex digest.
    ///
    /// A read error aborts the digest; nothing partial is returned.
    pub async fn digest<R>(&self, mut reader: R) -> std::io::Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Digest a single file on disk
    pub async fn digest_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = fs::File::open(path)
            .await
            .map_err(|e| Error::stream_read(label.clone(), e))?;
        self.digest(file)
            .await
            .map_err(|e| Error::stream_read(label, e))
    }

    /// Digest an in-memory buffer
    pub fn digest_bytes(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

impl Default for StreamDigester {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Whether `value` has the shape of a digest produced here
pub fn is_digest_hex(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    /// Yields some bytes, then fails
    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_digest_known_value() {
        let digest = StreamDigester::default().digest(&b"hello"[..]).await.unwrap();
        assert_eq!(digest, HELLO_SHA256);
        assert!(is_digest_hex(&digest));
    }

    #[tokio::test]
    async fn test_digest_empty_stream() {
        let digest = StreamDigester::default().digest(&b""[..]).await.unwrap();
        assert_eq!(digest, EMPTY_SHA256);
    }

    #[tokio::test]
    async fn test_small_buffer_matches_bytes() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let streamed = StreamDigester::new(7).digest(data.as_slice()).await.unwrap();
        assert_eq!(streamed, StreamDigester::digest_bytes(&data));
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let err = StreamDigester::default()
            .digest(FailingReader { sent: false })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_back_to_back_digests_are_isolated() {
        let digester = StreamDigester::default();
        let _ = digester.digest(&b"something else"[..]).await.unwrap();
        let digest = digester.digest(&b"hello"[..]).await.unwrap();
        assert_eq!(digest, HELLO_SHA256);
    }

    #[tokio::test]
    async fn test_digest_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let digest = StreamDigester::default().digest_file(&path).await.unwrap();
        assert_eq!(digest, HELLO_SHA256);
    }

    #[tokio::test]
    async fn test_digest_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = StreamDigester::default()
            .digest_file(tmp.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamRead { .. }));
    }

    #[test]
    fn test_is_digest_hex() {
        assert!(is_digest_hex(EMPTY_SHA256));
        assert!(!is_digest_hex(&EMPTY_SHA256.to_uppercase()));
        assert!(!is_digest_hex("abc"));
    }
}
