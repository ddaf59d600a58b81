//! Chunking: fixed 64 KiB framing between byte inputs and the substrate.
//!
//! The key layout depends on every stored chunk except the last being exactly
//! [`CHUNK_SIZE`] bytes, so the stream adapter refills its buffer with
//! repeated short reads instead of propagating the reader's natural framing.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Fixed chunk size (64 KiB), the substrate's value cap minus overhead.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Polymorphic save input: owned bytes, text, or a streaming reader.
pub enum Content {
    Bytes(Bytes),
    Text(String),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Content::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            Content::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Bytes> for Content {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}

impl From<&[u8]> for Content {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Box<dyn AsyncRead + Send + Unpin>> for Content {
    fn from(r: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self::Reader(r)
    }
}

enum Source {
    Buffered(Bytes),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

/// Lazy sequence of chunks cut from a [`Content`].
///
/// Every yielded chunk is exactly [`CHUNK_SIZE`] bytes except possibly the
/// last; empty inputs yield nothing.
pub struct ChunkStream {
    source: Source,
    done: bool,
}

impl ChunkStream {
    pub fn new(content: Content) -> Self {
        let source = match content {
            Content::Bytes(b) => Source::Buffered(b),
            Content::Text(s) => Source::Buffered(Bytes::from(s.into_bytes())),
            Content::Reader(r) => Source::Reader(r),
        };
        Self { source, done: false }
    }

    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        match &mut self.source {
            Source::Buffered(rest) => {
                if rest.is_empty() {
                    self.done = true;
                    return Ok(None);
                }
                let take = rest.len().min(CHUNK_SIZE);
                Ok(Some(rest.split_to(take)))
            }
            Source::Reader(reader) => {
                let mut buf = vec![0u8; CHUNK_SIZE];
                let mut filled = 0;
                // Fill the whole chunk before yielding; readers are free to
                // hand back arbitrarily short reads.
                while filled < CHUNK_SIZE {
                    let n = reader.read(&mut buf[filled..]).await?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                if filled == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if filled < CHUNK_SIZE {
                    self.done = true;
                    buf.truncate(filled);
                }
                Ok(Some(Bytes::from(buf)))
            }
        }
    }
}
