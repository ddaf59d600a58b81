//! Read pipeline: record lookup plus a pull-driven content stream.
//!
//! The stream never buffers more than one chunk; each pull walks the chunk
//! range through the pager and rate-ticks. The first pull takes a per-client
//! request slot, and end-of-range, a pull error, or dropping the stream gives
//! it back.

use super::{FileRecord, FileStore, PAGE_SIZE, Shared, keys};
use crate::error::StoreError;
use crate::kv::{KvPager, ListSelector};
use crate::limit::RateLimiter;
use crate::options::ReadOptions;
use crate::progress::FileStatus;
use bytes::Bytes;
use std::sync::Arc;

/// What a read hands back: the record with its lazy content, the in-flight
/// status of a concurrent operation, or nothing.
pub enum ReadOutcome {
    Found {
        record: FileRecord,
        content: ContentStream,
    },
    Status(FileStatus),
    NotFound,
}

impl ReadOutcome {
    pub fn found(self) -> Option<(FileRecord, ContentStream)> {
        match self {
            ReadOutcome::Found { record, content } => Some((record, content)),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReadOutcome::NotFound)
    }

    pub fn status(&self) -> Option<&FileStatus> {
        match self {
            ReadOutcome::Status(status) => Some(status),
            _ => None,
        }
    }
}

/// Lazy, pull-driven byte producer over a file's chunk range.
pub struct ContentStream {
    shared: Arc<Shared>,
    pager: KvPager,
    limiter: RateLimiter,
    client: Option<String>,
    max_client_requests: Option<u64>,
    slot_held: bool,
    started: bool,
    finished: bool,
}

impl ContentStream {
    pub(crate) fn new(shared: Arc<Shared>, uri: &str, options: &ReadOptions) -> Self {
        let pager = KvPager::new(
            shared.kv.clone(),
            ListSelector::Prefix(keys::chunk_prefix(uri)),
            PAGE_SIZE,
        );
        Self {
            shared,
            pager,
            limiter: RateLimiter::new(options.chunks_per_second),
            client: options.client_id.clone(),
            max_client_requests: options.max_client_requests,
            slot_held: false,
            started: false,
            finished: false,
        }
    }

    /// Pull the next chunk; `None` once the range is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StoreError> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            if let Some(client) = self.client.clone() {
                let count = self.shared.registry.acquire_slot(&client);
                self.slot_held = true;
                if let Some(max) = self.max_client_requests
                    && count > max
                {
                    self.finish();
                    return Err(StoreError::ConcurrencyCap(max));
                }
            }
        }
        self.limiter.tick().await;
        match self.pager.next_entry().await {
            Ok(Some(entry)) => Ok(Some(entry.value)),
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(err) => {
                self.finish();
                Err(err.into())
            }
        }
    }

    /// Drain the stream into one buffer.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Drain and decode as UTF-8.
    pub async fn read_to_string(self) -> Result<String, StoreError> {
        let raw = self.read_to_end().await?;
        String::from_utf8(raw).map_err(|err| {
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        if self.slot_held {
            self.slot_held = false;
            if let Some(client) = &self.client {
                self.shared.registry.release_slot(client);
            }
        }
    }
}

impl Drop for ContentStream {
    fn drop(&mut self) {
        // A consumer that walks away mid-stream still gives its slot back.
        self.finish();
    }
}

impl FileStore {
    /// Look up the record at `options.path` and attach a lazy content
    /// stream.
    ///
    /// A read for a path whose save or delete is in flight returns that
    /// operation's status, even when a prior record exists under the path.
    pub async fn read(&self, options: ReadOptions) -> ReadOutcome {
        let uri = options.path.encode();
        if let Some(status) = self.shared.registry.status(&uri) {
            return ReadOutcome::Status(status);
        }
        if !options.access_allowed() {
            return ReadOutcome::Status(
                self.emit_error(&options.path, StoreError::Forbidden.to_string()),
            );
        }
        match self.load_record(&options.path).await {
            Ok(Some(record)) => ReadOutcome::Found {
                content: ContentStream::new(self.shared.clone(), &uri, &options),
                record,
            },
            Ok(None) => ReadOutcome::NotFound,
            Err(err) => ReadOutcome::Status(self.emit_error(&options.path, err.to_string())),
        }
    }
}
