//! Directory listing and recursive delete.
//!
//! Directories are not stored: the flat `("files", …)` keyspace already
//! enumerates every descendant of a prefix in order, so both operations are
//! paginated scans.

use super::read::ContentStream;
use super::{FileRecord, FileStore, PAGE_SIZE, keys};
use crate::error::StoreError;
use crate::kv::{KvPager, ListSelector};
use crate::limit::RateLimiter;
use crate::options::ReadOptions;
use crate::progress::{FileStatus, OpState};
use tracing::debug;

/// One listed entry: a stored file with its lazy content, or the status of
/// an operation currently touching (or failing under) that path.
pub enum DirEntry {
    File {
        record: FileRecord,
        content: ContentStream,
    },
    Status(FileStatus),
}

impl DirEntry {
    pub fn record(&self) -> Option<&FileRecord> {
        match self {
            DirEntry::File { record, .. } => Some(record),
            DirEntry::Status(_) => None,
        }
    }

    pub fn status(&self) -> Option<&FileStatus> {
        match self {
            DirEntry::File { .. } => None,
            DirEntry::Status(status) => Some(status),
        }
    }
}

/// A directory page. `total_size` sums stored sizes plus the progress of
/// in-flight saves (deletes are not counted). `cursor` is present when
/// pagination was requested and more entries remain.
pub struct DirList {
    pub entries: Vec<DirEntry>,
    pub total_size: u64,
    pub cursor: Option<String>,
}

impl DirList {
    fn error(status: FileStatus) -> Self {
        Self {
            entries: vec![DirEntry::Status(status)],
            total_size: 0,
            cursor: None,
        }
    }
}

impl FileStore {
    /// List every file under `options.path`. With `pagination` set, stops
    /// after one page of 1000 entries and returns a resumption `cursor`;
    /// pass it back through `options.cursor` to continue.
    pub async fn read_dir(&self, options: ReadOptions) -> DirList {
        if !options.access_allowed() {
            return DirList::error(
                self.emit_error(&options.path, StoreError::Forbidden.to_string()),
            );
        }

        let selector = ListSelector::Prefix(keys::files_prefix(&options.path));
        let mut pager = KvPager::resume(
            self.shared.kv.clone(),
            selector,
            PAGE_SIZE,
            options.cursor.clone(),
        );
        let mut limiter = RateLimiter::new(options.max_dir_entries_per_second);

        let mut entries = Vec::new();
        let mut total_size = 0u64;
        let mut cursor = None;
        loop {
            let entry = match pager.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    entries.push(DirEntry::Status(
                        self.emit_error(&options.path, err.to_string()),
                    ));
                    break;
                }
            };
            let record: FileRecord = match serde_json::from_slice(&entry.value) {
                Ok(record) => record,
                Err(err) => {
                    entries.push(DirEntry::Status(
                        self.emit_error(&options.path, err.to_string()),
                    ));
                    break;
                }
            };

            match self.shared.registry.status(&record.uri) {
                Some(status) => {
                    if status.state == OpState::Saving {
                        total_size += status.progress;
                    }
                    entries.push(DirEntry::Status(status));
                }
                None => {
                    total_size += record.size;
                    let content =
                        ContentStream::new(self.shared.clone(), &record.uri, &options);
                    entries.push(DirEntry::File { record, content });
                }
            }

            limiter.tick().await;

            if options.pagination && entries.len() == PAGE_SIZE {
                cursor = pager.cursor().map(str::to_string);
                break;
            }
        }

        debug!(path = %options.path, entries = entries.len(), "read_dir");
        DirList {
            entries,
            total_size,
            cursor,
        }
    }

    /// Delete every file under `options.path`, one `delete` per entry, and
    /// collect the statuses of the entries that did not complete cleanly.
    pub async fn delete_dir(&self, options: ReadOptions) -> Vec<FileStatus> {
        if !options.access_allowed() {
            return vec![self.emit_error(&options.path, StoreError::Forbidden.to_string())];
        }

        let selector = ListSelector::Prefix(keys::files_prefix(&options.path));
        let mut pager = KvPager::new(self.shared.kv.clone(), selector, PAGE_SIZE);
        let mut limiter = RateLimiter::new(options.max_dir_entries_per_second);

        let mut statuses = Vec::new();
        loop {
            let entry = match pager.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    statuses.push(self.emit_error(&options.path, err.to_string()));
                    break;
                }
            };
            let record: FileRecord = match serde_json::from_slice(&entry.value) {
                Ok(record) => record,
                Err(err) => {
                    statuses.push(self.emit_error(&options.path, err.to_string()));
                    break;
                }
            };

            let per_file = ReadOptions {
                path: record.path,
                cursor: None,
                pagination: false,
                ..options.clone()
            };
            if let Some(status) = self.delete(per_file).await {
                statuses.push(status);
            }

            limiter.tick().await;
        }
        statuses
    }
}
