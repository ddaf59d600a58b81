//! The storage engine: save/read/list/delete orchestration over the KV
//! substrate, plus metadata access and the public status surface.
//!
//! A [`FileStore`] is a cheap clone around shared state. Construction spawns
//! the recovery sweep for unresolved markers without awaiting it; callers who
//! need a settled store (tests, mostly) await [`FileStore::recovery_finished`].

mod delete;
mod dir;
mod read;
mod recover;
mod save;

pub use dir::{DirEntry, DirList};
pub use read::{ContentStream, ReadOutcome};
pub use save::SaveOutcome;

use crate::error::{MAX_METADATA_BYTES, StoreError};
use crate::kv::{Kv, MemoryKv};
use crate::options::{Metadata, ReadOptions, SaveOptions};
use crate::path::FilePath;
use crate::progress::{FileStatus, ProgressFn, ProgressSink};
use crate::registry::InFlightRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Scan batch size for every paginated walk (chunk ranges, directory
/// listings, the recovery sweep).
pub(crate) const PAGE_SIZE: usize = 1000;

/// Markers attached to a file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFlag {
    /// The write was cut short by `max_file_size_bytes`.
    Incomplete,
}

/// The durable per-file record, created by the final put of a successful
/// save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: FilePath,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FileFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub uri: String,
}

impl FileRecord {
    pub fn is_incomplete(&self) -> bool {
        self.flags.contains(&FileFlag::Incomplete)
    }
}

/// Persisted alongside any in-flight save or delete; what the recovery sweep
/// needs to resume a delete after a crash. Streams and callbacks are elided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UnresolvedOp {
    pub path: FilePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_per_second: Option<u64>,
}

impl UnresolvedOp {
    pub fn from_save(options: &SaveOptions) -> Self {
        Self {
            path: options.path.clone(),
            client_id: options.client_id.clone(),
            chunks_per_second: options.chunks_per_second,
        }
    }

    pub fn from_read(options: &ReadOptions) -> Self {
        Self {
            path: options.path.clone(),
            client_id: options.client_id.clone(),
            chunks_per_second: options.chunks_per_second,
        }
    }

    pub fn into_delete_options(self) -> ReadOptions {
        ReadOptions {
            path: self.path,
            chunks_per_second: self.chunks_per_second,
            client_id: self.client_id,
            ..Default::default()
        }
    }
}

/// Key schema: three families under the fixed root namespace.
pub(crate) mod keys {
    use crate::kv::{KeyPart, KvKey};
    use crate::path::FilePath;

    const FILES: &str = "files";
    const CHUNKS: &str = "chunks";
    const UNRESOLVED: &str = "unresolved";

    pub fn file(path: &FilePath) -> KvKey {
        let mut key = KvKey::rooted([KeyPart::from(FILES)]);
        for segment in path.segments() {
            key = key.push(segment.clone());
        }
        key
    }

    /// Prefix covering every file record under a directory; the flat keyspace
    /// already enumerates all descendants.
    pub fn files_prefix(dir: &FilePath) -> KvKey {
        file(dir)
    }

    pub fn chunk(uri: &str, index: u64) -> KvKey {
        KvKey::rooted([KeyPart::from(CHUNKS), KeyPart::from(uri), KeyPart::from(index)])
    }

    pub fn chunk_prefix(uri: &str) -> KvKey {
        KvKey::rooted([KeyPart::from(CHUNKS), KeyPart::from(uri)])
    }

    pub fn unresolved(uri: &str) -> KvKey {
        KvKey::rooted([KeyPart::from(UNRESOLVED), KeyPart::from(uri)])
    }

    pub fn unresolved_prefix() -> KvKey {
        KvKey::rooted([KeyPart::from(UNRESOLVED)])
    }
}

pub(crate) struct Shared {
    pub kv: Arc<dyn Kv>,
    pub registry: InFlightRegistry,
    pub sink: ProgressSink,
    pub recovered: watch::Sender<bool>,
}

/// Handle to one chunked file store.
#[derive(Clone)]
pub struct FileStore {
    pub(crate) shared: Arc<Shared>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// Store over an embedded in-memory substrate.
    pub fn new() -> Self {
        Self::with_kv(Arc::new(MemoryKv::new()))
    }

    /// Store over an injected substrate. Spawns the recovery sweep for
    /// unresolved markers; must be called within a tokio runtime.
    pub fn with_kv(kv: Arc<dyn Kv>) -> Self {
        let (recovered, _) = watch::channel(false);
        let store = Self {
            shared: Arc::new(Shared {
                kv,
                registry: InFlightRegistry::default(),
                sink: ProgressSink::default(),
                recovered,
            }),
        };
        let sweeper = store.clone();
        tokio::spawn(async move {
            sweeper.sweep_unresolved().await;
            // send_replace stores the value even with no subscriber yet.
            sweeper.shared.recovered.send_replace(true);
        });
        store
    }

    /// Assign the process-wide progress callback.
    pub fn set_progress_callback(&self, callback: ProgressFn) {
        self.shared.sink.set(callback);
    }

    pub fn clear_progress_callback(&self) {
        self.shared.sink.clear();
    }

    /// Resolves once the construction-time recovery sweep has settled.
    pub async fn recovery_finished(&self) {
        let mut rx = self.shared.recovered.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// In-flight request count for a client.
    pub fn client_reqs(&self, client: &str) -> u64 {
        self.shared.registry.client_reqs(client)
    }

    /// Snapshot of every in-flight save and delete.
    pub fn all_statuses(&self) -> Vec<FileStatus> {
        self.shared.registry.all_statuses()
    }

    pub fn path_to_uri_component(path: &FilePath) -> String {
        path.encode()
    }

    pub fn uri_component_to_path(uri: &str) -> Result<FilePath, StoreError> {
        FilePath::decode(uri)
    }

    /// Metadata of the record at `path`, if any.
    pub async fn get_metadata(&self, path: &FilePath) -> Result<Option<Metadata>, StoreError> {
        Ok(self.load_record(path).await?.and_then(|r| r.metadata))
    }

    /// Replace the metadata of an existing record. Raises on oversized
    /// metadata (unlike `save`, which reports a status); no-op when the
    /// record does not exist.
    pub async fn set_metadata(&self, path: &FilePath, metadata: Metadata) -> Result<(), StoreError> {
        if serde_json::to_vec(&metadata)?.len() > MAX_METADATA_BYTES {
            return Err(StoreError::MetadataTooLarge);
        }
        let Some(mut record) = self.load_record(path).await? else {
            debug!(path = %path, "set_metadata on absent record is a no-op");
            return Ok(());
        };
        record.metadata = Some(metadata);
        self.put_record(&record).await
    }

    pub(crate) async fn load_record(&self, path: &FilePath) -> Result<Option<FileRecord>, StoreError> {
        match self.shared.kv.get(&keys::file(path)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn put_record(&self, record: &FileRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(record)?;
        self.shared
            .kv
            .set(&keys::file(&record.path), raw.into())
            .await?;
        Ok(())
    }

    pub(crate) async fn put_unresolved(&self, uri: &str, op: &UnresolvedOp) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(op)?;
        self.shared.kv.set(&keys::unresolved(uri), raw.into()).await?;
        Ok(())
    }

    pub(crate) async fn resolve_marker(&self, uri: &str) -> Result<(), StoreError> {
        self.shared.kv.delete(&keys::unresolved(uri)).await?;
        Ok(())
    }

    pub(crate) fn emit(&self, status: &FileStatus) {
        self.shared.sink.emit(status);
    }

    /// Build, emit and return an error status: the uniform terminal path of
    /// the non-raising operations.
    pub(crate) fn emit_error(&self, path: &FilePath, msg: impl Into<String>) -> FileStatus {
        let status = FileStatus::error(path.clone(), msg);
        self.emit(&status);
        status
    }
}
