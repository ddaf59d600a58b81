//! Save pipeline: validate, gate, stream chunks into the substrate, retract
//! stale tails, finalize the record.

use super::{FileFlag, FileRecord, FileStore, PAGE_SIZE, UnresolvedOp, keys};
use crate::chunk::{ChunkStream, Content};
use crate::error::{MAX_METADATA_BYTES, StoreError};
use crate::kv::{KvPager, ListSelector};
use crate::limit::RateLimiter;
use crate::options::SaveOptions;
use crate::path::FilePath;
use crate::progress::FileStatus;
use tracing::{debug, warn};

/// What a save hands back: the finalized record, or a status when the path
/// was busy or the operation failed. Errors are reported, never raised.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(FileRecord),
    Status(FileStatus),
}

impl SaveOutcome {
    pub fn record(self) -> Option<FileRecord> {
        match self {
            SaveOutcome::Saved(record) => Some(record),
            SaveOutcome::Status(_) => None,
        }
    }

    pub fn status(&self) -> Option<&FileStatus> {
        match self {
            SaveOutcome::Saved(_) => None,
            SaveOutcome::Status(status) => Some(status),
        }
    }
}

impl FileStore {
    /// Save `content` at `options.path`, replacing any existing file.
    ///
    /// A second save or delete for a path already in flight returns the
    /// current status without doing any work; there is no queue.
    pub async fn save(&self, options: SaveOptions, content: impl Into<Content>) -> SaveOutcome {
        self.save_content(options, content.into()).await
    }

    async fn save_content(&self, options: SaveOptions, content: Content) -> SaveOutcome {
        let uri = options.path.encode();
        if let Some(status) = self.shared.registry.status(&uri) {
            return SaveOutcome::Status(status);
        }

        if let Some(metadata) = &options.metadata {
            match serde_json::to_vec(metadata) {
                Ok(raw) if raw.len() > MAX_METADATA_BYTES => {
                    return SaveOutcome::Status(
                        self.emit_error(&options.path, StoreError::MetadataTooLarge.to_string()),
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    return SaveOutcome::Status(self.emit_error(&options.path, err.to_string()));
                }
            }
        }

        if !options.access_allowed() {
            return SaveOutcome::Status(
                self.emit_error(&options.path, StoreError::Forbidden.to_string()),
            );
        }

        if !options.allowed_extensions.is_empty() {
            let allowed = options
                .path
                .extension()
                .is_some_and(|ext| options.allowed_extensions.iter().any(|a| a == ext));
            if !allowed {
                let msg =
                    StoreError::ExtensionNotAllowed(options.allowed_extensions.join(", "))
                        .to_string();
                return SaveOutcome::Status(self.emit_error(&options.path, msg));
            }
        }

        // The registry probe and insertion are one atomic region: two racing
        // saves for the same path cannot both pass this point.
        if let Err(status) = self
            .shared
            .registry
            .try_begin_saving(&options.path, options.client_id.as_deref())
        {
            return SaveOutcome::Status(status);
        }

        if let Err(err) = self
            .put_unresolved(&uri, &UnresolvedOp::from_save(&options))
            .await
        {
            self.shared
                .registry
                .end_saving(&uri, options.client_id.as_deref());
            return SaveOutcome::Status(self.emit_error(&options.path, err.to_string()));
        }

        // Per-client cap, checked after the increment.
        if let (Some(max), Some(client)) =
            (options.max_client_requests, options.client_id.as_deref())
            && self.shared.registry.client_reqs(client) > max
        {
            self.shared.registry.end_saving(&uri, Some(client));
            let _ = self.resolve_marker(&uri).await;
            return SaveOutcome::Status(
                self.emit_error(&options.path, StoreError::ConcurrencyCap(max).to_string()),
            );
        }

        debug!(uri = %uri, "saving");
        match self.write_chunks(&uri, &options, content).await {
            Ok((size, flags)) => {
                let record = FileRecord {
                    path: options.path.clone(),
                    size,
                    flags,
                    metadata: options.metadata.clone(),
                    uri: uri.clone(),
                };
                match self.finalize_save(&record).await {
                    Ok(()) => {
                        self.shared
                            .registry
                            .end_saving(&uri, options.client_id.as_deref());
                        SaveOutcome::Saved(record)
                    }
                    Err(err) => self.fail_save(&uri, options, err),
                }
            }
            Err(err) => self.fail_save(&uri, options, err),
        }
    }

    /// Stream chunks into `("chunks", uri, 1..)`, then retract any stale tail
    /// beyond the final index.
    async fn write_chunks(
        &self,
        uri: &str,
        options: &SaveOptions,
        content: Content,
    ) -> Result<(u64, Vec<FileFlag>), StoreError> {
        let mut stream = ChunkStream::new(content);
        let mut limiter = RateLimiter::new(options.chunks_per_second);
        let cap = options.max_file_size_bytes.unwrap_or(u64::MAX);
        let mut index = 0u64;
        let mut size = 0u64;
        let mut flags = Vec::new();

        while let Some(chunk) = stream.next_chunk().await? {
            // The cap check runs on the bytes accumulated before this chunk,
            // so the chunk that crosses the cap still lands: overshoot is
            // bounded by one chunk.
            if size > cap {
                flags.push(FileFlag::Incomplete);
                break;
            }
            index += 1;
            self.shared
                .kv
                .set(&keys::chunk(uri, index), chunk.clone())
                .await?;
            size += chunk.len() as u64;
            self.shared.registry.set_saving(uri, size);
            if limiter.tick().await {
                self.emit(&FileStatus::saving(options.path.clone(), size));
            }
        }

        self.retract(uri, &options.path, index + 1, size, &mut limiter)
            .await?;

        if flags.contains(&FileFlag::Incomplete) {
            self.emit(&FileStatus::error(
                options.path.clone(),
                StoreError::SizeCapExceeded(cap).to_string(),
            ));
        } else {
            self.emit(&FileStatus::saving(options.path.clone(), size));
        }
        Ok((size, flags))
    }

    /// Remove chunks at `from_index..` so a shorter overwrite leaves no stale
    /// tail behind.
    async fn retract(
        &self,
        uri: &str,
        path: &FilePath,
        from_index: u64,
        written: u64,
        limiter: &mut RateLimiter,
    ) -> Result<(), StoreError> {
        let selector = ListSelector::Range {
            start: keys::chunk(uri, from_index),
            end: keys::chunk(uri, u64::MAX),
        };
        let mut pager = KvPager::new(self.shared.kv.clone(), selector, PAGE_SIZE);
        let mut removed = 0u64;
        while let Some(entry) = pager.next_entry().await? {
            self.shared.kv.delete(&entry.key).await?;
            removed += entry.value.len() as u64;
            if limiter.tick().await {
                self.emit(
                    &FileStatus::saving(path.clone(), written)
                        .with_msg(format!("Deleting previous data, {removed} bytes deleted.")),
                );
            }
        }
        if removed > 0 {
            debug!(uri, removed, "retracted stale trailing chunks");
        }
        Ok(())
    }

    /// Atomic finalization: the record lands in a single put, then the
    /// unresolved marker is resolved.
    async fn finalize_save(&self, record: &FileRecord) -> Result<(), StoreError> {
        self.put_record(record).await?;
        self.resolve_marker(&record.uri).await
    }

    /// Failure path: release the in-flight slot but leave the marker for the
    /// recovery sweep, and clean chunks concurrently.
    fn fail_save(&self, uri: &str, options: SaveOptions, err: StoreError) -> SaveOutcome {
        warn!(uri = %uri, error = %err, "save failed, scheduling chunk cleanup");
        self.shared
            .registry
            .end_saving(uri, options.client_id.as_deref());
        let store = self.clone();
        let cleanup = UnresolvedOp::from_save(&options).into_delete_options();
        tokio::spawn(async move {
            let _ = store.delete(cleanup).await;
        });
        SaveOutcome::Status(self.emit_error(&options.path, err.to_string()))
    }
}
