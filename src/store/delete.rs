//! Delete pipeline: drop the record first so readers observe the file as
//! gone, then walk and delete its chunk range under the rate limit.

use super::{FileStore, PAGE_SIZE, UnresolvedOp, keys};
use crate::error::StoreError;
use crate::kv::{KvPager, ListSelector};
use crate::limit::RateLimiter;
use crate::options::ReadOptions;
use crate::progress::FileStatus;
use tracing::{debug, warn};

impl FileStore {
    /// Delete the file at `options.path`. Returns `None` on success, or the
    /// in-flight/error status otherwise. Deleting a missing file is a
    /// successful no-op.
    pub async fn delete(&self, options: ReadOptions) -> Option<FileStatus> {
        let uri = options.path.encode();
        if let Some(status) = self.shared.registry.status(&uri) {
            return Some(status);
        }
        if !options.access_allowed() {
            return Some(self.emit_error(&options.path, StoreError::Forbidden.to_string()));
        }

        if let Err(status) = self
            .shared
            .registry
            .try_begin_deleting(&options.path, options.client_id.as_deref())
        {
            return Some(status);
        }

        if let Err(err) = self
            .put_unresolved(&uri, &UnresolvedOp::from_read(&options))
            .await
        {
            self.shared
                .registry
                .end_deleting(&uri, options.client_id.as_deref());
            return Some(self.emit_error(&options.path, err.to_string()));
        }

        if let (Some(max), Some(client)) =
            (options.max_client_requests, options.client_id.as_deref())
            && self.shared.registry.client_reqs(client) > max
        {
            self.shared.registry.end_deleting(&uri, Some(client));
            let _ = self.resolve_marker(&uri).await;
            return Some(
                self.emit_error(&options.path, StoreError::ConcurrencyCap(max).to_string()),
            );
        }

        debug!(uri = %uri, "deleting");
        match self.remove_file(&uri, &options).await {
            Ok(removed) => {
                self.shared
                    .registry
                    .end_deleting(&uri, options.client_id.as_deref());
                self.emit(&FileStatus::deleting(options.path.clone(), removed));
                None
            }
            Err(err) => {
                // Marker stays so the recovery sweep finishes the job later.
                warn!(uri = %uri, error = %err, "delete failed, leaving marker for recovery");
                self.shared
                    .registry
                    .end_deleting(&uri, options.client_id.as_deref());
                Some(self.emit_error(&options.path, err.to_string()))
            }
        }
    }

    /// Record first, then the chunk range; resolves the marker on success.
    async fn remove_file(&self, uri: &str, options: &ReadOptions) -> Result<u64, StoreError> {
        self.shared.kv.delete(&keys::file(&options.path)).await?;

        let mut limiter = RateLimiter::new(options.chunks_per_second);
        let mut pager = KvPager::new(
            self.shared.kv.clone(),
            ListSelector::Prefix(keys::chunk_prefix(uri)),
            PAGE_SIZE,
        );
        let mut removed = 0u64;
        while let Some(entry) = pager.next_entry().await? {
            self.shared.kv.delete(&entry.key).await?;
            removed += entry.value.len() as u64;
            self.shared.registry.set_deleting(uri, removed);
            if limiter.tick().await {
                self.emit(&FileStatus::deleting(options.path.clone(), removed));
            }
        }

        self.resolve_marker(uri).await?;
        Ok(removed)
    }
}
