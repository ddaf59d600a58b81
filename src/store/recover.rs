//! Startup recovery: sweep unresolved markers left by crashed or failed
//! operations and finish their deletes.
//!
//! Runs once per store construction, spawned without awaiting. A marker for
//! a crashed save points at an orphaned chunk tail with no record; a marker
//! for a stalled delete points at a half-removed range. Both resolve the same
//! way: run the delete the marker describes. Sweep errors are logged and
//! swallowed; the markers stay for the next start.

use super::{FileStore, PAGE_SIZE, UnresolvedOp, keys};
use crate::kv::{KvPager, ListSelector};
use tracing::{debug, info, warn};

impl FileStore {
    pub(crate) async fn sweep_unresolved(&self) {
        let selector = ListSelector::Prefix(keys::unresolved_prefix());
        let mut pager = KvPager::new(self.shared.kv.clone(), selector, PAGE_SIZE);
        let mut swept = 0usize;
        loop {
            let entry = match pager.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "recovery scan failed");
                    break;
                }
            };

            let op: UnresolvedOp = match serde_json::from_slice(&entry.value) {
                Ok(op) => op,
                Err(err) => {
                    warn!(key = %entry.key, error = %err, "skipping undecodable marker");
                    continue;
                }
            };

            debug!(path = %op.path, "recovering unresolved operation");
            match self.delete(op.into_delete_options()).await {
                None => swept += 1,
                Some(status) => {
                    warn!(uri = %status.uri, msg = ?status.msg, "recovery delete did not complete");
                }
            }
        }
        if swept > 0 {
            info!(swept, "recovery sweep removed orphaned data");
        }
    }
}
