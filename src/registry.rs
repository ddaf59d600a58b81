//! In-flight operation registry.
//!
//! One mutex guards the per-URI saving/deleting progress maps and the
//! per-client request counters; every transition touches all relevant maps in
//! the same critical section, which is what keeps the "never both saving and
//! deleting" and client-count invariants intact on a multi-threaded runtime.
//! The lock is never held across an await point.

use crate::path::FilePath;
use crate::progress::FileStatus;
use parking_lot::Mutex;
use std::collections::HashMap;

struct Progress {
    path: FilePath,
    bytes: u64,
}

#[derive(Default)]
struct Inner {
    saving: HashMap<String, Progress>,
    deleting: HashMap<String, Progress>,
    client_reqs: HashMap<String, u64>,
}

impl Inner {
    fn status_of(&self, uri: &str) -> Option<FileStatus> {
        if let Some(p) = self.saving.get(uri) {
            return Some(FileStatus::saving(p.path.clone(), p.bytes));
        }
        if let Some(p) = self.deleting.get(uri) {
            return Some(FileStatus::deleting(p.path.clone(), p.bytes));
        }
        None
    }

    fn bump_client(&mut self, client: Option<&str>) {
        if let Some(client) = client {
            *self.client_reqs.entry(client.to_string()).or_insert(0) += 1;
        }
    }

    fn drop_client(&mut self, client: Option<&str>) {
        if let Some(client) = client
            && let Some(count) = self.client_reqs.get_mut(client)
        {
            *count -= 1;
            if *count == 0 {
                self.client_reqs.remove(client);
            }
        }
    }
}

#[derive(Default)]
pub struct InFlightRegistry {
    inner: Mutex<Inner>,
}

impl InFlightRegistry {
    /// Current status of the URI, if a save or delete is in flight.
    pub fn status(&self, uri: &str) -> Option<FileStatus> {
        self.inner.lock().status_of(uri)
    }

    /// Atomically enter the saving state for `path`. If the URI is already
    /// saving or deleting, the existing status is returned instead and
    /// nothing changes. This is the per-path concurrency gate.
    pub fn try_begin_saving(&self, path: &FilePath, client: Option<&str>) -> Result<(), FileStatus> {
        let uri = path.encode();
        let mut inner = self.inner.lock();
        if let Some(status) = inner.status_of(&uri) {
            return Err(status);
        }
        inner.saving.insert(
            uri,
            Progress {
                path: path.clone(),
                bytes: 0,
            },
        );
        inner.bump_client(client);
        Ok(())
    }

    pub fn try_begin_deleting(
        &self,
        path: &FilePath,
        client: Option<&str>,
    ) -> Result<(), FileStatus> {
        let uri = path.encode();
        let mut inner = self.inner.lock();
        if let Some(status) = inner.status_of(&uri) {
            return Err(status);
        }
        inner.deleting.insert(
            uri,
            Progress {
                path: path.clone(),
                bytes: 0,
            },
        );
        inner.bump_client(client);
        Ok(())
    }

    pub fn end_saving(&self, uri: &str, client: Option<&str>) {
        let mut inner = self.inner.lock();
        inner.saving.remove(uri);
        inner.drop_client(client);
    }

    pub fn end_deleting(&self, uri: &str, client: Option<&str>) {
        let mut inner = self.inner.lock();
        inner.deleting.remove(uri);
        inner.drop_client(client);
    }

    pub fn set_saving(&self, uri: &str, bytes: u64) {
        if let Some(p) = self.inner.lock().saving.get_mut(uri) {
            p.bytes = bytes;
        }
    }

    pub fn set_deleting(&self, uri: &str, bytes: u64) {
        if let Some(p) = self.inner.lock().deleting.get_mut(uri) {
            p.bytes = bytes;
        }
    }

    /// Take one request slot for `client` and return the resulting count.
    /// Read streams use this; saves and deletes count through
    /// `try_begin_*`/`end_*`.
    pub fn acquire_slot(&self, client: &str) -> u64 {
        let mut inner = self.inner.lock();
        inner.bump_client(Some(client));
        inner.client_reqs.get(client).copied().unwrap_or(0)
    }

    pub fn release_slot(&self, client: &str) {
        self.inner.lock().drop_client(Some(client));
    }

    /// In-flight request count for a client; absent key reads as zero.
    pub fn client_reqs(&self, client: &str) -> u64 {
        self.inner.lock().client_reqs.get(client).copied().unwrap_or(0)
    }

    /// Snapshot of every in-flight save and delete.
    pub fn all_statuses(&self) -> Vec<FileStatus> {
        let inner = self.inner.lock();
        inner
            .saving
            .values()
            .map(|p| FileStatus::saving(p.path.clone(), p.bytes))
            .chain(
                inner
                    .deleting
                    .values()
                    .map(|p| FileStatus::deleting(p.path.clone(), p.bytes)),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::OpState;

    #[test]
    fn test_saving_short_circuits_both_states() {
        let reg = InFlightRegistry::default();
        let path = FilePath::from(["a", "b"]);
        reg.try_begin_saving(&path, None).unwrap();

        let status = reg.try_begin_saving(&path, None).unwrap_err();
        assert_eq!(status.state, OpState::Saving);
        let status = reg.try_begin_deleting(&path, None).unwrap_err();
        assert_eq!(status.state, OpState::Saving);

        reg.end_saving(&path.encode(), None);
        assert!(reg.status(&path.encode()).is_none());
        reg.try_begin_deleting(&path, None).unwrap();
    }

    #[test]
    fn test_progress_snapshot() {
        let reg = InFlightRegistry::default();
        let path = FilePath::from(["f"]);
        reg.try_begin_saving(&path, None).unwrap();
        reg.set_saving(&path.encode(), 4096);
        let status = reg.status(&path.encode()).unwrap();
        assert_eq!(status.progress, 4096);
        assert_eq!(status.path, path);
    }

    #[test]
    fn test_client_counts_balance_out() {
        let reg = InFlightRegistry::default();
        let a = FilePath::from(["a"]);
        let b = FilePath::from(["b"]);
        reg.try_begin_saving(&a, Some("c1")).unwrap();
        reg.try_begin_deleting(&b, Some("c1")).unwrap();
        assert_eq!(reg.client_reqs("c1"), 2);
        assert_eq!(reg.acquire_slot("c1"), 3);

        reg.release_slot("c1");
        reg.end_saving(&a.encode(), Some("c1"));
        reg.end_deleting(&b.encode(), Some("c1"));
        assert_eq!(reg.client_reqs("c1"), 0);
        assert_eq!(reg.client_reqs("never-seen"), 0);
    }

    #[test]
    fn test_null_client_is_a_noop() {
        let reg = InFlightRegistry::default();
        let path = FilePath::from(["anon"]);
        reg.try_begin_saving(&path, None).unwrap();
        reg.end_saving(&path.encode(), None);
        assert!(reg.all_statuses().is_empty());
    }

    #[test]
    fn test_all_statuses_snapshot() {
        let reg = InFlightRegistry::default();
        reg.try_begin_saving(&FilePath::from(["x"]), None).unwrap();
        reg.try_begin_deleting(&FilePath::from(["y"]), None).unwrap();
        let mut states: Vec<OpState> = reg.all_statuses().iter().map(|s| s.state).collect();
        states.sort_by_key(|s| format!("{s:?}"));
        assert_eq!(states, vec![OpState::Deleting, OpState::Saving]);
    }
}
