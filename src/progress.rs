//! Progress reporting: status snapshots and the assignable callback.

use crate::path::FilePath;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// What an in-flight or failed operation is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpState {
    Saving,
    Deleting,
    Error,
}

/// Snapshot of one operation on one path. `progress` is the cumulative byte
/// count of the current operation, not of the file.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub uri: String,
    pub path: FilePath,
    pub progress: u64,
    pub state: OpState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl FileStatus {
    pub fn saving(path: FilePath, progress: u64) -> Self {
        Self {
            uri: path.encode(),
            path,
            progress,
            state: OpState::Saving,
            msg: None,
        }
    }

    pub fn deleting(path: FilePath, progress: u64) -> Self {
        Self {
            uri: path.encode(),
            path,
            progress,
            state: OpState::Deleting,
            msg: None,
        }
    }

    pub fn error(path: FilePath, msg: impl Into<String>) -> Self {
        Self {
            uri: path.encode(),
            path,
            progress: 0,
            state: OpState::Error,
            msg: Some(msg.into()),
        }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.state == OpState::Error
    }
}

pub type ProgressFn = Arc<dyn Fn(&FileStatus) + Send + Sync>;

/// Single process-wide progress callback. Fan-out to multiple consumers is
/// the host's concern.
#[derive(Default)]
pub struct ProgressSink {
    callback: RwLock<Option<ProgressFn>>,
}

impl ProgressSink {
    pub fn set(&self, callback: ProgressFn) {
        *self.callback.write() = Some(callback);
    }

    pub fn clear(&self) {
        *self.callback.write() = None;
    }

    pub fn emit(&self, status: &FileStatus) {
        if let Some(callback) = self.callback.read().as_ref() {
            callback(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_without_callback_is_silent() {
        let sink = ProgressSink::default();
        sink.emit(&FileStatus::saving(FilePath::from(["a"]), 0));
    }

    #[test]
    fn test_emit_reaches_callback() {
        let sink = ProgressSink::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        sink.set(Arc::new(move |status| {
            assert_eq!(status.uri, "a");
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        sink.emit(&FileStatus::saving(FilePath::from(["a"]), 1));
        sink.emit(&FileStatus::deleting(FilePath::from(["a"]), 2));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        sink.clear();
        sink.emit(&FileStatus::saving(FilePath::from(["a"]), 3));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
