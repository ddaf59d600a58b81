//! Engine error surface.
//!
//! Public operations do not raise these for expected failures: `save`, `read`,
//! `read_dir`, `delete` and `delete_dir` fold terminal errors into a
//! [`FileStatus`](crate::FileStatus) with `state = Error` and emit it through
//! the progress sink. `set_metadata` is the one raising exception.

use crate::kv::KvError;
use thiserror::Error;

/// Serialized metadata ceiling (60 KiB).
pub const MAX_METADATA_BYTES: usize = 60 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Only {0} files are allowed")]
    ExtensionNotAllowed(String),

    #[error("Metadata exceeds 60KB limit")]
    MetadataTooLarge,

    #[error("You can only make a maximum of {0} concurrent requests")]
    ConcurrencyCap(u64),

    #[error("Maximum file size of {0} bytes exceeded")]
    SizeCapExceeded(u64),

    #[error("invalid URI component: {0}")]
    InvalidUri(String),

    #[error("malformed record: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
