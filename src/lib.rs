//! kvfs: a chunked file store layered over an ordered key-value substrate.
//!
//! Byte streams are cut into fixed 64 KiB chunks and written as individual
//! KV entries under tuple keys; hierarchical paths live in a flat ordered
//! keyspace. The engine enforces end-to-end streaming, per-second throughput
//! limits, per-path mutual exclusion, per-client concurrency caps, and sweeps
//! orphaned data from crashed operations at startup.

mod chunk;
mod error;
pub mod kv;
mod limit;
mod options;
mod path;
mod progress;
mod registry;
mod store;

pub use chunk::{CHUNK_SIZE, Content};
pub use error::{MAX_METADATA_BYTES, StoreError};
pub use kv::{Kv, KvError, MemoryKv};
pub use options::{AccessPredicate, Metadata, ReadOptions, SaveOptions};
pub use path::FilePath;
pub use progress::{FileStatus, OpState, ProgressFn};
pub use store::{
    ContentStream, DirEntry, DirList, FileFlag, FileRecord, FileStore, ReadOutcome, SaveOutcome,
};
