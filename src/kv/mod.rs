//! Ordered key-value substrate boundary.
//!
//! The engine consumes a minimal contract: atomic single-key get/set/delete
//! plus an ordered scan that pages through a prefix or a bounded range using
//! an opaque resumption cursor. Keys are tuples of strings and integers,
//! ordered lexicographically by component. [`MemoryKv`] is the embedded
//! implementation used for tests and zero-config stores; production callers
//! inject their own backend.

mod memory;
mod pager;

pub use memory::MemoryKv;
pub use pager::KvPager;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fixed root namespace of every persisted key. Forward compatibility relies
/// on this prefix staying stable; there is no schema version.
pub const ROOT_NAMESPACE: &str = "deno_kv_fs";

/// Per-value size ceiling enforced by [`MemoryKv`]: one 64 KiB chunk plus
/// headroom, and comfortably above the 60 KiB inline-metadata cap.
pub const MAX_VALUE_SIZE: usize = 80 * 1024;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("value of {size} bytes exceeds the {max} byte ceiling")]
    ValueTooLarge { size: usize, max: usize },

    #[error("invalid list cursor")]
    InvalidCursor,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// One component of a tuple key.
///
/// The derived ordering compares integers before strings; within a key family
/// every compared component is same-typed, so only the per-type ordering is
/// load-bearing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyPart {
    Int(u64),
    Str(String),
}

impl From<u64> for KeyPart {
    fn from(v: u64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Tuple key, ordered lexicographically by component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KvKey(pub Vec<KeyPart>);

impl KvKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Key rooted at [`ROOT_NAMESPACE`].
    pub fn rooted<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = KeyPart>,
    {
        let mut all = vec![KeyPart::from(ROOT_NAMESPACE)];
        all.extend(parts);
        Self(all)
    }

    pub fn push(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn starts_with(&self, prefix: &KvKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

/// `Display` writes the key as `a/b/3` for log lines; it is not an encoding.
impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match part {
                KeyPart::Str(s) => write!(f, "{s}")?,
                KeyPart::Int(n) => write!(f, "{n}")?,
            }
        }
        Ok(())
    }
}

/// A scanned entry.
#[derive(Debug, Clone)]
pub struct KvEntry {
    pub key: KvKey,
    pub value: Bytes,
}

/// What to scan: every key under a prefix, or a `[start, end)` range.
#[derive(Debug, Clone)]
pub enum ListSelector {
    Prefix(KvKey),
    Range { start: KvKey, end: KvKey },
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum entries per page; 0 means no bound.
    pub limit: usize,
    /// Opaque resumption token from a previous page.
    pub cursor: Option<String>,
}

/// One page of scan results. `cursor` is `None` once the scan is exhausted.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub entries: Vec<KvEntry>,
    pub cursor: Option<String>,
}

/// The substrate contract consumed by the engine.
#[async_trait]
pub trait Kv: Send + Sync {
    /// Atomic point read.
    async fn get(&self, key: &KvKey) -> Result<Option<Bytes>, KvError>;

    /// Atomic point write, last-writer-wins.
    async fn set(&self, key: &KvKey, value: Bytes) -> Result<(), KvError>;

    /// Atomic point delete, idempotent.
    async fn delete(&self, key: &KvKey) -> Result<(), KvError>;

    /// Ordered scan; returns entries in ascending key order and a resumption
    /// cursor when more entries remain.
    async fn list(&self, selector: &ListSelector, opts: &ListOptions) -> Result<ListPage, KvError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_by_component() {
        let a = KvKey::rooted([KeyPart::from("chunks"), KeyPart::from("x"), KeyPart::from(1u64)]);
        let b = KvKey::rooted([KeyPart::from("chunks"), KeyPart::from("x"), KeyPart::from(2u64)]);
        let c = KvKey::rooted([KeyPart::from("chunks"), KeyPart::from("y"), KeyPart::from(1u64)]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_starts_with() {
        let prefix = KvKey::rooted([KeyPart::from("files")]);
        let key = KvKey::rooted([KeyPart::from("files"), KeyPart::from("a")]);
        assert!(key.starts_with(&prefix));
        assert!(!prefix.starts_with(&key));
    }
}
