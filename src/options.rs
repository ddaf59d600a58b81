//! Per-call option structs.
//!
//! Numeric caps default to unbounded, the access predicate to always-true,
//! the extension filter to empty, and `client_id` to `None` (anonymous
//! requests are exempt from the per-client cap).

use crate::path::FilePath;
use std::sync::Arc;

/// Opaque JSON metadata attached to a file record (serialized ≤ 60 KiB).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Injected authorization predicate.
pub type AccessPredicate = Arc<dyn Fn(&FilePath) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct SaveOptions {
    pub path: FilePath,
    pub metadata: Option<Metadata>,
    pub chunks_per_second: Option<u64>,
    pub client_id: Option<String>,
    pub validate_access: Option<AccessPredicate>,
    pub max_client_requests: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    pub allowed_extensions: Vec<String>,
}

impl SaveOptions {
    pub fn new(path: impl Into<FilePath>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn metadata(self, metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..self
        }
    }

    pub fn chunks_per_second(self, rate: u64) -> Self {
        Self {
            chunks_per_second: Some(rate),
            ..self
        }
    }

    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..self
        }
    }

    pub fn validate_access(self, predicate: AccessPredicate) -> Self {
        Self {
            validate_access: Some(predicate),
            ..self
        }
    }

    pub fn max_client_requests(self, max: u64) -> Self {
        Self {
            max_client_requests: Some(max),
            ..self
        }
    }

    pub fn max_file_size_bytes(self, max: u64) -> Self {
        Self {
            max_file_size_bytes: Some(max),
            ..self
        }
    }

    pub fn allowed_extensions<I, S>(self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_extensions: extensions.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub(crate) fn access_allowed(&self) -> bool {
        self.validate_access.as_ref().is_none_or(|f| f(&self.path))
    }
}

/// Options shared by `read`, `read_dir`, `delete` and `delete_dir`.
#[derive(Clone, Default)]
pub struct ReadOptions {
    pub path: FilePath,
    pub chunks_per_second: Option<u64>,
    pub max_dir_entries_per_second: Option<u64>,
    pub client_id: Option<String>,
    pub validate_access: Option<AccessPredicate>,
    pub max_client_requests: Option<u64>,
    /// When set, `read_dir` stops at one page and hands back a cursor.
    pub pagination: bool,
    /// Resumption token from a previous paginated `read_dir`.
    pub cursor: Option<String>,
}

impl ReadOptions {
    pub fn new(path: impl Into<FilePath>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn chunks_per_second(self, rate: u64) -> Self {
        Self {
            chunks_per_second: Some(rate),
            ..self
        }
    }

    pub fn max_dir_entries_per_second(self, rate: u64) -> Self {
        Self {
            max_dir_entries_per_second: Some(rate),
            ..self
        }
    }

    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..self
        }
    }

    pub fn validate_access(self, predicate: AccessPredicate) -> Self {
        Self {
            validate_access: Some(predicate),
            ..self
        }
    }

    pub fn max_client_requests(self, max: u64) -> Self {
        Self {
            max_client_requests: Some(max),
            ..self
        }
    }

    pub fn pagination(self, pagination: bool) -> Self {
        Self { pagination, ..self }
    }

    pub fn cursor(self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            ..self
        }
    }

    pub(crate) fn access_allowed(&self) -> bool {
        self.validate_access.as_ref().is_none_or(|f| f(&self.path))
    }
}
