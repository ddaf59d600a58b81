//! In-memory substrate: an ordered map with cursor pagination.
//!
//! Backs tests and zero-config stores. The cursor is the JSON encoding of the
//! last key a page returned; a continuation resumes strictly after it, so a
//! paging client never sees an entry twice even if the map changes between
//! pages.

use super::{Kv, KvEntry, KvError, KvKey, ListOptions, ListPage, ListSelector, MAX_VALUE_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Default)]
pub struct MemoryKv {
    map: Mutex<BTreeMap<KvKey, Bytes>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys (test helper).
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    fn decode_cursor(cursor: &str) -> Result<KvKey, KvError> {
        serde_json::from_str(cursor).map_err(|_| KvError::InvalidCursor)
    }

    fn encode_cursor(key: &KvKey) -> String {
        serde_json::to_string(key).expect("key parts always serialize")
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &KvKey) -> Result<Option<Bytes>, KvError> {
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &KvKey, value: Bytes) -> Result<(), KvError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        self.map.lock().insert(key.clone(), value);
        Ok(())
    }

    async fn delete(&self, key: &KvKey) -> Result<(), KvError> {
        self.map.lock().remove(key);
        Ok(())
    }

    async fn list(&self, selector: &ListSelector, opts: &ListOptions) -> Result<ListPage, KvError> {
        let start = match &opts.cursor {
            Some(cursor) => Bound::Excluded(Self::decode_cursor(cursor)?),
            None => match selector {
                // A key equal to the prefix is not "under" it and sorts
                // first, so excluding the bound excludes exactly that key.
                ListSelector::Prefix(prefix) => Bound::Excluded(prefix.clone()),
                ListSelector::Range { start, .. } => Bound::Included(start.clone()),
            },
        };

        let map = self.map.lock();
        let iter = map.range((start, Bound::<KvKey>::Unbounded));
        let in_range = iter.take_while(|(key, _)| match selector {
            ListSelector::Prefix(prefix) => key.starts_with(prefix),
            ListSelector::Range { end, .. } => *key < end,
        });

        let mut entries = Vec::new();
        let mut more = false;
        for (key, value) in in_range {
            if opts.limit > 0 && entries.len() == opts.limit {
                more = true;
                break;
            }
            entries.push(KvEntry {
                key: key.clone(),
                value: value.clone(),
            });
        }

        let cursor = if more {
            entries.last().map(|e| Self::encode_cursor(&e.key))
        } else {
            None
        };
        Ok(ListPage { entries, cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KeyPart;

    fn key(parts: &[&str]) -> KvKey {
        KvKey::new(parts.iter().map(|p| KeyPart::from(*p)).collect())
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let kv = MemoryKv::new();
        let k = key(&["a", "b"]);
        kv.set(&k, Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(kv.get(&k).await.unwrap().unwrap(), Bytes::from_static(b"v"));
        kv.delete(&k).await.unwrap();
        assert!(kv.get(&k).await.unwrap().is_none());
        // Idempotent.
        kv.delete(&k).await.unwrap();
    }

    #[tokio::test]
    async fn test_value_ceiling() {
        let kv = MemoryKv::new();
        let err = kv
            .set(&key(&["big"]), Bytes::from(vec![0u8; MAX_VALUE_SIZE + 1]))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::ValueTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_prefix_scan_pages_in_order() {
        let kv = MemoryKv::new();
        for i in 0..25u64 {
            let k = KvKey::new(vec![KeyPart::from("p"), KeyPart::from(i)]);
            kv.set(&k, Bytes::from(i.to_string())).await.unwrap();
        }
        // Sibling prefix that must not leak into the scan.
        kv.set(&key(&["q", "0"]), Bytes::from_static(b"x")).await.unwrap();

        let selector = ListSelector::Prefix(key(&["p"]));
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = kv
                .list(
                    &selector,
                    &ListOptions {
                        limit: 10,
                        cursor: cursor.clone(),
                    },
                )
                .await
                .unwrap();
            seen.extend(page.entries.iter().map(|e| e.key.clone()));
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 25);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_range_scan_end_exclusive() {
        let kv = MemoryKv::new();
        for i in 1..=5u64 {
            let k = KvKey::new(vec![KeyPart::from("r"), KeyPart::from(i)]);
            kv.set(&k, Bytes::new()).await.unwrap();
        }
        let page = kv
            .list(
                &ListSelector::Range {
                    start: KvKey::new(vec![KeyPart::from("r"), KeyPart::from(2u64)]),
                    end: KvKey::new(vec![KeyPart::from("r"), KeyPart::from(4u64)]),
                },
                &ListOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_limit_boundary_returns_no_cursor() {
        let kv = MemoryKv::new();
        for i in 0..10u64 {
            let k = KvKey::new(vec![KeyPart::from("p"), KeyPart::from(i)]);
            kv.set(&k, Bytes::new()).await.unwrap();
        }
        let page = kv
            .list(
                &ListSelector::Prefix(key(&["p"])),
                &ListOptions {
                    limit: 10,
                    cursor: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 10);
        assert!(page.cursor.is_none(), "exhausted scan must not hand out a cursor");
    }
}
