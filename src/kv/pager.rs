//! Cursor-chasing iteration over a substrate scan.
//!
//! A [`KvPager`] pulls entries one at a time from a prefix or range selector,
//! transparently re-issuing bounded `list` calls with the substrate's
//! resumption token. The current token is exposed so callers can hand
//! pagination back to their own clients without re-scanning.

use super::{Kv, KvEntry, KvError, ListOptions, ListPage, ListSelector};
use std::collections::VecDeque;
use std::sync::Arc;

pub struct KvPager {
    kv: Arc<dyn Kv>,
    selector: ListSelector,
    page_size: usize,
    buffer: VecDeque<KvEntry>,
    /// Token that resumes after the entries currently buffered.
    cursor: Option<String>,
    exhausted: bool,
}

impl KvPager {
    pub fn new(kv: Arc<dyn Kv>, selector: ListSelector, page_size: usize) -> Self {
        Self::resume(kv, selector, page_size, None)
    }

    /// Start from a resumption token handed out by a previous pager.
    pub fn resume(
        kv: Arc<dyn Kv>,
        selector: ListSelector,
        page_size: usize,
        cursor: Option<String>,
    ) -> Self {
        Self {
            kv,
            selector,
            page_size,
            buffer: VecDeque::new(),
            cursor,
            exhausted: false,
        }
    }

    /// The token a client passes back to continue after every entry yielded
    /// so far has been consumed. `None` once the scan ran dry.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub async fn next_entry(&mut self) -> Result<Option<KvEntry>, KvError> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }
            if self.exhausted {
                return Ok(None);
            }

            let ListPage { entries, cursor } = self
                .kv
                .list(
                    &self.selector,
                    &ListOptions {
                        limit: self.page_size,
                        cursor: self.cursor.take(),
                    },
                )
                .await?;
            self.cursor = cursor;
            self.exhausted = self.cursor.is_none();
            if entries.is_empty() && self.exhausted {
                return Ok(None);
            }
            self.buffer.extend(entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KeyPart, KvKey, MemoryKv};
    use bytes::Bytes;

    async fn seeded(count: u64) -> Arc<MemoryKv> {
        let kv = Arc::new(MemoryKv::new());
        for i in 0..count {
            let key = KvKey::new(vec![KeyPart::from("items"), KeyPart::from(i)]);
            kv.set(&key, Bytes::from(vec![0u8; 4])).await.unwrap();
        }
        kv
    }

    #[tokio::test]
    async fn test_iterates_across_pages() {
        let kv = seeded(23).await;
        let selector = ListSelector::Prefix(KvKey::new(vec![KeyPart::from("items")]));
        let mut pager = KvPager::new(kv, selector, 5);

        let mut count = 0;
        while pager.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 23);
        assert!(pager.cursor().is_none());
    }

    #[tokio::test]
    async fn test_cursor_resumes_where_it_stopped() {
        let kv = seeded(10).await;
        let selector = ListSelector::Prefix(KvKey::new(vec![KeyPart::from("items")]));

        let mut first = KvPager::new(kv.clone(), selector.clone(), 4);
        for _ in 0..4 {
            first.next_entry().await.unwrap().unwrap();
        }
        let token = first.cursor().map(str::to_string);
        assert!(token.is_some(), "mid-scan pager must expose a token");

        let mut second = KvPager::resume(kv, selector, 4, token);
        let mut rest = 0;
        while let Some(entry) = second.next_entry().await.unwrap() {
            assert!(matches!(entry.key.0.last(), Some(KeyPart::Int(i)) if *i >= 4));
            rest += 1;
        }
        assert_eq!(rest, 6);
    }

    #[tokio::test]
    async fn test_empty_scan() {
        let kv = Arc::new(MemoryKv::new());
        let selector = ListSelector::Prefix(KvKey::new(vec![KeyPart::from("nothing")]));
        let mut pager = KvPager::new(kv, selector, 8);
        assert!(pager.next_entry().await.unwrap().is_none());
    }
}
