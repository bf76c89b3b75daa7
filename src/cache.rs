//! Read-through preview cache / 预览缓存
//!
//! Keyed by `(identity, row_limit)`. Reads are concurrent; two callers
//! missing the same key may both fetch, the later insert wins and both
//! results are equivalent. Invalidate explicitly when the identity changes.
//! Holds at most `max_entries` previews, the oldest insert is evicted first;
//! expired entries are removed when they are found. / 容量有上限，过期条目发现即删除

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dataset::PreviewDataset;
use crate::error::Result;
use crate::fetcher::PreviewFetcher;
use crate::locator::ObjectLocator;
use crate::storage::ObjectIdentity;

type CacheKey = (ObjectIdentity, Option<usize>);

/// Default number of cached previews / 默认缓存条目数
pub const DEFAULT_MAX_ENTRIES: usize = 8;

struct CacheEntry {
    dataset: Arc<PreviewDataset>,
    inserted_at: Instant,
}

pub struct PreviewCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// None = entries never expire / 为空表示永不过期
    ttl: Option<Duration>,
    max_entries: usize,
}

impl PreviewCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.map_or(false, |ttl| entry.inserted_at.elapsed() >= ttl)
    }

    pub fn get(&self, identity: &ObjectIdentity, row_limit: Option<usize>) -> Option<Arc<PreviewDataset>> {
        let key = (identity.clone(), row_limit);
        {
            let entries = self.entries.read();
            let entry = entries.get(&key)?;
            if !self.is_expired(entry) {
                return Some(entry.dataset.clone());
            }
        }
        // 过期条目直接删除
        let mut entries = self.entries.write();
        if entries.get(&key).map_or(false, |entry| self.is_expired(entry)) {
            entries.remove(&key);
            tracing::debug!("Preview cache entry expired: {}, limit={:?}", identity, row_limit);
        }
        None
    }

    pub fn insert(
        &self,
        identity: &ObjectIdentity,
        row_limit: Option<usize>,
        dataset: PreviewDataset,
    ) -> Arc<PreviewDataset> {
        let dataset = Arc::new(dataset);
        let key = (identity.clone(), row_limit);
        let mut entries = self.entries.write();

        entries.retain(|_, entry| !self.is_expired(entry));
        while entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(oldest) => {
                    tracing::debug!("Preview cache evicted: {}, limit={:?}", oldest.0, oldest.1);
                    entries.remove(&oldest);
                }
                None => break,
            }
        }

        entries.insert(
            key,
            CacheEntry {
                dataset: dataset.clone(),
                inserted_at: Instant::now(),
            },
        );
        dataset
    }

    /// Serve from cache or fetch and populate / 命中缓存则直接返回，否则读取并写入
    pub async fn get_or_fetch(
        &self,
        fetcher: &PreviewFetcher,
        locator: &ObjectLocator,
        row_limit: Option<usize>,
    ) -> Result<Arc<PreviewDataset>> {
        let identity = locator.identity();
        if let Some(hit) = self.get(identity, row_limit) {
            tracing::debug!("Preview cache hit: {}, limit={:?}", identity, row_limit);
            return Ok(hit);
        }
        let dataset = fetcher.fetch_preview(locator, row_limit).await?;
        Ok(self.insert(identity, row_limit, dataset))
    }

    /// Drop every entry of one object, returns how many were removed / 清除某对象的所有缓存
    pub fn invalidate(&self, identity: &ObjectIdentity) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(id, _), _| id != identity);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!("Preview cache invalidated: {}, entries={}", identity, removed);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchOptions;
    use crate::storage::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, ObjectLocator) {
        let store = Arc::new(MemoryStore::new());
        store.put_object("data", "a.csv", "x\n1\n2\n3\n");
        let locator = ObjectLocator::with_store(ObjectIdentity::new("data", "a.csv", None), store.clone());
        (store, locator)
    }

    #[tokio::test]
    async fn test_read_through() {
        let (store, locator) = setup();
        let cache = PreviewCache::default();
        let fetcher = PreviewFetcher::default();

        let first = cache.get_or_fetch(&fetcher, &locator, Some(2)).await.unwrap();
        let second = cache.get_or_fetch(&fetcher, &locator, Some(2)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.reads(), 1);

        // 行数不同是不同的键
        let all = cache.get_or_fetch(&fetcher, &locator, None).await.unwrap();
        assert_eq!(all.row_count(), 3);
        assert_eq!(store.reads(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (store, locator) = setup();
        store.fail_next_reads(1);
        let cache = PreviewCache::default();
        let fetcher = PreviewFetcher::new(FetchOptions {
            max_retries: 0,
            ..Default::default()
        });

        assert!(cache.get_or_fetch(&fetcher, &locator, Some(2)).await.is_err());
        assert!(cache.is_empty());
        assert!(cache.get_or_fetch(&fetcher, &locator, Some(2)).await.is_ok());
        assert_eq!(store.reads(), 2);
    }

    #[test]
    fn test_invalidate_only_matching_identity() {
        let cache = PreviewCache::default();
        let a = ObjectIdentity::new("data", "a.csv", None);
        let b = ObjectIdentity::new("data", "b.csv", None);
        let ds = PreviewDataset::read_csv("x\n1\n".as_bytes(), None).unwrap();
        cache.insert(&a, Some(1), ds.clone());
        cache.insert(&a, Some(50), ds.clone());
        cache.insert(&b, Some(1), ds);

        assert_eq!(cache.invalidate(&a), 2);
        assert!(cache.get(&a, Some(1)).is_none());
        assert!(cache.get(&b, Some(1)).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = PreviewCache::new(Some(Duration::from_millis(10)));
        let a = ObjectIdentity::new("data", "a.csv", None);
        let ds = PreviewDataset::read_csv("x\n1\n".as_bytes(), None).unwrap();
        cache.insert(&a, Some(1), ds);
        assert!(cache.get(&a, Some(1)).is_some());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&a, Some(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = PreviewCache::with_capacity(None, 2);
        let a = ObjectIdentity::new("data", "a.csv", None);
        let ds = PreviewDataset::read_csv("x\n1\n".as_bytes(), None).unwrap();

        for limit in 1..=50 {
            cache.insert(&a, Some(limit), ds.clone());
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a, Some(1)).is_none());
        assert!(cache.get(&a, Some(49)).is_some());
        assert!(cache.get(&a, Some(50)).is_some());

        // 覆盖已有键不会驱逐其他条目
        cache.insert(&a, Some(50), ds);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a, Some(49)).is_some());
    }
}
