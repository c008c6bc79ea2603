//! L1 in-process cache: a bounded map with insertion-ordered (FIFO) eviction,
//! not access-ordered LRU — the oldest key inserted is the first evicted on
//! overflow, regardless of how often it has been read since.

use crate::model::CacheEntry;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

struct Inner {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, CacheEntry>,
}

/// Bounded in-memory layer (C3 L1). Default capacity matches spec §4.3 (1 000).
pub struct MemoryCache {
    inner: RwLock<Inner>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                capacity,
                order: VecDeque::with_capacity(capacity.min(1024)),
                entries: HashMap::with_capacity(capacity.min(1024)),
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.read().await.entries.get(key).cloned()
    }

    pub async fn set(&self, entry: CacheEntry) {
        let mut inner = self.inner.write().await;
        let is_new = !inner.entries.contains_key(&entry.key);
        inner.entries.insert(entry.key.clone(), entry.clone());
        if is_new {
            inner.order.push_back(entry.key.clone());
            if inner.order.len() > inner.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    debug!("L1 cache evicted oldest entry '{oldest}' on overflow");
                }
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.order.retain(|k| k != key);
        }
        removed
    }

    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.write().await;
        let stale: Vec<String> = inner.entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        for key in &stale {
            inner.entries.remove(key);
        }
        inner.order.retain(|k| !stale.contains(k));
        stale.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> CacheEntry {
        CacheEntry { key: key.to_string(), payload: vec![1, 2, 3], created_at: 0, expires_at: 1_000_000_000_000, hit_count: 0 }
    }

    #[tokio::test]
    async fn stores_and_retrieves() {
        let cache = MemoryCache::new(10);
        cache.set(entry("discovery:GSE1")).await;
        assert!(cache.get("discovery:GSE1").await.is_some());
        assert!(cache.get("discovery:missing").await.is_none());
    }

    #[tokio::test]
    async fn evicts_oldest_inserted_on_overflow() {
        let cache = MemoryCache::new(2);
        cache.set(entry("a")).await;
        cache.set(entry("b")).await;
        // touch "a" repeatedly; insertion order still governs eviction, not recency
        cache.get("a").await;
        cache.get("a").await;
        cache.set(entry("c")).await;

        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn invalidate_prefix_removes_matching_keys_only() {
        let cache = MemoryCache::new(10);
        cache.set(entry("discovery:GSE1")).await;
        cache.set(entry("discovery:GSE2")).await;
        cache.set(entry("search:GSE1")).await;

        let removed = cache.invalidate_prefix("discovery:").await;
        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 1);
    }
}
