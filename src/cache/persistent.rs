//! L2 persistent cache (C3): a single `sled` tree keyed by the full
//! `<namespace>:<identifier>` cache key, bincode-encoded values. Key lexical
//! ordering lets `invalidate_prefix` use `scan_prefix` directly instead of a
//! separate namespace index.

use crate::error::{Error, Result};
use crate::model::CacheEntry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    payload: Vec<u8>,
    created_at: i64,
    expires_at: i64,
    hit_count: u64,
    last_accessed: i64,
}

fn cache_error(operation: &str, reason: impl ToString) -> Error {
    Error::Cache { operation: operation.to_string(), reason: reason.to_string() }
}

pub struct PersistentCache {
    db: sled::Db,
}

impl PersistentCache {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| cache_error("open", e))?;
        Ok(Self { db })
    }

    /// A transient store for tests and callers that disable L2 durability.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| cache_error("open", e))?;
        Ok(Self { db })
    }

    pub fn get(&self, key: &str, now: i64) -> Result<Option<CacheEntry>> {
        let Some(raw) = self.db.get(key.as_bytes()).map_err(|e| cache_error("get", e))? else {
            return Ok(None);
        };
        let mut record: StoredRecord =
            bincode::deserialize(&raw).map_err(|e| cache_error("deserialize", e))?;

        if record.expires_at <= now {
            self.db.remove(key.as_bytes()).map_err(|e| cache_error("delete", e))?;
            return Ok(None);
        }

        record.hit_count += 1;
        record.last_accessed = now;
        let encoded = bincode::serialize(&record).map_err(|e| cache_error("serialize", e))?;
        self.db.insert(key.as_bytes(), encoded).map_err(|e| cache_error("insert", e))?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            payload: record.payload,
            created_at: record.created_at,
            expires_at: record.expires_at,
            hit_count: record.hit_count,
        }))
    }

    pub fn set(&self, key: &str, payload: Vec<u8>, ttl_seconds: u64, now: i64) -> Result<()> {
        let record = StoredRecord {
            payload,
            created_at: now,
            expires_at: now + ttl_seconds as i64,
            hit_count: 0,
            last_accessed: now,
        };
        let encoded = bincode::serialize(&record).map_err(|e| cache_error("serialize", e))?;
        self.db.insert(key.as_bytes(), encoded).map_err(|e| cache_error("insert", e))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.db.remove(key.as_bytes()).map_err(|e| cache_error("delete", e))?.is_some())
    }

    /// One round trip over the underlying tree; returns a dense map preserving
    /// `keys`' input order, `None` for any miss or expired entry.
    pub fn get_batch(&self, keys: &[String], now: i64) -> Result<Vec<(String, Option<CacheEntry>)>> {
        keys.iter().map(|key| Ok((key.clone(), self.get(key, now)?))).collect()
    }

    pub fn set_batch(&self, entries: &[(String, Vec<u8>)], ttl_seconds: u64, now: i64) -> Result<usize> {
        let mut batch = sled::Batch::default();
        for (key, payload) in entries {
            let record = StoredRecord {
                payload: payload.clone(),
                created_at: now,
                expires_at: now + ttl_seconds as i64,
                hit_count: 0,
                last_accessed: now,
            };
            let encoded = bincode::serialize(&record).map_err(|e| cache_error("serialize", e))?;
            batch.insert(key.as_bytes(), encoded);
        }
        self.db.apply_batch(batch).map_err(|e| cache_error("batch_insert", e))?;
        Ok(entries.len())
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut count = 0;
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(|e| cache_error("scan", e))?;
            self.db.remove(key).map_err(|e| cache_error("delete", e))?;
            count += 1;
        }
        debug!("L2 cache invalidated {count} entries under prefix '{prefix}'");
        Ok(count)
    }

    pub fn cleanup_expired(&self, now: i64) -> Result<usize> {
        let mut expired = Vec::new();
        for item in self.db.iter() {
            let (key, raw) = item.map_err(|e| cache_error("scan", e))?;
            let record: StoredRecord =
                bincode::deserialize(&raw).map_err(|e| cache_error("deserialize", e))?;
            if record.expires_at <= now {
                expired.push(key);
            }
        }
        let count = expired.len();
        for key in expired {
            self.db.remove(key).map_err(|e| cache_error("delete", e))?;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let cache = PersistentCache::temporary().unwrap();
        cache.set("discovery:GSE1", b"payload".to_vec(), 3600, 1000).unwrap();
        let entry = cache.get("discovery:GSE1", 1100).unwrap().unwrap();
        assert_eq!(entry.payload, b"payload");
        assert_eq!(entry.hit_count, 1);
    }

    #[test]
    fn expired_entries_are_deleted_on_read() {
        let cache = PersistentCache::temporary().unwrap();
        cache.set("search:GSE1", b"x".to_vec(), 10, 1000).unwrap();
        assert!(cache.get("search:GSE1", 1011).unwrap().is_none());
        assert!(cache.get("search:GSE1", 1011).unwrap().is_none());
    }

    #[test]
    fn invalidate_prefix_scopes_to_namespace() {
        let cache = PersistentCache::temporary().unwrap();
        cache.set("discovery:GSE1", b"a".to_vec(), 3600, 1000).unwrap();
        cache.set("discovery:GSE2", b"b".to_vec(), 3600, 1000).unwrap();
        cache.set("search:GSE1", b"c".to_vec(), 3600, 1000).unwrap();

        let removed = cache.invalidate_prefix("discovery:").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn batch_get_preserves_input_order_with_dense_misses() {
        let cache = PersistentCache::temporary().unwrap();
        cache.set("a", b"1".to_vec(), 3600, 1000).unwrap();
        cache.set("c", b"3".to_vec(), 3600, 1000).unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = cache.get_batch(&keys, 1001).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].0, "a");
        assert!(result[0].1.is_some());
        assert_eq!(result[1].0, "b");
        assert!(result[1].1.is_none());
        assert_eq!(result[2].0, "c");
        assert!(result[2].1.is_some());
    }

    #[test]
    fn cleanup_expired_counts_and_removes() {
        let cache = PersistentCache::temporary().unwrap();
        cache.set("a", b"1".to_vec(), 1, 1000).unwrap();
        cache.set("b", b"2".to_vec(), 3600, 1000).unwrap();

        let removed = cache.cleanup_expired(1002).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }
}
