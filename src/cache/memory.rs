//! In-process [`KeyValueCache`] backed by moka.
//!
//! moka applies expiry per entry through the [`Expiry`] hook, so each value
//! carries its own TTL. Overwriting a key resets its TTL to the new value's.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;

use super::KeyValueCache;
use crate::Result;

/// Default maximum number of entries.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Clone, Debug)]
struct Stored {
    value: Value,
    ttl: Option<Duration>,
}

struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Bounded in-memory cache with per-key expiry.
///
/// Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Stored>,
}

impl MemoryCache {
    /// Create an empty cache with the default capacity (10,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a custom capacity.
    pub fn with_max_entries(max: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }

    /// Approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).await.map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(key.to_string(), Stored { value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(stored) = self.entries.get(*key).await {
                found.insert((*key).to_string(), stored.value);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_every_json_kind() {
        let cache = MemoryCache::new();
        for (i, value) in [
            json!("string value"),
            json!(42),
            json!({"key": "value"}),
            json!(["item1", "item2"]),
            Value::Null,
        ]
        .into_iter()
        .enumerate()
        {
            let key = format!("k{i}");
            cache.set(&key, value.clone(), None).await.unwrap();
            assert_eq!(cache.get(&key).await.unwrap(), Some(value));
        }
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), None).await.unwrap();
        cache.set("k", json!(2), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn delete_missing_key_is_ok() {
        let cache = MemoryCache::new();
        cache.delete("nonexistent_key").await.unwrap();
    }
}
