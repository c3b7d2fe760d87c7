//! Key-value caching subsystem.
//!
//! Every piece of state the proxy keeps lives behind [`KeyValueCache`]:
//! chart snapshots, the catalog bearer token, catalog search results and
//! the rate-limit flag. The trait is the seam for shared backends; the
//! in-process [`MemoryCache`] is the default.
//!
//! Values are JSON. A stored `null` is a real entry (negative caching), so
//! `get` distinguishes `Some(Value::Null)` from `None`.
//!
//! Implementations must be atomic per key. No multi-key transactions are
//! assumed; callers tolerate read-then-act races.

pub mod keys;
pub mod memory;

pub use memory::MemoryCache;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::Result;

/// Mapping from string keys to JSON values with optional per-key expiry.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Look up a key. `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or overwrite a key. `ttl == None` keeps it until evicted or
    /// cleared.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key.
    async fn clear(&self) -> Result<()>;

    /// Look up several keys. Missing keys are absent from the result map;
    /// keys holding `null` are present.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert((*key).to_string(), value);
            }
        }
        Ok(found)
    }
}

/// Fetch and decode a typed value.
///
/// An entry that no longer decodes (e.g. written by an older build) is
/// reported as a miss.
pub async fn get_typed<T: DeserializeOwned>(
    cache: &dyn KeyValueCache,
    key: &str,
) -> Result<Option<T>> {
    let Some(value) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            warn!(key, error = %e, "Discarding undecodable cache entry");
            Ok(None)
        }
    }
}

/// Encode and store a typed value.
pub async fn set_typed<T: Serialize + ?Sized>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    cache.set(key, serde_json::to_value(value)?, ttl).await
}
