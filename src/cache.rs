//! On-disk TTL cache for API responses
//!
//! Entries are postcard-encoded `(value, expires_at)` pairs stored in a fjall
//! keyspace, so repeated runs against the same area within the TTL do not hit
//! the provider again.

use anyhow::{Result, anyhow};
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (seconds)
}

fn get_from_store(store: &Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

/// Persistent key/value cache with per-entry expiry
#[derive(Clone)]
pub struct PersistentCache {
    store: Keyspace,
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache").finish_non_exhaustive()
    }
}

impl PersistentCache {
    /// Open (or create) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace("responses", fjall::KeyspaceCreateOptions::default)?;
        Ok(PersistentCache { store: items })
    }

    /// Stores a serializable value with a time-to-live (TTL).
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize + Send + Debug + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(&store, &key_bytes)).await??;

        let Some(bytes) = maybe_bytes else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry<T> = match postcard::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                // Written by an older layout; treat as a miss.
                tracing::warn!("Dropping undecodable cache entry: {}", e);
                self.remove(key).await?;
                return Ok(None);
            }
        };
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        if now < entry.expires_at {
            tracing::debug!("Key found and still fresh");
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();

        cache
            .put("obs:40.71,-74.01", "payload".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<String> = cache.get("obs:40.71,-74.01").await.unwrap();
        assert_eq!(value.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();

        let value: Option<String> = cache.get("absent").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();

        cache
            .put("stale", "old".to_string(), Duration::from_secs(0))
            .await
            .unwrap();

        let value: Option<String> = cache.get("stale").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();

        cache
            .put("key", "value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.remove("key").await.unwrap();

        let value: Option<String> = cache.get("key").await.unwrap();
        assert!(value.is_none());
    }
}
