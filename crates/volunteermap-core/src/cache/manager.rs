use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::store::{FileStore, KeyValueStore, MemoryStore, StoreError};
use super::{EVENTS_KEY, USER_INFO_KEY};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache key must not be empty")]
    InvalidKey,

    #[error("Key \"{key}\" not in cache")]
    Miss { key: String },

    #[error("Cache entry \"{key}\" is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value for \"{key}\": {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss { .. })
    }
}

/// A persisted value together with the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.cached_at)
    }
}

/// Human readable age of a snapshot: "just now", "5m ago", "2h ago", "3d ago"
pub fn age_display(cached_at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - cached_at).num_minutes();
    if minutes < 1 {
        // Includes negative ages from clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Network,
    Cache { cached_at: DateTime<Utc> },
}

impl DataOrigin {
    pub fn is_offline(&self) -> bool {
        matches!(self, DataOrigin::Cache { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub origin: DataOrigin,
}

/// Network-first cache over a [`KeyValueStore`].
/// Clone is cheap - the store is shared.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
}

impl CacheManager {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_shared(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// File-backed cache rooted at `cache_dir`
    pub fn open_dir(cache_dir: PathBuf) -> Result<Self, CacheError> {
        Ok(Self::new(FileStore::new(cache_dir)?))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Await `pending`; on success persist its value under `key` and return
    /// it, on failure return the last value persisted under `key`.
    ///
    /// Fails with [`CacheError::Miss`] when the request failed and nothing
    /// was ever cached for `key`.
    pub async fn fetch_with_cache_fallback<T, E, F>(
        &self,
        key: &str,
        pending: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        self.fetch_with_origin(key, pending).await.map(|fetched| fetched.value)
    }

    /// Same as [`fetch_with_cache_fallback`](Self::fetch_with_cache_fallback),
    /// also reporting whether the value is fresh or a cached snapshot.
    pub async fn fetch_with_origin<T, E, F>(
        &self,
        key: &str,
        pending: F,
    ) -> Result<Fetched<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        check_key(key)?;

        match pending.await {
            Ok(value) => {
                // A failed write must not cost the caller a good response
                if let Err(e) = self.set_in_cache(key, &value).await {
                    warn!(key, error = %e, "Failed to update cache, returning network value");
                }
                Ok(Fetched {
                    value,
                    origin: DataOrigin::Network,
                })
            }
            Err(e) => {
                warn!(key, error = %e, "Request failed, falling back to cache");
                let cached = self.get_from_cache::<T>(key).await?;
                debug!(key, age = %cached.age_display(), "Serving cached data");
                Ok(Fetched {
                    value: cached.data,
                    origin: DataOrigin::Cache {
                        cached_at: cached.cached_at,
                    },
                })
            }
        }
    }

    pub async fn set_in_cache<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        check_key(key)?;
        let contents = serde_json::to_string(&CachedData::new(value)).map_err(|source| {
            CacheError::Serialize {
                key: key.to_string(),
                source,
            }
        })?;
        self.store.set(key, &contents).await?;
        Ok(())
    }

    /// Read `key`, failing with [`CacheError::Miss`] when absent.
    pub async fn get_from_cache<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<CachedData<T>, CacheError> {
        self.load(key).await?.ok_or_else(|| CacheError::Miss {
            key: key.to_string(),
        })
    }

    pub async fn load<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<CachedData<T>>, CacheError> {
        check_key(key)?;
        let Some(contents) = self.store.get(key).await? else {
            return Ok(None);
        };

        let cached = serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(cached))
    }

    pub async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        for key in keys {
            check_key(key)?;
        }
        self.store.remove(keys).await?;
        Ok(())
    }

    /// Helper to read an entry's age and log errors without failing
    async fn load_age(&self, key: &str) -> Option<String> {
        match self.load::<IgnoredAny>(key).await {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    pub async fn get_cache_ages(&self) -> CacheAges {
        CacheAges {
            events: self.load_age(EVENTS_KEY).await,
            user_info: self.load_age(USER_INFO_KEY).await,
        }
    }
}

fn check_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        Err(CacheError::InvalidKey)
    } else {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub events: Option<String>,
    pub user_info: Option<String>,
}

impl CacheAges {
    pub fn events_age(&self) -> String {
        self.events.clone().unwrap_or_else(|| "never".to_string())
    }

    pub fn user_info_age(&self) -> String {
        self.user_info.clone().unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn offline<T>() -> Result<T, String> {
        Err("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_fallback_returns_last_network_value() {
        let cache = CacheManager::in_memory();

        let fresh = cache
            .fetch_with_cache_fallback("events", async { Ok::<_, String>(vec![1, 2, 3]) })
            .await
            .unwrap();
        assert_eq!(fresh, vec![1, 2, 3]);

        let fallback: Vec<i32> = cache
            .fetch_with_cache_fallback("events", offline())
            .await
            .unwrap();
        assert_eq!(fallback, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fallback_without_entry_is_miss() {
        let cache = CacheManager::in_memory();
        let err = cache
            .fetch_with_cache_fallback::<Vec<i32>, _, _>("events", offline())
            .await
            .unwrap_err();
        assert!(err.is_miss());
        assert_eq!(err.to_string(), "Key \"events\" not in cache");
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = CacheManager::in_memory();
        cache
            .fetch_with_cache_fallback("userInfo", async { Ok::<_, String>("old".to_string()) })
            .await
            .unwrap();
        cache
            .fetch_with_cache_fallback("userInfo", async { Ok::<_, String>("new".to_string()) })
            .await
            .unwrap();

        let cached: String = cache.fetch_with_cache_fallback("userInfo", offline()).await.unwrap();
        assert_eq!(cached, "new");
    }

    #[tokio::test]
    async fn test_failed_request_does_not_write() {
        let cache = CacheManager::in_memory();
        let _ = cache
            .fetch_with_cache_fallback::<String, _, _>("events", offline())
            .await;
        assert!(cache.load::<String>("events").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_origin_reports_snapshot_time() {
        let cache = CacheManager::in_memory();
        let network = cache
            .fetch_with_origin("events", async { Ok::<_, String>(7) })
            .await
            .unwrap();
        assert_eq!(network.origin, DataOrigin::Network);

        let snapshot = cache.fetch_with_origin::<i32, _, _>("events", offline()).await.unwrap();
        assert_eq!(snapshot.value, 7);
        assert!(snapshot.origin.is_offline());
    }

    /// Reads pass through, every write fails
    struct ReadOnlyStore(MemoryStore);

    #[async_trait::async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key).await
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
            self.0.remove(keys).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_still_returns_network_value() {
        let memory = MemoryStore::new();
        memory
            .set("events", r#"{"data":[1],"cached_at":"2023-10-20T17:00:00Z"}"#)
            .await
            .unwrap();
        let cache = CacheManager::new(ReadOnlyStore(memory));

        let fetched = cache
            .fetch_with_origin("events", async { Ok::<_, String>(vec![2, 3]) })
            .await
            .unwrap();
        assert_eq!(fetched.value, vec![2, 3]);
        assert_eq!(fetched.origin, DataOrigin::Network);

        let kept = cache.get_from_cache::<Vec<i32>>("events").await.unwrap();
        assert_eq!(kept.data, vec![1]);
    }

    #[tokio::test]
    async fn test_unserializable_value_keeps_previous_entry() {
        use std::collections::HashMap;

        let cache = CacheManager::in_memory();
        let mut before = HashMap::new();
        before.insert((0, 0), 1);
        // JSON object keys must be strings, so tuple keys cannot be written
        assert!(matches!(
            cache.set_in_cache("grid", &before).await,
            Err(CacheError::Serialize { .. })
        ));
        cache.set_in_cache("grid", &HashMap::<(i32, i32), i32>::new()).await.unwrap();

        let mut grid = HashMap::new();
        grid.insert((1, 2), 3);
        let fetched = cache
            .fetch_with_origin("grid", async move { Ok::<_, String>(grid) })
            .await
            .unwrap();
        assert_eq!(fetched.value.get(&(1, 2)), Some(&3));
        assert_eq!(fetched.origin, DataOrigin::Network);

        let kept = cache.get_from_cache::<HashMap<(i32, i32), i32>>("grid").await.unwrap();
        assert!(kept.data.is_empty());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let cache = CacheManager::in_memory();
        let err = cache
            .fetch_with_cache_fallback("", async { Ok::<_, String>(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey));
    }

    #[tokio::test]
    async fn test_corrupt_entry_surfaces() {
        let store = Arc::new(MemoryStore::new());
        store.set("events", "not json").await.unwrap();
        let cache = CacheManager::from_shared(store);

        let err = cache
            .fetch_with_cache_fallback::<Vec<i32>, _, _>("events", offline())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_remove_then_miss() {
        let cache = CacheManager::in_memory();
        cache.set_in_cache("accessToken", &"token").await.unwrap();
        cache.remove(&["accessToken"]).await.unwrap();
        assert!(cache.get_from_cache::<String>("accessToken").await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn test_file_cache_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = CacheManager::open_dir(dir.path().to_path_buf()).unwrap();
            let fresh = async { Ok::<_, String>(vec!["a".to_string()]) };
            cache.fetch_with_cache_fallback("events", fresh).await.unwrap();
        }

        let cache = CacheManager::open_dir(dir.path().to_path_buf()).unwrap();
        let events: Vec<String> = cache
            .fetch_with_cache_fallback("events", offline())
            .await
            .unwrap();
        assert_eq!(events, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_cache_ages() {
        let cache = CacheManager::in_memory();
        assert_eq!(cache.get_cache_ages().await.events_age(), "never");

        cache.set_in_cache(EVENTS_KEY, &vec![1]).await.unwrap();
        let ages = cache.get_cache_ages().await;
        assert_eq!(ages.events_age(), "just now");
        assert_eq!(ages.user_info_age(), "never");
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(Utc::now()), "just now");
        assert_eq!(age_display(Utc::now() + Duration::minutes(5)), "just now");
        assert_eq!(age_display(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(Utc::now() - Duration::minutes(90)), "2h ago");
        assert_eq!(age_display(Utc::now() - Duration::minutes(70)), "1h ago");
        assert_eq!(age_display(Utc::now() - Duration::days(3)), "3d ago");
    }
}
