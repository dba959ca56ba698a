use axum::http::StatusCode;
use moka::future::Cache as MokaCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::time::Duration;

use crate::services::meta_ads::SyncError;

/// Cache of JSON values with a fixed time to live
#[derive(Clone)]
pub struct Cache {
    inner: MokaCache<String, Value>,
}

/// Fetch failure carrying the HTTP status it should surface as
pub struct CacheError {
    status: StatusCode,
    message: String,
}

impl From<SyncError> for CacheError {
    fn from(e: SyncError) -> Self {
        CacheError {
            status: e.status_code(),
            message: e.to_string(),
        }
    }
}

impl From<CacheError> for (StatusCode, String) {
    fn from(e: CacheError) -> Self {
        (e.status, e.message)
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl Cache {
    /// Create a new cache holding 10,000 entries for 5 minutes
    pub fn new() -> Self {
        Self::with_config(10_000, 300)
    }

    pub fn with_config(capacity: u64, ttl_secs: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner }
    }

    /// Cached function execution that returns the deserialized type
    ///
    /// # Arguments
    /// * `cache_key` - The key to store/retrieve from cache
    /// * `fetch_fn` - Async function that fetches the data if cache miss
    ///
    /// # Returns
    /// * `Ok(T)` with the deserialized data on success
    /// * `Err((StatusCode, String))` on error
    pub async fn cached<F, T, E>(
        &self,
        cache_key: String,
        fetch_fn: F,
    ) -> Result<T, (StatusCode, String)>
    where
        F: std::future::Future<Output = Result<T, E>>,
        T: Serialize + for<'de> Deserialize<'de>,
        E: Into<CacheError>,
    {
        cached(&self.inner, cache_key, fetch_fn).await
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to build consistent cache keys across the application
pub struct CacheKey {
    namespace: String,
    parts: Vec<String>,
}

impl CacheKey {
    /// Create a new cache key with a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            parts: Vec::new(),
        }
    }

    /// Add a part to the cache key
    pub fn with(mut self, part: impl Display) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Build the final cache key string
    pub fn build(self) -> String {
        if self.parts.is_empty() {
            self.namespace
        } else {
            format!("{}:{}", self.namespace, self.parts.join(":"))
        }
    }
}

/// Cached function execution wrapper
///
/// Checks the cache first; on a miss runs `fetch_fn`, stores the result as JSON
/// and returns it. Errors are never cached.
pub async fn cached<F, T, E>(
    cache: &MokaCache<String, Value>,
    cache_key: String,
    fetch_fn: F,
) -> Result<T, (StatusCode, String)>
where
    F: std::future::Future<Output = Result<T, E>>,
    T: Serialize + for<'de> Deserialize<'de>,
    E: Into<CacheError>,
{
    if let Some(cached_data) = cache.get(&cache_key).await {
        return serde_json::from_value(cached_data).map_err(|e| {
            log::error!("Error deserializing cached data for {}: {}", cache_key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to deserialize cached data".to_string(),
            )
        });
    }

    let result = fetch_fn.await.map_err(|e| {
        let err: CacheError = e.into();
        log::error!("Error fetching data for {}: {}", cache_key, err);
        let res: (StatusCode, String) = err.into();
        res
    })?;

    let result_value = serde_json::to_value(&result).map_err(|e| {
        log::error!("Error serializing result for {}: {}", cache_key, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to serialize result".to_string(),
        )
    })?;

    cache.insert(cache_key, result_value).await;

    Ok(result)
}
