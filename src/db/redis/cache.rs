use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use std::time::Duration;

use crate::error::AppError;
use crate::error::AppResult;
use crate::repositories::CacheStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Blended recommendations for one user
    Recommendations(i32),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Recommendations(user_id) => write!(f, "recommendations:user:{}", user_id),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Redis-backed cache store
///
/// Wraps a `ConnectionManager`, which multiplexes commands over a single
/// connection and reconnects on failure; clones share that connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn new(client: Client) -> AppResult<Self> {
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key.to_string()).await?;
        Ok(cached)
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key.to_string(), value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> AppResult<()> {
        let mut conn = self.conn.clone();
        // DEL reports how many keys went away; zero is still success
        let _: i64 = conn.del(key.to_string()).await?;
        Ok(())
    }

    async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key.to_string()).await?;
        Ok(exists)
    }
}

/// Retrieves and deserializes a value from the cache
///
/// Returns `None` on a miss. A stored value that no longer deserializes is
/// reported as an error so callers can decide to recompute.
pub async fn read_json<T: serde::de::DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &CacheKey,
) -> AppResult<Option<T>> {
    match cache.get(key).await? {
        Some(json) => {
            let data = serde_json::from_str(&json)
                .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

/// Serializes a value and stores it under `key` with the given TTL
pub async fn write_json<T: serde::Serialize>(
    cache: &dyn CacheStore,
    key: &CacheKey,
    value: &T,
    ttl: Duration,
) -> AppResult<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;
    cache.set(key, json, ttl).await
}
