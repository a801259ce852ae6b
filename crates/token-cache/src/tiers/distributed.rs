//! Tier 2: shared Redis cache.
//!
//! Values are opaque bytes (the JSON encoding of `CachedClaims`). A missing
//! key is `Ok(None)`, never an error, so callers can tell a miss from a
//! failure.
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently. Each operation clones it; no locking is needed.
//!
//! Timeouts are applied by the caller so every implementation of
//! [`DistributedStore`] is bounded the same way.

use crate::errors::CacheError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Keys fetched per SCAN round trip.
const SCAN_BATCH_SIZE: usize = 500;

/// Operations the orchestrator needs from tier 2 (enables mocking).
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// Fetch a value. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// List keys matching a glob-style pattern (e.g. `auth:token:*`).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Redis-backed tier-2 store.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Open a multiplexed connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the URL is invalid or the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Note: Do NOT log redis_url as it may contain credentials
            error!(
                target: "token_cache.tiers.redis",
                error = %e,
                "Failed to open Redis client"
            );
            CacheError::Redis(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                warn!(
                    target: "token_cache.tiers.redis",
                    error = %e,
                    "Failed to connect to Redis"
                );
                CacheError::Redis(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl DistributedStore for RedisStore {
    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();

        conn.get(key).await.map_err(|e| {
            warn!(target: "token_cache.tiers.redis", error = %e, "Redis GET failed");
            CacheError::Redis(format!("GET failed: {e}"))
        })
    }

    #[instrument(skip_all, fields(ttl_ms = ttl.as_millis() as u64))]
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        // PX keeps sub-second precision; never send 0 (Redis rejects it)
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(target: "token_cache.tiers.redis", error = %e, "Redis SET failed");
                CacheError::Redis(format!("SET failed: {e}"))
            })?;

        Ok(())
    }

    #[instrument(skip_all, fields(key_count = keys.len()))]
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();

        let removed: u64 = conn.del(keys).await.map_err(|e| {
            warn!(target: "token_cache.tiers.redis", error = %e, "Redis DEL failed");
            CacheError::Redis(format!("DEL failed: {e}"))
        })?;

        debug!(target: "token_cache.tiers.redis", removed = removed, "Deleted keys");
        Ok(removed)
    }

    /// Uses cursor-based SCAN rather than KEYS so a large keyspace never
    /// blocks the Redis server.
    #[instrument(skip_all)]
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    warn!(target: "token_cache.tiers.redis", error = %e, "Redis SCAN failed");
                    CacheError::Redis(format!("SCAN failed: {e}"))
                })?;

            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Redis(format!("PING failed: {e}")))?;

        Ok(())
    }
}

/// In-memory tier-2 store for tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Stored value plus the TTL it was written with.
    #[derive(Debug, Clone)]
    pub struct StoredValue {
        pub bytes: Vec<u8>,
        pub ttl: Option<Duration>,
    }

    /// `DistributedStore` backed by a `HashMap`, with failure and latency injection.
    #[derive(Default)]
    pub struct InMemoryStore {
        entries: Mutex<HashMap<String, StoredValue>>,
        failing: AtomicBool,
        latency: Mutex<Option<Duration>>,
        get_calls: AtomicUsize,
        set_calls: AtomicUsize,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent operation return `CacheError::Redis`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Delay every subsequent operation.
        pub async fn set_latency(&self, latency: Option<Duration>) {
            *self.latency.lock().await = latency;
        }

        /// Write raw bytes without a TTL (bypasses failure injection).
        pub async fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), StoredValue { bytes, ttl: None });
        }

        pub async fn stored(&self, key: &str) -> Option<StoredValue> {
            self.entries.lock().await.get(key).cloned()
        }

        pub async fn contains(&self, key: &str) -> bool {
            self.entries.lock().await.contains_key(key)
        }

        pub async fn len(&self) -> usize {
            self.entries.lock().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.len().await == 0
        }

        pub fn get_calls(&self) -> usize {
            self.get_calls.load(Ordering::SeqCst)
        }

        pub fn set_calls(&self) -> usize {
            self.set_calls.load(Ordering::SeqCst)
        }

        async fn before_op(&self) -> Result<(), CacheError> {
            let latency = *self.latency.lock().await;
            if let Some(delay) = latency {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(CacheError::Redis("Mock Redis failure".to_string()));
            }
            Ok(())
        }
    }

    fn matches(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => pattern == key,
        }
    }

    #[async_trait]
    impl DistributedStore for InMemoryStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.before_op().await?;
            Ok(self
                .entries
                .lock()
                .await
                .get(key)
                .map(|value| value.bytes.clone()))
        }

        async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.before_op().await?;
            self.entries.lock().await.insert(
                key.to_string(),
                StoredValue {
                    bytes: value.to_vec(),
                    ttl: Some(ttl),
                },
            );
            Ok(())
        }

        async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
            self.before_op().await?;
            let mut entries = self.entries.lock().await;
            let removed = keys
                .iter()
                .filter(|key| entries.remove(key.as_str()).is_some())
                .count();
            Ok(removed as u64)
        }

        async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
            self.before_op().await?;
            let mut keys: Vec<String> = self
                .entries
                .lock()
                .await
                .keys()
                .filter(|key| matches(pattern, key))
                .cloned()
                .collect();
            keys.sort_unstable();
            Ok(keys)
        }

        async fn ping(&self) -> Result<(), CacheError> {
            self.before_op().await
        }
    }

}
