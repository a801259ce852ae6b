//! Tier 1: in-process cache.
//!
//! Backed by `moka::future::Cache`, which is safe for concurrent use without
//! external locking. Each entry carries its own TTL (computed by the TTL
//! policy), enforced through a moka `Expiry`.

use crate::claims::CachedClaims;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct LocalEntry {
    claims: Arc<CachedClaims>,
    ttl: Duration,
}

/// Applies the per-entry TTL on insert and on overwrite.
struct PerEntryTtl;

impl Expiry<String, LocalEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Tier-1 store: `get`, `set`, `delete`, `flush`, `item_count`.
#[derive(Clone)]
pub struct LocalTier {
    inner: Cache<String, LocalEntry>,
}

impl LocalTier {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<CachedClaims>> {
        self.inner.get(key).await.map(|entry| entry.claims)
    }

    pub async fn set(&self, key: &str, claims: Arc<CachedClaims>, ttl: Duration) {
        self.inner
            .insert(key.to_string(), LocalEntry { claims, ttl })
            .await;
    }

    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Drop every entry. Reads stop seeing old entries immediately.
    pub async fn flush(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    /// Number of live entries after pending maintenance has run.
    pub async fn item_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn entry(user_id: u32) -> Arc<CachedClaims> {
        Arc::new(CachedClaims {
            user_id,
            email: format!("user{user_id}@example.com"),
            issuer: "auth-service".to_string(),
            subject: user_id.to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
            issued_at: chrono::Utc::now().timestamp(),
            cached_at: chrono::Utc::now().timestamp(),
        })
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let tier = LocalTier::new(100);

        tier.set("auth:token:a", entry(1), Duration::from_secs(60))
            .await;
        let found = tier.get("auth:token:a").await.unwrap();
        assert_eq!(found.user_id, 1);

        tier.delete("auth:token:a").await;
        assert!(tier.get("auth:token:a").await.is_none());
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let tier = LocalTier::new(100);
        assert!(tier.get("auth:token:missing").await.is_none());
    }

    #[tokio::test]
    async fn test_flush_and_item_count() {
        let tier = LocalTier::new(100);

        for i in 0..5 {
            tier.set(&format!("auth:token:{i}"), entry(i), Duration::from_secs(60))
                .await;
        }
        assert_eq!(tier.item_count().await, 5);

        tier.flush().await;
        assert_eq!(tier.item_count().await, 0);
        assert!(tier.get("auth:token:0").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let tier = LocalTier::new(100);

        tier.set("auth:token:short", entry(7), Duration::from_millis(50))
            .await;
        assert!(tier.get("auth:token:short").await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(tier.get("auth:token:short").await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_ttl() {
        let tier = LocalTier::new(100);

        tier.set("auth:token:k", entry(1), Duration::from_millis(50))
            .await;
        tier.set("auth:token:k", entry(2), Duration::from_secs(60))
            .await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        let found = tier.get("auth:token:k").await.unwrap();
        assert_eq!(found.user_id, 2);
    }
}
