//! Two-tier cached Auth Service client.
//!
//! Every validation walks a strict waterfall: tier 1 (in-process), then
//! tier 2 (Redis), then the Auth Service. Each stage produces a classified
//! outcome so the population logic stays separate from failure handling:
//!
//! ```text
//! Tier1Lookup::{Hit, Expired, Miss}
//!   -> Tier2Lookup::{Hit, Miss, Expired, Corrupt, Error}
//!     -> remote call -> populate (positive results only)
//! ```
//!
//! # Failure model
//!
//! - Auth Service unreachable or timed out: returned to the caller, who must
//!   fail closed.
//! - Any tier-2 failure (connect, timeout, corrupt value): counted, logged,
//!   treated as a miss. Never surfaced.
//! - Tier 2 unreachable at construction: disabled for the instance lifetime.
//!
//! Concurrent misses for the same token may each call the Auth Service; the
//! call is idempotent, so no single-flight is attempted.

use crate::claims::{CachedClaims, ValidationResponse};
use crate::config::Config;
use crate::errors::CacheError;
use crate::key::{derive_key, log_fragment, CACHE_KEY_PATTERN};
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::observability::metrics as obs;
use crate::tiers::distributed::{DistributedStore, RedisStore};
use crate::tiers::local::LocalTier;
use crate::ttl::compute_ttl;
use crate::validator::{GrpcTokenValidator, TokenValidator};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Bound on the tier-2 liveness probe at construction.
const TIER2_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on the tier-2 key scan used for stats.
const TIER2_STATS_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound on the tier-2 scan and delete used by a bulk clear.
const TIER2_CLEAR_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of the tier-1 stage.
#[derive(Debug)]
pub(crate) enum Tier1Lookup {
    Hit(Arc<CachedClaims>),
    /// Present but past `expires_at`; the entry must be removed.
    Expired,
    Miss,
}

/// Result of the tier-2 stage.
#[derive(Debug)]
pub(crate) enum Tier2Lookup {
    Hit(CachedClaims),
    Miss,
    /// Present but past `expires_at`; the entry must be removed.
    Expired,
    /// Present but undecodable; the entry must be removed.
    Corrupt(CacheError),
    /// Redis failed or timed out.
    Error(CacheError),
}

pub(crate) fn classify_tier1(entry: Option<Arc<CachedClaims>>, now: i64) -> Tier1Lookup {
    match entry {
        Some(entry) if entry.is_expired_at(now) => Tier1Lookup::Expired,
        Some(entry) => Tier1Lookup::Hit(entry),
        None => Tier1Lookup::Miss,
    }
}

pub(crate) fn classify_tier2(fetched: Result<Option<Vec<u8>>, CacheError>, now: i64) -> Tier2Lookup {
    let bytes = match fetched {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Tier2Lookup::Miss,
        Err(e) => return Tier2Lookup::Error(e),
    };

    match serde_json::from_slice::<CachedClaims>(&bytes) {
        Ok(entry) if entry.is_expired_at(now) => Tier2Lookup::Expired,
        Ok(entry) => Tier2Lookup::Hit(entry),
        Err(e) => Tier2Lookup::Corrupt(CacheError::Serialization(e.to_string())),
    }
}

/// Only successful validations with unexpired claims are cached.
///
/// Negative results are re-validated every time: caching them could mask a
/// token that becomes valid between two checks (clock skew, near-future
/// issuance), and they are cheap for the Auth Service to recompute.
pub(crate) fn should_cache(response: &ValidationResponse, now: i64) -> bool {
    response.is_valid
        && response
            .claims
            .as_ref()
            .is_some_and(|claims| claims.expires_at > now)
}

async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(CacheError::Tier2Timeout))
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tier1_enabled: bool,
    pub tier2_enabled: bool,
    pub tier1_item_count: u64,
    pub tier2_item_count: u64,
    pub tier1_ttl_seconds: u64,
    pub tier2_ttl_seconds: u64,
    pub hit_rate_percent: f64,
    pub metrics: MetricsSnapshot,
}

/// Outcome of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvalidationResult {
    /// Tier-2 keys actually deleted.
    pub tier2_keys_removed: u64,
    /// False when tier 2 was enabled but the scan or delete failed.
    pub tier2_cleared: bool,
}

/// Read-through, write-through validation cache in front of the Auth Service.
///
/// Safe to share across tasks behind an `Arc`; no lock is held across a
/// network call.
pub struct CachedAuthClient {
    validator: Arc<dyn TokenValidator>,
    l1: LocalTier,
    l2: Option<Arc<dyn DistributedStore>>,
    l1_ttl: Duration,
    l2_ttl: Duration,
    cache_enabled: bool,
    l2_timeout: Duration,
    validate_timeout: Duration,
    metrics: Arc<CacheMetrics>,
}

impl CachedAuthClient {
    /// Build the production client: gRPC validator plus Redis tier 2.
    ///
    /// Tier 2 is disabled (not an error) when `REDIS_URL` is empty or Redis
    /// cannot be reached.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the Auth Service URL is invalid.
    pub async fn from_config(config: &Config) -> Result<Self, CacheError> {
        let validator = GrpcTokenValidator::new(&config.auth_service_url, config.validate_timeout)?;

        let l2: Option<Arc<dyn DistributedStore>> = if config.tier2_configured() {
            match tokio::time::timeout(TIER2_PROBE_TIMEOUT, RedisStore::connect(&config.redis_url))
                .await
            {
                Ok(Ok(store)) => Some(Arc::new(store)),
                Ok(Err(e)) => {
                    warn!(target: "token_cache.client", error = %e, "Redis connection failed, running without L2 cache");
                    None
                }
                Err(_) => {
                    warn!(target: "token_cache.client", "Redis connection timed out, running without L2 cache");
                    None
                }
            }
        } else {
            info!(target: "token_cache.client", "REDIS_URL empty, L2 cache disabled");
            None
        };

        Ok(Self::new(
            config,
            Arc::new(validator),
            l2,
            Arc::new(CacheMetrics::new()),
        )
        .await)
    }

    /// Build a client from explicit collaborators.
    ///
    /// Probes `l2` once with `PING`; a failed probe disables tier 2 for the
    /// lifetime of this instance.
    pub async fn new(
        config: &Config,
        validator: Arc<dyn TokenValidator>,
        l2: Option<Arc<dyn DistributedStore>>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        let l2 = match l2 {
            Some(store) => match with_timeout(TIER2_PROBE_TIMEOUT, store.ping()).await {
                Ok(()) => {
                    info!(target: "token_cache.client", "Redis L2 cache connected successfully");
                    Some(store)
                }
                Err(e) => {
                    warn!(target: "token_cache.client", error = %e, "Redis ping failed, running without L2 cache");
                    None
                }
            },
            None => None,
        };

        Self {
            validator,
            l1: LocalTier::new(config.l1_max_capacity),
            l2,
            l1_ttl: config.l1_ttl,
            l2_ttl: config.l2_ttl,
            cache_enabled: config.cache_enabled,
            l2_timeout: config.l2_operation_timeout,
            validate_timeout: config.validate_timeout,
            metrics,
        }
    }

    /// Validate a token, answering from cache when possible.
    ///
    /// # Errors
    ///
    /// Only `CacheError::ValidatorUnavailable` / `CacheError::ValidatorTimeout`,
    /// when a full miss cannot reach the Auth Service.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<ValidationResponse, CacheError> {
        self.metrics.record_request();

        if !self.cache_enabled {
            return self.call_remote(token).await;
        }

        let key = derive_key(token);
        let now = chrono::Utc::now().timestamp();

        match classify_tier1(self.l1.get(&key).await, now) {
            Tier1Lookup::Hit(entry) => {
                self.metrics.record_l1_hit();
                debug!(target: "token_cache.client", key = log_fragment(&key), "L1 cache hit");
                return Ok(entry.to_response());
            }
            Tier1Lookup::Expired => {
                self.l1.delete(&key).await;
                self.metrics.record_l1_miss();
                debug!(target: "token_cache.client", key = log_fragment(&key), "L1 entry expired, removed");
            }
            Tier1Lookup::Miss => self.metrics.record_l1_miss(),
        }

        if let Some(l2) = &self.l2 {
            if let Some(entry) = self.lookup_l2(l2.as_ref(), &key, now).await {
                self.metrics.record_l2_hit();
                debug!(target: "token_cache.client", key = log_fragment(&key), "L2 cache hit, promoting to L1");

                let entry = Arc::new(entry);
                self.store_l1(&key, Arc::clone(&entry)).await;
                return Ok(entry.to_response());
            }
            self.metrics.record_l2_miss();
        }

        debug!(target: "token_cache.client", key = log_fragment(&key), "Cache miss, calling auth service");
        let response = self.call_remote(token).await?;

        if should_cache(&response, chrono::Utc::now().timestamp()) {
            if let Some(claims) = &response.claims {
                let entry = Arc::new(CachedClaims::from_claims(
                    claims,
                    chrono::Utc::now().timestamp(),
                ));
                self.store_l1(&key, Arc::clone(&entry)).await;
                if let Some(l2) = &self.l2 {
                    self.store_l2(l2.as_ref(), &key, &entry).await;
                }
            }
        }

        Ok(response)
    }

    /// Tier-2 stage. Returns an entry only on a clean, unexpired hit; every
    /// other outcome is recovered here.
    async fn lookup_l2(
        &self,
        l2: &dyn DistributedStore,
        key: &str,
        now: i64,
    ) -> Option<CachedClaims> {
        let fetched = with_timeout(self.l2_timeout, l2.get(key)).await;

        match classify_tier2(fetched, now) {
            Tier2Lookup::Hit(entry) => Some(entry),
            Tier2Lookup::Miss => None,
            Tier2Lookup::Expired => {
                obs::record_lookup("l2", "expired");
                debug!(target: "token_cache.client", key = log_fragment(key), "L2 entry expired, removing");
                self.delete_l2(l2, key).await;
                None
            }
            Tier2Lookup::Corrupt(e) => {
                obs::record_lookup("l2", "corrupt");
                warn!(target: "token_cache.client", key = log_fragment(key), error = %e, "Corrupted L2 entry, removing");
                self.delete_l2(l2, key).await;
                None
            }
            Tier2Lookup::Error(e) => {
                self.metrics.record_l2_error("get");
                warn!(target: "token_cache.client", error = %e, "Redis L2 cache error");
                None
            }
        }
    }

    async fn call_remote(&self, token: &str) -> Result<ValidationResponse, CacheError> {
        self.metrics.record_grpc_call();
        let start = Instant::now();

        let result = tokio::time::timeout(self.validate_timeout, self.validator.validate_token(token))
            .await
            .unwrap_or(Err(CacheError::ValidatorTimeout));

        let label = match &result {
            Ok(response) if response.is_valid => "valid",
            Ok(_) => "invalid",
            Err(CacheError::ValidatorTimeout) => "timeout",
            Err(_) => "error",
        };
        obs::record_remote_call(label, start.elapsed());

        if let Err(e) = &result {
            warn!(target: "token_cache.client", error = %e, "Auth service validation failed");
        }
        result
    }

    async fn store_l1(&self, key: &str, entry: Arc<CachedClaims>) {
        let ttl = compute_ttl(entry.expires_at, self.l1_ttl);
        self.l1.set(key, entry, ttl).await;
    }

    /// Failures are counted and logged, never surfaced.
    async fn store_l2(&self, l2: &dyn DistributedStore, key: &str, entry: &CachedClaims) {
        let bytes = match serde_json::to_vec(entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target: "token_cache.client", error = %e, "Failed to serialize entry for L2 cache");
                return;
            }
        };

        let ttl = compute_ttl(entry.expires_at, self.l2_ttl);
        if let Err(e) = with_timeout(self.l2_timeout, l2.set(key, &bytes, ttl)).await {
            self.metrics.record_l2_error("set");
            warn!(target: "token_cache.client", error = %e, "Failed to store in L2 cache");
        }
    }

    async fn delete_l2(&self, l2: &dyn DistributedStore, key: &str) {
        let keys = [key.to_string()];
        if let Err(e) = with_timeout(self.l2_timeout, l2.delete(&keys)).await {
            self.metrics.record_l2_error("del");
            warn!(target: "token_cache.client", error = %e, "Failed to delete L2 entry");
        }
    }

    /// Snapshot of the request counters.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Cache statistics, including item counts per tier.
    ///
    /// The tier-2 count is approximate (a prefix scan) and reads as 0 if the
    /// scan fails.
    pub async fn get_stats(&self) -> CacheStats {
        let tier2_item_count = match &self.l2 {
            Some(l2) => match with_timeout(TIER2_STATS_TIMEOUT, l2.keys(CACHE_KEY_PATTERN)).await
            {
                Ok(keys) => keys.len() as u64,
                Err(e) => {
                    warn!(target: "token_cache.client", error = %e, "Failed to count L2 entries");
                    0
                }
            },
            None => 0,
        };

        let metrics = self.metrics.snapshot();
        CacheStats {
            tier1_enabled: self.cache_enabled,
            tier2_enabled: self.l2.is_some(),
            tier1_item_count: self.l1.item_count().await,
            tier2_item_count,
            tier1_ttl_seconds: self.l1_ttl.as_secs(),
            tier2_ttl_seconds: self.l2_ttl.as_secs(),
            hit_rate_percent: metrics.hit_rate_percent(),
            metrics,
        }
    }

    /// Clear both tiers.
    ///
    /// Tier 1 is always flushed. Tier 2 is cleared best-effort: every key
    /// under the cache namespace is scanned and deleted in one batch, and a
    /// failure there leaves tier 1 cleared anyway.
    pub async fn clear_cache(&self) -> InvalidationResult {
        self.l1.flush().await;
        obs::record_invalidation("all");

        let Some(l2) = &self.l2 else {
            info!(target: "token_cache.client", "Auth cache cleared (L1)");
            return InvalidationResult {
                tier2_keys_removed: 0,
                tier2_cleared: true,
            };
        };

        let cleared = with_timeout(TIER2_CLEAR_TIMEOUT, async {
            let keys = l2.keys(CACHE_KEY_PATTERN).await?;
            l2.delete(&keys).await
        })
        .await;

        match cleared {
            Ok(removed) => {
                info!(
                    target: "token_cache.client",
                    tier2_keys_removed = removed,
                    "Multi-tier auth cache cleared (L1 + L2)"
                );
                InvalidationResult {
                    tier2_keys_removed: removed,
                    tier2_cleared: true,
                }
            }
            Err(e) => {
                warn!(target: "token_cache.client", error = %e, "L1 cleared, L2 clear failed");
                InvalidationResult {
                    tier2_keys_removed: 0,
                    tier2_cleared: false,
                }
            }
        }
    }

    /// Clear both tiers and zero the request counters.
    pub async fn reset(&self) -> InvalidationResult {
        let result = self.clear_cache().await;
        self.metrics.reset();
        result
    }

    /// Remove a single token's entry from both tiers.
    pub async fn invalidate_token(&self, token: &str) -> InvalidationResult {
        let key = derive_key(token);
        self.l1.delete(&key).await;
        obs::record_invalidation("token");

        let Some(l2) = &self.l2 else {
            return InvalidationResult {
                tier2_keys_removed: 0,
                tier2_cleared: true,
            };
        };

        let keys = [key];
        match with_timeout(self.l2_timeout, l2.delete(&keys)).await {
            Ok(removed) => InvalidationResult {
                tier2_keys_removed: removed,
                tier2_cleared: true,
            },
            Err(e) => {
                warn!(target: "token_cache.client", error = %e, "Failed to invalidate L2 entry");
                InvalidationResult {
                    tier2_keys_removed: 0,
                    tier2_cleared: false,
                }
            }
        }
    }

    /// Whether tier 2 survived the construction probe.
    pub fn tier2_enabled(&self) -> bool {
        self.l2.is_some()
    }

    /// Shut down: flush tier 1 and release the Redis connection and the
    /// Auth Service channel.
    ///
    /// Unlike [`clear_cache`](Self::clear_cache), this does not delete the
    /// shared `auth:token:*` entries in tier 2; other instances keep using
    /// them. Hosts that need a full purge on shutdown should call
    /// `clear_cache` before `close`.
    pub async fn close(self) {
        self.l1.flush().await;
        info!(target: "token_cache.client", "Cached auth client closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::claims::UserClaims;

    const NOW: i64 = 1_700_000_000;

    fn entry(expires_at: i64) -> CachedClaims {
        CachedClaims {
            user_id: 5,
            email: "carol@example.com".to_string(),
            issuer: "auth-service".to_string(),
            subject: "5".to_string(),
            expires_at,
            issued_at: NOW - 60,
            cached_at: NOW - 30,
        }
    }

    #[test]
    fn test_classify_tier1() {
        assert!(matches!(classify_tier1(None, NOW), Tier1Lookup::Miss));
        assert!(matches!(
            classify_tier1(Some(Arc::new(entry(NOW + 1))), NOW),
            Tier1Lookup::Hit(_)
        ));
        assert!(matches!(
            classify_tier1(Some(Arc::new(entry(NOW))), NOW),
            Tier1Lookup::Expired
        ));
    }

    #[test]
    fn test_classify_tier2_outcomes() {
        let fresh = serde_json::to_vec(&entry(NOW + 600)).unwrap();
        let stale = serde_json::to_vec(&entry(NOW - 1)).unwrap();

        assert!(matches!(classify_tier2(Ok(None), NOW), Tier2Lookup::Miss));
        assert!(matches!(
            classify_tier2(Ok(Some(fresh)), NOW),
            Tier2Lookup::Hit(e) if e.user_id == 5
        ));
        assert!(matches!(
            classify_tier2(Ok(Some(stale)), NOW),
            Tier2Lookup::Expired
        ));
        assert!(matches!(
            classify_tier2(Ok(Some(b"{not json".to_vec())), NOW),
            Tier2Lookup::Corrupt(CacheError::Serialization(_))
        ));
        assert!(matches!(
            classify_tier2(Err(CacheError::Tier2Timeout), NOW),
            Tier2Lookup::Error(CacheError::Tier2Timeout)
        ));
    }

    #[test]
    fn test_should_cache_only_positive_unexpired() {
        let claims = UserClaims {
            user_id: 5,
            email: "carol@example.com".to_string(),
            issuer: "auth-service".to_string(),
            subject: "5".to_string(),
            expires_at: NOW + 60,
            issued_at: NOW - 60,
        };

        assert!(should_cache(&ValidationResponse::valid(claims.clone()), NOW));
        assert!(!should_cache(
            &ValidationResponse::invalid("Token is not valid"),
            NOW
        ));
        assert!(!should_cache(&ValidationResponse::valid(claims), NOW + 60));

        let valid_without_claims = ValidationResponse {
            is_valid: true,
            claims: None,
            error_message: String::new(),
        };
        assert!(!should_cache(&valid_without_claims, NOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_maps_elapsed_to_tier2_timeout() {
        let result: Result<(), CacheError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(CacheError::Tier2Timeout)));
    }
}
