//! Token Cache Library
//!
//! A two-tier read-through cache in front of the Auth Service
//! `ValidateToken` RPC. Services that authenticate every request use it to
//! avoid a network round trip per request:
//!
//! - Tier 1: per-process in-memory cache (microseconds)
//! - Tier 2: Redis shared by every instance (milliseconds)
//! - Auth Service: source of truth (tens of milliseconds)
//!
//! Only positive results are cached, entries never outlive the token they
//! describe, and Redis is strictly optional: when it is down, lookups fall
//! through to the Auth Service and the failure is counted.
//!
//! # Architecture
//!
//! ```text
//! client.rs (orchestrator) -> tiers/local.rs
//!                          -> tiers/distributed.rs
//!                          -> validator/grpc.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Configuration from environment
//! - `errors` - Error types
//! - `claims` - Claims and cache entry models
//! - `key` - Token to cache key derivation
//! - `ttl` - Per-entry TTL policy
//! - `metrics` - In-process request counters
//! - `observability` - Prometheus-style metrics via the `metrics` facade
//! - `tiers` - Tier 1 and tier 2 stores
//! - `validator` - Auth Service client
//! - `client` - `CachedAuthClient`

pub mod claims;
pub mod client;
pub mod config;
pub mod errors;
pub mod key;
pub mod metrics;
pub mod observability;
pub mod tiers;
pub mod ttl;
pub mod validator;

pub use crate::claims::{UserClaims, ValidationResponse};
pub use crate::client::{CacheStats, CachedAuthClient, InvalidationResult};
pub use crate::config::Config;
pub use crate::errors::CacheError;
pub use crate::metrics::{CacheMetrics, MetricsSnapshot};
