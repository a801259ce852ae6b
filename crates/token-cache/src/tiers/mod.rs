//! Cache tiers.
//!
//! - `local` - per-process tier 1 (moka)
//! - `distributed` - shared tier 2 (Redis), behind the `DistributedStore` trait

pub mod distributed;
pub mod local;

pub use distributed::{DistributedStore, RedisStore};
pub use local::LocalTier;
