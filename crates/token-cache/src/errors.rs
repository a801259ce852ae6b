//! Token cache error types.
//!
//! Only validator failures ever reach a caller of `validate`. Every tier-2
//! failure is classified, counted, and recovered inside the orchestrator.
//! Internal details are logged where the failure happens but not exposed
//! through `client_message`.

use thiserror::Error;

/// Token cache error type.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote validator could not be reached or failed at the transport level.
    #[error("Auth service unavailable: {0}")]
    ValidatorUnavailable(String),

    /// The remote validator did not answer within the configured timeout.
    #[error("Auth service timed out")]
    ValidatorTimeout,

    /// Redis command or connection failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// Redis command did not complete within the tier-2 timeout.
    #[error("Redis operation timed out")]
    Tier2Timeout,

    /// A cache entry could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid construction parameters.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// True when the source of truth itself is unreachable.
    ///
    /// Callers must fail closed on these (treat the request as
    /// unauthenticated and answer with a 5xx-class status).
    pub fn is_validator_failure(&self) -> bool {
        matches!(
            self,
            CacheError::ValidatorUnavailable(_) | CacheError::ValidatorTimeout
        )
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            CacheError::ValidatorUnavailable(_) | CacheError::ValidatorTimeout => {
                "Authentication service unavailable".to_string()
            }
            CacheError::Redis(_)
            | CacheError::Tier2Timeout
            | CacheError::Serialization(_)
            | CacheError::Config(_) => "An internal error occurred".to_string(),
        }
    }
}
