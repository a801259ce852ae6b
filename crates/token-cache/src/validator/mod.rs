//! Remote token validation (the source of truth).
//!
//! The Auth Service answers "valid, with claims" or "invalid, with reason".
//! Only transport failures are errors; they must reach the caller so it can
//! fail closed.

pub mod grpc;

use crate::claims::ValidationResponse;
use crate::errors::CacheError;
use async_trait::async_trait;

pub use grpc::GrpcTokenValidator;

/// Trait for remote validation (enables mocking).
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate a raw token.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ValidatorUnavailable` on transport failure.
    async fn validate_token(&self, token: &str) -> Result<ValidationResponse, CacheError>;
}

/// Mock validator module for testing.
pub mod mock {
    use super::*;
    use crate::claims::UserClaims;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock Auth Service.
    ///
    /// Tokens registered with [`MockValidator::with_token`] validate with
    /// their claims; anything else is rejected as invalid.
    #[derive(Default)]
    pub struct MockValidator {
        tokens: HashMap<String, UserClaims>,
        call_count: AtomicUsize,
        return_error: AtomicBool,
        latency: Option<Duration>,
    }

    impl MockValidator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a token that validates with `claims`.
        pub fn with_token(mut self, token: &str, claims: UserClaims) -> Self {
            self.tokens.insert(token.to_string(), claims);
            self
        }

        /// Delay every call.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Create a mock that fails at the transport level.
        pub fn failing() -> Self {
            let mock = Self::default();
            mock.return_error.store(true, Ordering::SeqCst);
            mock
        }

        pub fn set_failing(&self, failing: bool) {
            self.return_error.store(failing, Ordering::SeqCst);
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenValidator for MockValidator {
        async fn validate_token(&self, token: &str) -> Result<ValidationResponse, CacheError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.latency {
                tokio::time::sleep(delay).await;
            }

            if self.return_error.load(Ordering::SeqCst) {
                return Err(CacheError::ValidatorUnavailable(
                    "Mock auth service error".to_string(),
                ));
            }

            if token.is_empty() {
                return Ok(ValidationResponse::invalid("Token is required"));
            }

            match self.tokens.get(token) {
                Some(claims) => Ok(ValidationResponse::valid(claims.clone())),
                None => Ok(ValidationResponse::invalid("Token is not valid")),
            }
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        fn claims() -> UserClaims {
            UserClaims {
                user_id: 1,
                email: "a@example.com".to_string(),
                issuer: "auth-service".to_string(),
                subject: "1".to_string(),
                expires_at: 2_000_000_000,
                issued_at: 1_999_996_400,
            }
        }

        #[tokio::test]
        async fn test_mock_known_and_unknown_tokens() {
            let mock = MockValidator::new().with_token("good", claims());

            let ok = mock.validate_token("good").await.unwrap();
            assert!(ok.is_valid);

            let bad = mock.validate_token("bad").await.unwrap();
            assert!(!bad.is_valid);
            assert_eq!(bad.error_message, "Token is not valid");

            assert_eq!(mock.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_failing() {
            let mock = MockValidator::failing();
            let result = mock.validate_token("good").await;

            assert!(matches!(result, Err(CacheError::ValidatorUnavailable(_))));
            assert_eq!(mock.call_count(), 1);
        }
    }
}
