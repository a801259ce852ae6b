//! Auth Service gRPC client.
//!
//! Calls `auth_service.AuthService/ValidateToken`. The channel connects
//! lazily, so a validator that is down at startup does not block
//! construction; the first call reports it instead.
//!
//! # Security
//!
//! - The raw token is sent only in the request body and never logged
//! - Timeouts prevent hanging connections
//! - Transport errors are logged here and surfaced with a generic message

use super::TokenValidator;
use crate::claims::{UserClaims, ValidationResponse};
use crate::errors::CacheError;
use async_trait::async_trait;
use proto::auth_service_client::AuthServiceClient;
use std::time::{Duration, Instant};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request};
use tracing::{error, instrument, warn};

/// Connect timeout for the Auth Service channel.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Generated Auth Service messages and client (see `proto/auth_service.proto`).
pub mod proto {
    include!("../generated/auth_service.rs");
}

impl From<proto::UserClaims> for UserClaims {
    fn from(claims: proto::UserClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            issuer: claims.issuer,
            subject: claims.subject,
            expires_at: claims.expires_at,
            issued_at: claims.issued_at,
        }
    }
}

impl From<proto::ValidateTokenResponse> for ValidationResponse {
    fn from(response: proto::ValidateTokenResponse) -> Self {
        Self {
            is_valid: response.is_valid,
            claims: response.claims.map(UserClaims::from),
            error_message: response.error_message,
        }
    }
}

/// gRPC client for the Auth Service.
///
/// `Channel` is cheap to clone and multiplexes concurrent calls.
#[derive(Clone)]
pub struct GrpcTokenValidator {
    channel: Channel,
}

impl GrpcTokenValidator {
    /// Create a lazily-connecting client.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the endpoint URL is invalid.
    pub fn new(auth_service_url: &str, request_timeout: Duration) -> Result<Self, CacheError> {
        let channel = Endpoint::from_shared(auth_service_url.to_string())
            .map_err(|e| {
                error!(target: "token_cache.validator", error = %e, "Invalid auth service endpoint");
                CacheError::Config(format!("Invalid auth service endpoint: {e}"))
            })?
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .connect_lazy();

        Ok(Self { channel })
    }
}

fn status_to_error(status: &tonic::Status) -> CacheError {
    match status.code() {
        Code::DeadlineExceeded => CacheError::ValidatorTimeout,
        _ => CacheError::ValidatorUnavailable(format!(
            "ValidateToken failed: {:?}",
            status.code()
        )),
    }
}

#[async_trait]
impl TokenValidator for GrpcTokenValidator {
    #[instrument(skip_all)]
    async fn validate_token(&self, token: &str) -> Result<ValidationResponse, CacheError> {
        let start = Instant::now();
        let mut client = AuthServiceClient::new(self.channel.clone());

        let request = Request::new(proto::ValidateTokenRequest {
            token: token.to_string(),
        });

        let response = client.validate_token(request).await.map_err(|status| {
            warn!(
                target: "token_cache.validator",
                code = ?status.code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "ValidateToken RPC failed"
            );
            status_to_error(&status)
        })?;

        Ok(response.into_inner().into())
    }
}
