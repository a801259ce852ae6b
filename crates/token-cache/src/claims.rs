//! Validated claims and the cacheable projection of them.
//!
//! The `email` field is redacted in Debug output to keep identities out of
//! logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity attributes returned by the Auth Service for a valid token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: u32,
    pub email: String,
    pub issuer: String,
    pub subject: String,
    /// Expiration timestamp (Unix epoch seconds).
    pub expires_at: i64,
    /// Issued-at timestamp (Unix epoch seconds).
    pub issued_at: i64,
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("user_id", &self.user_id)
            .field("email", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Outcome of a validation, whether answered by a cache tier or the Auth Service.
///
/// An invalid token is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResponse {
    pub is_valid: bool,
    pub claims: Option<UserClaims>,
    /// Reason for rejection. Empty when `is_valid` is true.
    pub error_message: String,
}

impl ValidationResponse {
    /// A positive result carrying claims.
    pub fn valid(claims: UserClaims) -> Self {
        Self {
            is_valid: true,
            claims: Some(claims),
            error_message: String::new(),
        }
    }

    /// A negative result with a reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            claims: None,
            error_message: reason.into(),
        }
    }
}

/// Cache entry stored in both tiers. Never mutated after creation.
///
/// Tier 2 stores the JSON encoding of this struct.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedClaims {
    pub user_id: u32,
    pub email: String,
    pub issuer: String,
    pub subject: String,
    pub expires_at: i64,
    pub issued_at: i64,
    /// When this entry was created (Unix epoch seconds).
    pub cached_at: i64,
}

impl fmt::Debug for CachedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedClaims")
            .field("user_id", &self.user_id)
            .field("email", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .field("cached_at", &self.cached_at)
            .finish()
    }
}

impl CachedClaims {
    /// Build an entry from freshly validated claims.
    pub fn from_claims(claims: &UserClaims, cached_at: i64) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email.clone(),
            issuer: claims.issuer.clone(),
            subject: claims.subject.clone(),
            expires_at: claims.expires_at,
            issued_at: claims.issued_at,
            cached_at,
        }
    }

    /// An entry is usable only strictly before its token's expiry.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Rebuild the claims a caller would have received from the Auth Service.
    pub fn to_claims(&self) -> UserClaims {
        UserClaims {
            user_id: self.user_id,
            email: self.email.clone(),
            issuer: self.issuer.clone(),
            subject: self.subject.clone(),
            expires_at: self.expires_at,
            issued_at: self.issued_at,
        }
    }

    pub fn to_response(&self) -> ValidationResponse {
        ValidationResponse::valid(self.to_claims())
    }
}
