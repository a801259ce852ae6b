//! Cache key derivation.
//!
//! The raw token never becomes a cache key. Keys are the SHA-256 digest of
//! the token, hex encoded, under a fixed namespace so bulk operations on a
//! shared Redis only touch this cache's entries.

use sha2::{Digest, Sha256};

/// Namespace for every token cache entry.
pub const CACHE_KEY_PREFIX: &str = "auth:token:";

/// Redis match pattern covering the whole namespace.
pub const CACHE_KEY_PATTERN: &str = "auth:token:*";

/// Length of a derived key: prefix plus 64 hex characters.
pub const CACHE_KEY_LEN: usize = CACHE_KEY_PREFIX.len() + 64;

/// Derive the cache key for a token.
pub fn derive_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", CACHE_KEY_PREFIX, hex::encode(digest))
}

/// Short, log-safe form of a key for correlation.
pub fn log_fragment(key: &str) -> &str {
    let hash = key.strip_prefix(CACHE_KEY_PREFIX).unwrap_or(key);
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_prefixed_and_fixed_length() {
        let short = derive_key("a");
        let long = derive_key(&"x".repeat(8192));

        assert!(short.starts_with(CACHE_KEY_PREFIX));
        assert_eq!(short.len(), CACHE_KEY_LEN);
        assert_eq!(long.len(), CACHE_KEY_LEN);
    }

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(derive_key("eyJhbGciOi.payload.sig"), derive_key("eyJhbGciOi.payload.sig"));
        assert_ne!(derive_key("token-a"), derive_key("token-b"));
    }

    #[test]
    fn test_key_does_not_contain_token() {
        let token = "eyJhbGciOiJIUzI1NiJ9.secret-payload.signature";
        let key = derive_key(token);

        assert!(!key.contains("secret-payload"));
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            derive_key("abc"),
            "auth:token:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_log_fragment() {
        let key = derive_key("abc");
        assert_eq!(log_fragment(&key), "ba7816bf8f01");
        assert_eq!(log_fragment("short"), "short");
    }
}
