//! Cache lifetime policy.
//!
//! An entry lives for 80% of its token's remaining lifetime, capped at the
//! tier's max TTL and floored so entries close to expiry don't churn. The
//! read path still checks `expires_at`, so a floored TTL never lets an
//! expired token through.

use std::time::Duration;

/// Fraction of the remaining token lifetime an entry may live.
pub const TTL_SAFETY_FACTOR: f64 = 0.8;

/// Lower bound on any computed TTL.
pub const MIN_TTL: Duration = Duration::from_secs(30);

/// TTL used when the token is already expired. Stores reject zero or
/// negative lifetimes, so something positive must be returned.
pub const EXPIRED_TOKEN_TTL: Duration = Duration::from_secs(60);

/// Compute a TTL for an entry whose token expires at `expires_at` (Unix seconds).
pub fn compute_ttl(expires_at: i64, tier_max_ttl: Duration) -> Duration {
    compute_ttl_at(expires_at, chrono::Utc::now().timestamp(), tier_max_ttl)
}

/// Same as [`compute_ttl`] with an explicit clock.
pub fn compute_ttl_at(expires_at: i64, now: i64, tier_max_ttl: Duration) -> Duration {
    let remaining = expires_at.saturating_sub(now);
    if remaining <= 0 {
        return EXPIRED_TOKEN_TTL;
    }

    let scaled = Duration::from_secs(remaining.unsigned_abs()).mul_f64(TTL_SAFETY_FACTOR);
    scaled.min(tier_max_ttl).max(MIN_TTL)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_one_hour_token_is_capped_per_tier() {
        let expires_at = NOW + 3600;

        assert_eq!(
            compute_ttl_at(expires_at, NOW, Duration::from_secs(300)),
            Duration::from_secs(300)
        );
        assert_eq!(
            compute_ttl_at(expires_at, NOW, Duration::from_secs(900)),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_uses_eighty_percent_below_cap() {
        let ttl = compute_ttl_at(NOW + 600, NOW, Duration::from_secs(900));
        assert_eq!(ttl, Duration::from_secs(480));
    }

    #[test]
    fn test_floor_applies_near_expiry() {
        let ttl = compute_ttl_at(NOW + 10, NOW, Duration::from_secs(300));
        assert_eq!(ttl, MIN_TTL);
    }

    #[test]
    fn test_floor_wins_over_tiny_cap() {
        let ttl = compute_ttl_at(NOW + 3600, NOW, Duration::from_secs(5));
        assert_eq!(ttl, MIN_TTL);
    }

    #[test]
    fn test_expired_token_gets_fixed_ttl() {
        assert_eq!(
            compute_ttl_at(NOW, NOW, Duration::from_secs(300)),
            EXPIRED_TOKEN_TTL
        );
        assert_eq!(
            compute_ttl_at(NOW - 3600, NOW, Duration::from_secs(300)),
            EXPIRED_TOKEN_TTL
        );
        assert_eq!(
            compute_ttl_at(i64::MIN, NOW, Duration::from_secs(300)),
            EXPIRED_TOKEN_TTL
        );
    }

    #[test]
    fn test_monotonic_below_cap_and_bounded() {
        let cap = Duration::from_secs(900);
        let mut previous = Duration::ZERO;

        for remaining in (1..=3600).step_by(7) {
            let ttl = compute_ttl_at(NOW + remaining, NOW, cap);

            assert!(ttl >= previous, "ttl decreased at remaining={remaining}");
            assert!(ttl >= MIN_TTL);
            assert!(ttl <= cap);
            previous = ttl;
        }
    }

    #[test]
    fn test_wall_clock_variant_matches() {
        let ttl = compute_ttl(chrono::Utc::now().timestamp() + 3600, Duration::from_secs(300));
        assert_eq!(ttl, Duration::from_secs(300));
    }
}
