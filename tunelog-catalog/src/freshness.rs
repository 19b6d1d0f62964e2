//! Cache freshness policy
//!
//! A cached row is usable without a refetch while its age is strictly below
//! the table's TTL. A row exactly TTL old is stale. Rows are never deleted;
//! the TTL governs reuse, not removal.

use std::time::Duration;

/// TTL for cached artist release lists
pub const RELEASE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// TTL for cached artist images
pub const IMAGE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// TTL for cached official-release verdicts
pub const STATUS_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Current time as Unix epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether a cache entry fetched at `fetched_at_ms` is still usable at
/// `now_ms` given `ttl`.
///
/// Pure function, strict comparison: `now - fetched_at < ttl`.
pub fn is_fresh(fetched_at_ms: i64, ttl: Duration, now_ms: i64) -> bool {
    (now_ms - fetched_at_ms) < ttl.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_recent_entry_is_fresh() {
        let now = 1_730_000_000_000;
        assert!(is_fresh(now - 1, TTL, now));
        assert!(is_fresh(now - 59_999, TTL, now));
    }

    #[test]
    fn test_entry_at_exact_ttl_is_stale() {
        let now = 1_730_000_000_000;
        assert!(!is_fresh(now - 60_000, TTL, now));
    }

    #[test]
    fn test_entry_past_ttl_is_stale() {
        let now = 1_730_000_000_000;
        assert!(!is_fresh(now - 60_001, TTL, now));
        assert!(!is_fresh(now - 1_000_000, TTL, now));
    }

    #[test]
    fn test_zero_age_is_fresh() {
        let now = 1_730_000_000_000;
        assert!(is_fresh(now, TTL, now));
    }

    #[test]
    fn test_ttl_constants() {
        assert_eq!(RELEASE_TTL, Duration::from_secs(43_200));
        assert_eq!(IMAGE_TTL, Duration::from_secs(604_800));
        assert_eq!(STATUS_TTL, RELEASE_TTL);
    }
}
