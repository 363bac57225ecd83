//! Cache Entry Module
//!
//! Defines a single cached detection result and its insertion timestamp.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A stored value together with the moment it was inserted.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp (Unix milliseconds)
    pub inserted_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry stamped with the given insertion time.
    pub fn new(value: V, inserted_at: u64) -> Self {
        Self { value, inserted_at }
    }

    // == Age ==
    /// Milliseconds elapsed since insertion, zero if `now` is earlier.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at)
    }

    // == Is Expired ==
    /// Checks whether the entry is too old to be served.
    ///
    /// Boundary condition: an entry is served only while its age is strictly
    /// below the TTL, so an entry whose age equals the TTL is expired.
    pub fn is_expired_at(&self, now: u64, ttl_ms: u64) -> bool {
        self.age_ms(now) >= ttl_ms
    }

    /// Remaining lifetime in milliseconds at `now`.
    pub fn ttl_remaining_ms(&self, now: u64, ttl_ms: u64) -> u64 {
        ttl_ms.saturating_sub(self.age_ms(now))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_fresh_is_not_expired() {
        let entry = CacheEntry::new("result", 1_000);
        assert!(!entry.is_expired_at(1_000, 2_000));
        assert!(!entry.is_expired_at(2_999, 2_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new("result", 1_000);
        // Age equal to the TTL is no longer served
        assert!(entry.is_expired_at(3_000, 2_000));
        assert!(entry.is_expired_at(10_000, 2_000));
    }

    #[test]
    fn test_clock_behind_insertion() {
        let entry = CacheEntry::new("result", 5_000);
        assert_eq!(entry.age_ms(4_000), 0);
        assert!(!entry.is_expired_at(4_000, 2_000));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("result", 1_000);
        assert_eq!(entry.ttl_remaining_ms(1_500, 2_000), 1_500);
        assert_eq!(entry.ttl_remaining_ms(9_000, 2_000), 0);
    }

    #[test]
    fn test_current_timestamp_advances() {
        let a = current_timestamp_ms();
        let b = current_timestamp_ms();
        assert!(a > 0);
        assert!(b >= a);
    }
}
