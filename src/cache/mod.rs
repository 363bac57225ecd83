//! Cache Module
//!
//! Short-lived, size-bounded cache of detection results with oldest-insertion
//! eviction.

mod entry;
mod fingerprint;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use fingerprint::Fingerprint;
pub use stats::CacheStats;
pub use store::DetectionCache;

// == Public Constants ==
/// Default number of resident entries
pub const DEFAULT_CAPACITY: usize = 10;

/// Default time-to-live in milliseconds
pub const DEFAULT_TTL_MS: u64 = 2_000;
