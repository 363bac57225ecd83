//! Fingerprint Module
//!
//! Derives cache keys for detection requests.

use std::fmt;

use sha2::{Digest, Sha256};

// == Fingerprint ==
/// Identifies a previously processed detection request.
///
/// Covers the whole image payload and the confidence threshold, so two images
/// sharing a common prefix never collide and a stricter threshold never serves
/// a looser result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of an image payload evaluated at `threshold`.
    pub fn of(image: &[u8], threshold: f32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(image);
        hasher.update(threshold.to_bits().to_be_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wraps an already derived key.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_fingerprint() {
        let a = Fingerprint::of(b"image-bytes", 0.3);
        let b = Fingerprint::of(b"image-bytes", 0.3);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_shared_prefix_does_not_collide() {
        let prefix = "A".repeat(100);
        let a = Fingerprint::of(format!("{}first", prefix).as_bytes(), 0.3);
        let b = Fingerprint::of(format!("{}second", prefix).as_bytes(), 0.3);
        assert_ne!(a, b);
    }

    #[test]
    fn test_threshold_is_part_of_fingerprint() {
        let a = Fingerprint::of(b"image-bytes", 0.3);
        let b = Fingerprint::of(b"image-bytes", 0.5);
        assert_ne!(a, b);
    }
}
