//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL_MS};

/// Accepted `MODEL_INPUT_SIZE` values; anything else falls back to the default.
pub const MODEL_INPUT_SIZES: RangeInclusive<u32> = 32..=4096;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of detection results kept in the cache
    pub cache_capacity: usize,
    /// Detection cache time-to-live in milliseconds
    pub cache_ttl_ms: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Confidence threshold used when a request does not send one
    pub default_threshold: f32,
    /// IoU threshold for non-max suppression
    pub nms_threshold: f32,
    /// Square input size expected by the detection model
    pub model_input_size: u32,
    /// ONNX detection model; detection requests fail when unset
    pub model_path: Option<String>,
    /// Path of the sled database holding the ledger; in-memory when unset
    pub ledger_db_path: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DETECTION_CACHE_CAPACITY` - Maximum cached detections (default: 10)
    /// - `DETECTION_CACHE_TTL_MS` - Cache TTL in milliseconds (default: 2000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `DEFAULT_THRESHOLD` - Default confidence threshold (default: 0.3)
    /// - `NMS_THRESHOLD` - Non-max suppression IoU threshold (default: 0.45)
    /// - `MODEL_INPUT_SIZE` - Model input edge in pixels, 32 to 4096 (default: 640)
    /// - `MODEL_PATH` - ONNX detection model file (default: unset, no model)
    /// - `LEDGER_DB_PATH` - sled database path (default: unset, in-memory)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_capacity: env_or("DETECTION_CACHE_CAPACITY", defaults.cache_capacity),
            cache_ttl_ms: env_or("DETECTION_CACHE_TTL_MS", defaults.cache_ttl_ms),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            default_threshold: env_or("DEFAULT_THRESHOLD", defaults.default_threshold),
            nms_threshold: env_or("NMS_THRESHOLD", defaults.nms_threshold),
            model_input_size: Some(env_or("MODEL_INPUT_SIZE", defaults.model_input_size))
                .filter(|size| MODEL_INPUT_SIZES.contains(size))
                .unwrap_or(defaults.model_input_size),
            model_path: env_path("MODEL_PATH"),
            ledger_db_path: env_path("LEDGER_DB_PATH"),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_capacity: DEFAULT_CAPACITY,
            cache_ttl_ms: DEFAULT_TTL_MS,
            cleanup_interval: 1,
            default_threshold: 0.3,
            nms_threshold: 0.45,
            model_input_size: 640,
            model_path: None,
            ledger_db_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.cache_ttl_ms, 2000);
        assert_eq!(config.cleanup_interval, 1);
        assert_eq!(config.model_input_size, 640);
        assert!(config.model_path.is_none());
        assert!(config.ledger_db_path.is_none());
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("SERVER_PORT");
        env::remove_var("DETECTION_CACHE_CAPACITY");
        env::remove_var("DETECTION_CACHE_TTL_MS");
        env::remove_var("CLEANUP_INTERVAL");
        env::remove_var("LEDGER_DB_PATH");

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.cache_ttl_ms, 2000);
        assert_eq!(config.cleanup_interval, 1);
        assert!((config.default_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("SHOP_VISION_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("SHOP_VISION_TEST_GARBAGE", 7u16), 7);
        env::remove_var("SHOP_VISION_TEST_GARBAGE");
    }

    #[test]
    fn test_model_input_size_is_bounded() {
        env::set_var("MODEL_INPUT_SIZE", "65536");
        assert_eq!(Config::from_env().model_input_size, 640);

        env::set_var("MODEL_INPUT_SIZE", "0");
        assert_eq!(Config::from_env().model_input_size, 640);

        env::set_var("MODEL_INPUT_SIZE", "320");
        assert_eq!(Config::from_env().model_input_size, 320);
        env::remove_var("MODEL_INPUT_SIZE");
    }

    #[test]
    fn test_blank_model_path_is_unset() {
        env::set_var("MODEL_PATH", "   ");
        assert!(Config::from_env().model_path.is_none());

        env::set_var("MODEL_PATH", "models/yolov8n.onnx");
        assert_eq!(
            Config::from_env().model_path.as_deref(),
            Some("models/yolov8n.onnx")
        );
        env::remove_var("MODEL_PATH");
    }
}
