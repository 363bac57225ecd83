//! Response DTOs for the shop API
//!
//! Defines the structure of outgoing HTTP response bodies that are not
//! ledger rows. Ledger rows and reports serialize themselves.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::detection::Detection;

/// Response body for `POST /detect-realtime` and `POST /detect`
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub detections: Vec<Detection>,
    pub total_objects: usize,
    /// Seconds spent on this request, cache hits included
    pub processing_time: f64,
    pub cached: bool,
}

impl DetectionResponse {
    pub fn new(detections: Vec<Detection>, processing_time: f64, cached: bool) -> Self {
        Self {
            success: true,
            total_objects: detections.len(),
            detections,
            processing_time,
            cached,
        }
    }
}

/// Response body for `GET /performance`
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceResponse {
    pub cache_size: usize,
    pub cache_capacity: usize,
    /// Cache TTL in seconds
    pub cache_timeout: f64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub model_loaded: bool,
    pub supported_classes: usize,
}

impl PerformanceResponse {
    pub fn new(
        stats: &CacheStats,
        capacity: usize,
        ttl_ms: u64,
        model_loaded: bool,
        supported_classes: usize,
    ) -> Self {
        Self {
            cache_size: stats.total_entries,
            cache_capacity: capacity,
            cache_timeout: ttl_ms as f64 / 1000.0,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            hit_rate: stats.hit_rate(),
            model_loaded,
            supported_classes,
        }
    }
}

/// Response body for `GET /classes`
#[derive(Debug, Clone, Serialize)]
pub struct ClassesResponse {
    pub supported_classes: Vec<&'static str>,
    pub target_classes: Vec<&'static str>,
    pub total_supported_classes: usize,
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// RFC 3339
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Plain `{success, message}` acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_response_counts_objects() {
        let resp = DetectionResponse::new(vec![], 0.01, true);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["total_objects"], 0);
        assert_eq!(json["cached"], true);
    }

    #[test]
    fn test_performance_response_reports_seconds() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.set_total_entries(3);

        let resp = PerformanceResponse::new(&stats, 10, 2_000, false, 0);
        assert_eq!(resp.cache_size, 3);
        assert_eq!(resp.cache_timeout, 2.0);
        assert!((resp.hit_rate - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
        assert!(json.contains("shop_vision"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"error":"Something went wrong"}"#);
    }
}
