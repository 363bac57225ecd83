//! API Handlers
//!
//! Application state, request extraction helpers and the detection endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{DetectionCache, Fingerprint};
use crate::config::Config;
use crate::detection::{Detection, Detector, COCO_CLASSES, TARGET_CLASSES};
use crate::error::{AppError, Result};
use crate::ledger::{Id, Ledger};
use crate::models::{
    ClassesResponse, DetectRequest, DetectionResponse, HealthResponse, MessageResponse,
    PerformanceResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Recent detection results keyed by image fingerprint
    pub cache: Arc<RwLock<DetectionCache<Vec<Detection>>>>,
    pub ledger: Arc<RwLock<Ledger>>,
    pub detector: Arc<Detector>,
    /// Threshold used when a request does not carry one
    pub default_threshold: f32,
}

impl AppState {
    pub fn new(
        cache: DetectionCache<Vec<Detection>>,
        ledger: Ledger,
        detector: Detector,
        default_threshold: f32,
    ) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            ledger: Arc::new(RwLock::new(ledger)),
            detector: Arc::new(detector),
            default_threshold,
        }
    }

    /// Builds the state from configuration with the given ledger and detector.
    pub fn from_config(config: &Config, ledger: Ledger, detector: Detector) -> Self {
        let cache = DetectionCache::new(config.cache_capacity, config.cache_ttl_ms);
        Self::new(cache, ledger, detector, config.default_threshold)
    }
}

// == Extraction ==
// Rejections are turned into AppError so every 4xx carries the same body.

pub(crate) fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub(crate) fn query<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub(crate) fn path_id(path: std::result::Result<Path<Id>, PathRejection>) -> Result<Id> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::Validation("Invalid id".to_string()))
}

async fn run_detection(state: &AppState, image: String, threshold: f32) -> Result<Vec<Detection>> {
    let detector = Arc::clone(&state.detector);
    tokio::task::spawn_blocking(move || detector.detect(&image, threshold))
        .await
        .map_err(|e| AppError::Internal(format!("Detection task failed: {}", e)))?
}

fn validated(body: std::result::Result<Json<DetectRequest>, JsonRejection>) -> Result<DetectRequest> {
    let req = json_body(body)?;
    if let Some(error_msg) = req.validate() {
        return Err(AppError::Validation(error_msg));
    }
    Ok(req)
}

/// Handler for POST /detect-realtime
///
/// Serves a cached result for a recently seen image and threshold, otherwise
/// runs the detector and caches the outcome. Failed detections are not cached.
pub async fn detect_realtime_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectionResponse>> {
    let started = Instant::now();
    let req = validated(body)?;
    let threshold = req.threshold.unwrap_or(state.default_threshold);
    let image = req.image.unwrap_or_default();
    let fingerprint = Fingerprint::of(image.as_bytes(), threshold);

    let cached = state.cache.write().await.lookup(&fingerprint);
    if let Some(detections) = cached {
        debug!("Detection cache hit for {}", fingerprint);
        return Ok(Json(DetectionResponse::new(
            detections,
            started.elapsed().as_secs_f64(),
            true,
        )));
    }

    let detections = run_detection(&state, image, threshold).await?;
    state
        .cache
        .write()
        .await
        .insert(fingerprint, detections.clone());

    Ok(Json(DetectionResponse::new(
        detections,
        started.elapsed().as_secs_f64(),
        false,
    )))
}

/// Handler for POST /detect
///
/// Same pipeline without the cache.
pub async fn detect_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectionResponse>> {
    let started = Instant::now();
    let req = validated(body)?;
    let threshold = req.threshold.unwrap_or(state.default_threshold);
    let detections = run_detection(&state, req.image.unwrap_or_default(), threshold).await?;

    Ok(Json(DetectionResponse::new(
        detections,
        started.elapsed().as_secs_f64(),
        false,
    )))
}

/// Handler for GET /performance
pub async fn performance_handler(State(state): State<AppState>) -> Json<PerformanceResponse> {
    let cache = state.cache.read().await;

    Json(PerformanceResponse::new(
        &cache.stats(),
        cache.capacity(),
        cache.ttl_ms(),
        state.detector.model_loaded(),
        state.detector.supported_classes(),
    ))
}

/// Handler for POST /clear-cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.cache.write().await.clear();
    Json(MessageResponse::ok("Detection cache cleared"))
}

/// Handler for GET /classes
pub async fn classes_handler() -> Json<ClassesResponse> {
    Json(ClassesResponse {
        supported_classes: COCO_CLASSES.to_vec(),
        target_classes: TARGET_CLASSES.to_vec(),
        total_supported_classes: COCO_CLASSES.len(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
