//! Object detector combining decoding, the inference engine and the shop's
//! class vocabulary.

use std::sync::Arc;

use image::GenericImageView;
use tracing::debug;

use super::classes::{class_label, classify_tool, display_name, is_target};
use crate::detection::{
    decode_image, decode_payload, decode_predictions, non_max_suppression, to_input_tensor,
    Detection, InferenceEngine, UnloadedEngine,
};
use crate::error::Result;

/// Runs one image through the full detection pipeline.
#[derive(Clone)]
pub struct Detector {
    engine: Arc<dyn InferenceEngine>,
    input_size: u32,
    nms_threshold: f32,
}

impl Detector {
    pub fn new(engine: Arc<dyn InferenceEngine>, input_size: u32, nms_threshold: f32) -> Self {
        Self {
            engine,
            input_size: input_size.max(1),
            nms_threshold,
        }
    }

    /// Detector without a model; every detection call fails.
    pub fn unloaded(input_size: u32, nms_threshold: f32) -> Self {
        Self::new(Arc::new(UnloadedEngine), input_size, nms_threshold)
    }

    pub fn model_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    pub fn supported_classes(&self) -> usize {
        self.engine.class_count()
    }

    /// Detects target objects in a base64 image payload.
    ///
    /// Blocking: decoding and inference are CPU bound, callers on the async
    /// runtime should go through `spawn_blocking`.
    pub fn detect(&self, payload: &str, threshold: f32) -> Result<Vec<Detection>> {
        let bytes = decode_payload(payload)?;
        let image = decode_image(&bytes)?;
        let (width, height) = image.dimensions();

        let input = to_input_tensor(&image, self.input_size);
        let output = self.engine.infer(&input)?;

        let candidates = decode_predictions(&output, self.input_size, width, height, threshold);
        let candidate_count = candidates.len();
        let kept = non_max_suppression(candidates, self.nms_threshold);

        let detections: Vec<Detection> = kept
            .into_iter()
            .filter_map(|raw| {
                let class_name = class_label(raw.class_id);
                if !is_target(&class_name) {
                    return None;
                }
                let tool = classify_tool(&class_name);
                Some(Detection {
                    display_name: display_name(&class_name),
                    class_name,
                    confidence: raw.confidence,
                    bbox: raw.bbox,
                    category: tool.category,
                    tool_type: tool.tool_type,
                    description: tool.description,
                })
            })
            .collect();

        debug!(
            "Detection on {}x{} image: {} candidates, {} reported",
            width,
            height,
            candidate_count,
            detections.len()
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::testing::{encoded_png, FixedEngine};
    use crate::error::AppError;

    const SCISSORS: usize = 76;
    const KNIFE: usize = 43;
    const PERSON: usize = 0;

    #[test]
    fn test_detect_reports_target_classes() {
        let engine = Arc::new(FixedEngine::new(vec![
            (100.0, 100.0, 40.0, 40.0, SCISSORS, 0.9),
            (400.0, 400.0, 40.0, 40.0, PERSON, 0.95),
            (500.0, 100.0, 40.0, 40.0, KNIFE, 0.2),
        ]));
        let detector = Detector::new(engine, 64, 0.45);

        let detections = detector.detect(&encoded_png(), 0.3).unwrap();

        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.class_name, "scissors");
        assert_eq!(d.display_name, "Tesoura");
        assert_eq!(d.category, "cutting_tools");
        // 64x32 original over a 64x64 model input: y is halved
        assert_eq!(d.bbox.x1, 80.0);
        assert_eq!(d.bbox.y1, 40.0);
        assert_eq!(d.bbox.x2, 120.0);
        assert_eq!(d.bbox.y2, 60.0);
    }

    #[test]
    fn test_detect_applies_nms() {
        let engine = Arc::new(FixedEngine::new(vec![
            (100.0, 100.0, 40.0, 40.0, SCISSORS, 0.9),
            (102.0, 101.0, 40.0, 40.0, SCISSORS, 0.8),
        ]));
        let detector = Detector::new(engine, 640, 0.45);

        let detections = detector.detect(&encoded_png(), 0.3).unwrap();
        assert_eq!(detections.len(), 1);
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_detect_rejects_bad_payload() {
        let detector = Detector::new(Arc::new(FixedEngine::new(vec![])), 640, 0.45);
        assert!(matches!(
            detector.detect("%%%", 0.3),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_unloaded_detector_fails() {
        let detector = Detector::unloaded(640, 0.45);
        assert!(!detector.model_loaded());
        assert_eq!(detector.supported_classes(), 0);
        assert!(matches!(
            detector.detect(&encoded_png(), 0.3),
            Err(AppError::Internal(_))
        ));
    }
}
