//! Detection Module
//!
//! Glue around an external object-detection model: payload decoding, tensor
//! preparation, output decoding and the shop's class vocabulary.

mod classes;
mod detector;
mod engine;
mod onnx;
mod postprocess;
mod preprocess;

#[cfg(test)]
pub(crate) mod testing;

pub use classes::{classify_tool, display_name, ToolInfo, COCO_CLASSES, TARGET_CLASSES};
pub use detector::Detector;
pub use engine::{InferenceEngine, InputTensor, OutputTensor, UnloadedEngine};
pub use onnx::OnnxEngine;
pub use postprocess::{decode_predictions, iou, non_max_suppression, RawDetection};
pub use preprocess::{decode_image, decode_payload, to_input_tensor};

use serde::{Deserialize, Serialize};

/// Axis-aligned box in original image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// One detected object as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Model class label
    pub class_name: String,
    /// Translated label shown to shop staff
    pub display_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Tool category, `unknown` when the class is not a tool
    pub category: String,
    pub tool_type: String,
    pub description: String,
}
