//! Inference engine seam.
//!
//! The forward pass belongs to a model runtime behind `InferenceEngine`
//! (`OnnxEngine` in production); the rest of the pipeline only prepares its
//! input and decodes its output.

use crate::error::{AppError, Result};

/// Normalized image tensor in NCHW layout with N = 1 and C = 3.
#[derive(Debug, Clone)]
pub struct InputTensor {
    pub width: u32,
    pub height: u32,
    /// RGB planes scaled to [0, 1], `3 * width * height` values
    pub data: Vec<f32>,
}

/// Raw model output of shape `(rows, anchors)`, row-major.
///
/// Rows 0..4 hold cx, cy, w, h in model-input pixels, the remaining rows hold
/// one score per class.
#[derive(Debug, Clone)]
pub struct OutputTensor {
    pub rows: usize,
    pub anchors: usize,
    pub data: Vec<f32>,
}

impl OutputTensor {
    pub fn new(rows: usize, anchors: usize, data: Vec<f32>) -> Result<Self> {
        if rows < 5 {
            return Err(AppError::Internal(format!(
                "Model output needs at least 5 rows, got {}",
                rows
            )));
        }
        if data.len() != rows * anchors {
            return Err(AppError::Internal(format!(
                "Model output has {} values, expected {}x{}",
                data.len(),
                rows,
                anchors
            )));
        }
        Ok(Self {
            rows,
            anchors,
            data,
        })
    }

    pub fn class_count(&self) -> usize {
        self.rows - 4
    }

    #[inline]
    pub fn at(&self, row: usize, anchor: usize) -> f32 {
        self.data[row * self.anchors + anchor]
    }
}

/// Port for the model runtime that performs the forward pass.
pub trait InferenceEngine: Send + Sync + 'static {
    /// Whether a model is loaded and `infer` can succeed.
    fn is_loaded(&self) -> bool;

    /// Number of classes the loaded model scores.
    fn class_count(&self) -> usize;

    /// Runs the model over one prepared image.
    fn infer(&self, input: &InputTensor) -> Result<OutputTensor>;
}

/// Engine used when no model is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnloadedEngine;

impl InferenceEngine for UnloadedEngine {
    fn is_loaded(&self) -> bool {
        false
    }

    fn class_count(&self) -> usize {
        0
    }

    fn infer(&self, _input: &InputTensor) -> Result<OutputTensor> {
        Err(AppError::Internal(
            "No detection model is loaded".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tensor_shape_checks() {
        assert!(OutputTensor::new(4, 1, vec![0.0; 4]).is_err());
        assert!(OutputTensor::new(6, 2, vec![0.0; 11]).is_err());

        let tensor = OutputTensor::new(6, 2, (0..12).map(|v| v as f32).collect()).unwrap();
        assert_eq!(tensor.class_count(), 2);
        assert_eq!(tensor.at(0, 1), 1.0);
        assert_eq!(tensor.at(5, 0), 10.0);
    }

    #[test]
    fn test_unloaded_engine() {
        let engine = UnloadedEngine;
        let input = InputTensor {
            width: 1,
            height: 1,
            data: vec![0.0; 3],
        };
        assert!(!engine.is_loaded());
        assert_eq!(engine.class_count(), 0);
        assert!(matches!(engine.infer(&input), Err(AppError::Internal(_))));
    }
}
