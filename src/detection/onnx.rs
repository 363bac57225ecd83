//! ONNX model runtime backed by tract.

use std::fmt::Display;
use std::path::Path;

use tract_onnx::prelude::*;
use tracing::info;

use crate::detection::{InferenceEngine, InputTensor, OutputTensor, COCO_CLASSES};
use crate::error::{AppError, Result};

type Plan = TypedRunnableModel<TypedModel>;

/// Runs a YOLOv8-style export with a fixed `1 x 3 x size x size` input and a
/// `1 x (4 + classes) x anchors` output.
pub struct OnnxEngine {
    plan: Plan,
    input_size: usize,
    class_count: usize,
}

impl OnnxEngine {
    /// Loads and optimizes the model at `path` for square inputs of `input_size`.
    pub fn load(path: impl AsRef<Path>, input_size: u32) -> Result<Self> {
        let path = path.as_ref();
        let size = input_size as usize;

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|model| model.into_optimized())
            .map_err(|e| load_error(path, e))?;

        // Symbolic output shapes fall back to the COCO vocabulary
        let class_count = model
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().and_then(|dims| dims.get(1).copied()))
            .and_then(|rows| rows.checked_sub(4))
            .unwrap_or(COCO_CLASSES.len());

        let plan = model.into_runnable().map_err(|e| load_error(path, e))?;
        info!(
            "Loaded detection model {} ({} classes, {}px input)",
            path.display(),
            class_count,
            size
        );

        Ok(Self {
            plan,
            input_size: size,
            class_count,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn is_loaded(&self) -> bool {
        true
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn infer(&self, input: &InputTensor) -> Result<OutputTensor> {
        let (width, height) = (input.width as usize, input.height as usize);
        if width != self.input_size || height != self.input_size {
            return Err(AppError::Internal(format!(
                "Input is {}x{}, model expects {}x{}",
                width, height, self.input_size, self.input_size
            )));
        }

        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_vec((1, 3, height, width), input.data.clone())
                .map_err(|e| AppError::Internal(format!("Invalid input tensor: {}", e)))?
                .into();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| AppError::Internal(format!("Inference failed: {}", e)))?;

        let view = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| AppError::Internal(format!("Unexpected model output: {}", e)))?;
        output_tensor(view)
    }
}

/// Flattens a `[1, rows, anchors]` model output.
fn output_tensor(view: tract_ndarray::ArrayViewD<'_, f32>) -> Result<OutputTensor> {
    match *view.shape() {
        [1, rows, anchors] => OutputTensor::new(rows, anchors, view.iter().copied().collect()),
        ref shape => Err(AppError::Internal(format!(
            "Unexpected model output shape {:?}",
            shape
        ))),
    }
}

fn load_error(path: &Path, err: impl Display) -> AppError {
    AppError::Internal(format!(
        "Failed to load detection model {}: {}",
        path.display(),
        err
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxEngine::load(dir.path().join("yolov8n.onnx"), 640);
        assert!(matches!(result, Err(AppError::Internal(msg)) if msg.contains("yolov8n.onnx")));
    }

    #[test]
    fn test_corrupt_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not an onnx protobuf").unwrap();
        assert!(matches!(
            OnnxEngine::load(&path, 64),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_output_tensor_from_model_shape() {
        let mut output = tract_ndarray::Array3::<f32>::zeros((1, 6, 2));
        output[[0, 5, 1]] = 0.75;

        let tensor = output_tensor(output.view().into_dyn()).unwrap();
        assert_eq!(tensor.rows, 6);
        assert_eq!(tensor.anchors, 2);
        assert_eq!(tensor.class_count(), 2);
        assert_eq!(tensor.at(5, 1), 0.75);
    }

    #[test]
    fn test_output_tensor_rejects_batched_output() {
        let output = tract_ndarray::Array3::<f32>::zeros((2, 6, 2));
        assert!(matches!(
            output_tensor(output.view().into_dyn()),
            Err(AppError::Internal(_))
        ));
    }
}
