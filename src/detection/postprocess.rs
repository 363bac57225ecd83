//! Model output decoding: class argmax, confidence filter, box rescaling and
//! non-max suppression.

use std::cmp::Ordering;

use crate::detection::{BoundingBox, OutputTensor};

/// A decoded candidate before vocabulary filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Decodes every anchor whose best class score reaches `threshold`.
///
/// Boxes are rescaled from the `input_size` square to the original image
/// dimensions and converted from center/size to corner form.
pub fn decode_predictions(
    output: &OutputTensor,
    input_size: u32,
    original_width: u32,
    original_height: u32,
    threshold: f32,
) -> Vec<RawDetection> {
    let scale_x = original_width as f32 / input_size as f32;
    let scale_y = original_height as f32 / input_size as f32;

    let mut detections = Vec::new();
    for anchor in 0..output.anchors {
        let best = (0..output.class_count())
            .map(|class_id| (class_id, output.at(4 + class_id, anchor)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let Some((class_id, confidence)) = best else {
            continue;
        };
        if !(confidence >= threshold) {
            continue;
        }

        let cx = output.at(0, anchor) * scale_x;
        let cy = output.at(1, anchor) * scale_y;
        let w = output.at(2, anchor) * scale_x;
        let h = output.at(3, anchor) * scale_y;

        detections.push(RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
            },
        });
    }
    detections
}

/// Intersection over union of two boxes, 0.0 when both are degenerate.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Greedy, class-agnostic non-max suppression.
///
/// Candidates are visited by descending confidence; a candidate is kept when
/// its IoU with every kept box is at most `iou_threshold`.
pub fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
