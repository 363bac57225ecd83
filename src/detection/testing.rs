//! Test doubles for the detection pipeline.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::detection::{InferenceEngine, InputTensor, OutputTensor, COCO_CLASSES};
use crate::error::Result;

/// Engine returning a fixed set of anchors `(cx, cy, w, h, class_id, score)`.
pub struct FixedEngine {
    pub anchors: Vec<(f32, f32, f32, f32, usize, f32)>,
    pub calls: AtomicUsize,
}

impl FixedEngine {
    pub fn new(anchors: Vec<(f32, f32, f32, f32, usize, f32)>) -> Self {
        Self {
            anchors,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceEngine for FixedEngine {
    fn is_loaded(&self) -> bool {
        true
    }

    fn class_count(&self) -> usize {
        COCO_CLASSES.len()
    }

    fn infer(&self, input: &InputTensor) -> Result<OutputTensor> {
        assert_eq!(input.data.len(), 3 * input.width as usize * input.height as usize);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rows = 4 + COCO_CLASSES.len();
        let n = self.anchors.len();
        let mut data = vec![0.0; rows * n];
        for (a, (cx, cy, w, h, class_id, score)) in self.anchors.iter().enumerate() {
            data[a] = *cx;
            data[n + a] = *cy;
            data[2 * n + a] = *w;
            data[3 * n + a] = *h;
            data[(4 + class_id) * n + a] = *score;
        }
        OutputTensor::new(rows, n, data)
    }
}

/// PNG bytes of a solid image.
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// A 64x32 black PNG wrapped in a data URL.
pub fn encoded_png() -> String {
    format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png_bytes(64, 32, [0, 0, 0]))
    )
}
