//! Payload decoding and input tensor preparation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage};

use crate::detection::InputTensor;
use crate::error::{AppError, Result};

/// Decodes a base64 image payload, accepting an optional data URL prefix
/// (`data:image/jpeg;base64,...`).
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let encoded = if trimmed.starts_with("data:") {
        trimmed
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AppError::Validation("Malformed data URL".to_string()))?
    } else {
        trimmed
    };

    if encoded.is_empty() {
        return Err(AppError::Validation("Image payload is empty".to_string()));
    }

    STANDARD
        .decode(encoded)
        .map_err(|e| AppError::Validation(format!("Invalid base64 image: {}", e)))
}

/// Decodes encoded image bytes (JPEG, PNG, ...).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| AppError::Validation(format!("Unsupported or corrupt image: {}", e)))
}

/// Resizes to a `size` x `size` RGB image and lays it out as a CHW tensor
/// with values in [0, 1].
pub fn to_input_tensor(image: &DynamicImage, size: u32) -> InputTensor {
    let resized = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let edge = size as usize;
    let plane = edge * edge;
    let mut data = vec![0.0f32; plane * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * edge + x as usize;
        for channel in 0..3 {
            data[channel * plane + offset] = pixel.0[channel] as f32 / 255.0;
        }
    }

    InputTensor {
        width: size,
        height: size,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::testing::png_bytes;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_decode_plain_base64() {
        let bytes = decode_payload(&STANDARD.encode(b"hello")).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_data_url() {
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(b"hello"));
        assert_eq!(decode_payload(&payload).unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_payload("not base64 !!"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(decode_payload("   "), Err(AppError::Validation(_))));
        assert!(matches!(
            decode_payload("data:image/png;base64"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_decode_image_rejects_non_image() {
        assert!(matches!(
            decode_image(b"definitely not a png"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_input_tensor_layout() {
        let image = decode_image(&png_bytes(20, 10, [255, 0, 51])).unwrap();
        let tensor = to_input_tensor(&image, 8);

        assert_eq!(tensor.width, 8);
        assert_eq!(tensor.height, 8);
        assert_eq!(tensor.data.len(), 3 * 64);
        // Solid color survives resizing: R plane, G plane, B plane
        assert!((tensor.data[0] - 1.0).abs() < 1e-3);
        assert!(tensor.data[64].abs() < 1e-3);
        assert!((tensor.data[128] - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_input_tensor_is_row_major_per_plane() {
        let mut img = RgbImage::new(3, 3);
        img.put_pixel(2, 1, Rgb([255, 0, 0]));
        let tensor = to_input_tensor(&DynamicImage::ImageRgb8(img), 3);

        let red: Vec<usize> = tensor.data[..9]
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.5)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(red, vec![5]);
        assert!(tensor.data[9..].iter().all(|v| *v == 0.0));
    }
}
