//! Image intake, transport encoding and model preprocessing.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, RgbImage};
use ndarray::Array4;

use crate::config::TensorLayout;
use crate::error::{ClassifierError, ClassifierResult};

/// Decode uploaded bytes into an RGB image.
pub fn decode(bytes: &[u8]) -> ClassifierResult<RgbImage> {
    if bytes.is_empty() {
        return Err(ClassifierError::invalid_image("empty upload"));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| ClassifierError::invalid_image(e.to_string()))?;

    Ok(image.to_rgb8())
}

/// Encode an RGB image as JPEG for transport.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ClassifierResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(|e| ClassifierError::invalid_image(format!("JPEG encoding failed: {}", e)))?;
    Ok(buf)
}

/// Flat model input with its tensor shape.
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Preprocess an image for the local model.
///
/// - Resize to `size` x `size`
/// - Normalize pixel values to [0, 1]
/// - Lay out as NHWC or NCHW with a batch of one
pub fn preprocess(image: &RgbImage, size: u32, layout: TensorLayout) -> ModelInput {
    let resized = DynamicImage::ImageRgb8(image.clone())
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let s = size as usize;
    let mut array = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
    };

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => array[[0, y, x, c]] = value,
                TensorLayout::Nchw => array[[0, c, y, x]] = value,
            }
        }
    }

    ModelInput {
        shape: array.shape().to_vec(),
        data: array.into_raw_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(&[]), Err(ClassifierError::InvalidImage(_))));
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(ClassifierError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_decode_png() {
        let img = decode(&png_bytes(8, 4, [10, 20, 30])).unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_encode_jpeg_roundtrips_through_decoder() {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 100, 50]));
        let jpeg = encode_jpeg(&img, 75).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(decode(&jpeg).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn test_preprocess_nhwc() {
        let img = RgbImage::from_pixel(50, 30, Rgb([255, 0, 51]));
        let input = preprocess(&img, 224, TensorLayout::Nhwc);
        assert_eq!(input.shape, vec![1, 224, 224, 3]);
        assert_eq!(input.data.len(), 224 * 224 * 3);
        assert!(input.data.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((input.data[0] - 1.0).abs() < 0.005);
        assert!(input.data[1].abs() < 0.005);
        assert!((input.data[2] - 0.2).abs() < 0.005);
    }

    #[test]
    fn test_preprocess_nchw() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 51]));
        let input = preprocess(&img, 4, TensorLayout::Nchw);
        assert_eq!(input.shape, vec![1, 3, 4, 4]);
        // First plane is the red channel.
        assert!(input.data[..16].iter().all(|v| (v - 1.0).abs() < 0.005));
        assert!(input.data[16..32].iter().all(|v| v.abs() < 0.005));
    }
}
