use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageError, RgbImage};

use super::ImageEncoder;
use crate::error::RasterError;

/// Map a normalized quality in (0, 1] onto the JPEG 1-100 scale
pub fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 1;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode raw 8-bit pixels as a baseline JPEG
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
    quality: u8,
) -> Result<Vec<u8>, ImageError> {
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder.encode(pixels, width, height, color)?;
    Ok(jpeg)
}

/// JPEG encoder for rendered pages
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegImageEncoder;

impl ImageEncoder for JpegImageEncoder {
    fn encode(&self, bitmap: &RgbImage, quality: f32) -> Result<Vec<u8>, RasterError> {
        let (width, height) = bitmap.dimensions();
        encode_jpeg(
            bitmap.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
            jpeg_quality(quality),
        )
        .map_err(|e| RasterError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_quality_mapping() {
        assert_eq!(jpeg_quality(0.82), 82);
        assert_eq!(jpeg_quality(0.2), 20);
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(3.0), 100);
        assert_eq!(jpeg_quality(f32::NAN), 1);
    }

    #[test]
    fn test_encode_white_page() {
        let bitmap = RgbImage::from_pixel(120, 160, Rgb([255, 255, 255]));
        let jpeg = JpegImageEncoder.encode(&bitmap, 0.5).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert!(jpeg.len() < bitmap.as_raw().len());
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let bitmap = RgbImage::from_fn(200, 200, |x, y| Rgb([(x ^ y) as u8, (x * 3) as u8, (y * 7) as u8]));

        let high = JpegImageEncoder.encode(&bitmap, 0.82).unwrap();
        let low = JpegImageEncoder.encode(&bitmap, 0.2).unwrap();

        assert!(low.len() < high.len());
    }
}
