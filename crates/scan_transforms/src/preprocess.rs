//! Scan preprocessing: raw upload bytes to a normalized classifier input.

use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::RgbImage;
use scan_core::{ScanShape, ScanTensor, IMAGENET_MEAN, IMAGENET_STD, INPUT_SIZE};

use crate::error::{Result, TransformError};

/// Output of [`ScanPreprocessor::process`].
#[derive(Debug, Clone)]
pub struct PreprocessedScan<B: Backend> {
    /// Normalized tensor of shape `(1, 3, 224, 224)`.
    pub tensor: ScanTensor<B>,
    /// The resized image before normalization, used for rendering.
    pub original: RgbImage,
}

/// Turns uploaded image bytes into classifier input.
///
/// Steps, in order:
/// 1. decode any format the `image` crate understands
/// 2. convert to RGB (alpha dropped, grayscale expanded)
/// 3. resize to `size x size` with bilinear filtering, ignoring aspect ratio
/// 4. scale to `[0, 1]` and normalize per channel with `mean` / `std`
#[derive(Debug, Clone)]
pub struct ScanPreprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    filter: FilterType,
}

impl Default for ScanPreprocessor {
    fn default() -> Self {
        Self {
            size: INPUT_SIZE as u32,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            filter: FilterType::Triangle,
        }
    }
}

impl ScanPreprocessor {
    /// Create a preprocessor for the classifier's training statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Output side length.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Decode and resize without normalizing.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(TransformError::Decode("empty input".to_string()));
        }

        let decoded =
            image::load_from_memory(bytes).map_err(|e| TransformError::Decode(e.to_string()))?;
        tracing::debug!(
            "Decoded {}x{} {:?} image",
            decoded.width(),
            decoded.height(),
            decoded.color()
        );

        let rgb = decoded.to_rgb8();
        if rgb.width() == self.size && rgb.height() == self.size {
            return Ok(rgb);
        }
        Ok(imageops::resize(&rgb, self.size, self.size, self.filter))
    }

    /// Normalize an RGB image into a `(1, 3, H, W)` tensor, channel-major.
    pub fn normalize<B: Backend>(&self, image: &RgbImage, device: &B::Device) -> Result<ScanTensor<B>> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let plane = width * height;
        let mut data = vec![0.0f32; 3 * plane];

        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                let value = f32::from(pixel[c]) / 255.0;
                data[c * plane + i] = (value - self.mean[c]) / self.std[c];
            }
        }

        let shape = ScanShape::new(1, 3, height, width);
        let tensor = Tensor::<B, 4>::from_data(TensorData::new(data, shape.as_array()), device);
        Ok(ScanTensor::new(tensor)?)
    }

    /// Full preprocessing of uploaded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Decode`] if the bytes are not an image.
    pub fn process<B: Backend>(&self, bytes: &[u8], device: &B::Device) -> Result<PreprocessedScan<B>> {
        let original = self.decode(bytes)?;
        let tensor = self.normalize(&original, device)?;
        Ok(PreprocessedScan { tensor, original })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayAlphaImage, ImageFormat, LumaA, Rgb};
    use scan_core::backend::NdArray;
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let device = Default::default();
        let prep = ScanPreprocessor::new();

        let err = prep.process::<NdArray>(b"definitely not a scan", &device).unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));

        let err = prep.process::<NdArray>(&[], &device).unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[test]
    fn test_resizes_any_aspect_ratio() {
        let device = Default::default();
        let wide = RgbImage::from_pixel(300, 120, Rgb([10, 20, 30]));
        let bytes = encode(DynamicImage::ImageRgb8(wide), ImageFormat::Png);

        let scan = ScanPreprocessor::new().process::<NdArray>(&bytes, &device).unwrap();

        assert_eq!(scan.original.dimensions(), (224, 224));
        assert_eq!(scan.tensor.shape(), ScanShape::input());
        assert_eq!(scan.original.get_pixel(100, 100), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_grayscale_alpha_expanded_to_rgb() {
        let device = Default::default();
        let gray = GrayAlphaImage::from_pixel(224, 224, LumaA([128, 7]));
        let bytes = encode(DynamicImage::ImageLumaA8(gray), ImageFormat::Png);

        let scan = ScanPreprocessor::new().process::<NdArray>(&bytes, &device).unwrap();

        assert_eq!(scan.original.get_pixel(0, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_normalization_values() {
        let device = Default::default();
        let black = RgbImage::new(224, 224);
        let bytes = encode(DynamicImage::ImageRgb8(black), ImageFormat::Png);

        let scan = ScanPreprocessor::new().process::<NdArray>(&bytes, &device).unwrap();
        let values = scan.tensor.into_inner().into_data().to_vec::<f32>().unwrap();
        let plane = 224 * 224;

        for c in 0..3 {
            let expected = -IMAGENET_MEAN[c] / IMAGENET_STD[c];
            assert!((values[c * plane] - expected).abs() < 1e-6);
            assert!((values[(c + 1) * plane - 1] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_channel_order_is_rgb() {
        let device = Default::default();
        let red = RgbImage::from_pixel(224, 224, Rgb([255, 0, 0]));

        let tensor = ScanPreprocessor::new().normalize::<NdArray>(&red, &device).unwrap();
        let values = tensor.into_inner().into_data().to_vec::<f32>().unwrap();
        let plane = 224 * 224;

        let r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let g = -IMAGENET_MEAN[1] / IMAGENET_STD[1];
        assert!((values[0] - r).abs() < 1e-6);
        assert!((values[plane] - g).abs() < 1e-6);
    }

    #[test]
    fn test_jpeg_input() {
        let device = Default::default();
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let scan = ScanPreprocessor::new().process::<NdArray>(&bytes, &device).unwrap();
        assert_eq!(scan.original.dimensions(), (224, 224));
    }
}
