//! Heatmap and overlay rendering.

use image::{Rgb, RgbImage};
use ndarray::ArrayView2;

use crate::colormap::JetColormap;
use crate::error::{Result, TransformError};

/// Weight of the original image in the overlay.
pub const ORIGINAL_WEIGHT: f32 = 0.6;

/// Weight of the heatmap in the overlay.
pub const HEATMAP_WEIGHT: f32 = 0.4;

/// Rendered explanation images, all of the same size.
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    /// Copy of the preprocessed (resized, unnormalized) scan.
    pub original: RgbImage,
    /// Attention map rendered through the colormap.
    pub heatmap: RgbImage,
    /// Weighted blend of `original` and `heatmap`.
    pub overlay: RgbImage,
}

/// Renders attention maps over scans.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    colormap: JetColormap,
}

impl Compositor {
    /// Create a compositor using the jet colormap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `map` (indexed `[row, column]`) as a heatmap.
    #[must_use]
    pub fn heatmap(&self, map: ArrayView2<'_, f32>) -> RgbImage {
        let (height, width) = map.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            Rgb(self.colormap.map(map[[y as usize, x as usize]]))
        })
    }

    /// Produce original, heatmap and overlay for one scan.
    ///
    /// Each overlay channel is `round(0.6 * original + 0.4 * heatmap)`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::DimensionMismatch`] if the map and the image
    /// differ in size.
    pub fn compose(&self, map: ArrayView2<'_, f32>, original: &RgbImage) -> Result<Visualization> {
        let image_dims = (original.height() as usize, original.width() as usize);
        if map.dim() != image_dims {
            return Err(TransformError::DimensionMismatch {
                map: map.dim(),
                image: image_dims,
            });
        }

        let heatmap = self.heatmap(map);
        let mut overlay = RgbImage::new(original.width(), original.height());
        for ((out, base), heat) in overlay.pixels_mut().zip(original.pixels()).zip(heatmap.pixels()) {
            *out = blend(base, heat);
        }

        Ok(Visualization {
            original: original.clone(),
            heatmap,
            overlay,
        })
    }
}

fn blend(base: &Rgb<u8>, heat: &Rgb<u8>) -> Rgb<u8> {
    let mut out = [0u8; 3];
    for (c, value) in out.iter_mut().enumerate() {
        let mixed = ORIGINAL_WEIGHT * f32::from(base[c]) + HEATMAP_WEIGHT * f32::from(heat[c]);
        *value = mixed.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_overlay_formula() {
        let original = RgbImage::from_pixel(4, 3, Rgb([100, 50, 255]));
        let map = Array2::<f32>::ones((3, 4));

        let vis = Compositor::new().compose(map.view(), &original).unwrap();

        // jet(1.0) = (127, 0, 0)
        assert_eq!(vis.heatmap.get_pixel(0, 0), &Rgb([127, 0, 0]));
        // 0.6*100 + 0.4*127 = 110.8, 0.6*50 = 30, 0.6*255 = 153
        assert_eq!(vis.overlay.get_pixel(3, 2), &Rgb([111, 30, 153]));
        assert_eq!(vis.original, original);
    }

    #[test]
    fn test_zero_map_is_flat_dark_blue() {
        let original = RgbImage::new(8, 8);
        let map = Array2::<f32>::zeros((8, 8));

        let vis = Compositor::new().compose(map.view(), &original).unwrap();

        assert!(vis.heatmap.pixels().all(|p| *p == Rgb([0, 0, 127])));
        // 0.4 * 127 = 50.8
        assert!(vis.overlay.pixels().all(|p| *p == Rgb([0, 0, 51])));
    }

    #[test]
    fn test_map_orientation() {
        let mut map = Array2::<f32>::zeros((2, 3));
        map[[1, 2]] = 1.0;

        let heatmap = Compositor::new().heatmap(map.view());

        assert_eq!(heatmap.dimensions(), (3, 2));
        assert_eq!(heatmap.get_pixel(2, 1), &Rgb([127, 0, 0]));
        assert_eq!(heatmap.get_pixel(0, 0), &Rgb([0, 0, 127]));
    }

    #[test]
    fn test_dimension_mismatch() {
        let original = RgbImage::new(224, 224);
        let map = Array2::<f32>::zeros((7, 7));

        let err = Compositor::new().compose(map.view(), &original).unwrap_err();
        assert!(matches!(
            err,
            TransformError::DimensionMismatch { map: (7, 7), image: (224, 224) }
        ));
    }
}
