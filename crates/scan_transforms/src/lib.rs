//! # scan_transforms
//!
//! Image-side stages of brainscan.
//!
//! This crate provides:
//! - [`ScanPreprocessor`]: decode, RGB conversion, 224x224 resize and ImageNet normalization
//! - [`JetColormap`]: the "jet" colormap used to render attention maps
//! - [`Compositor`]: heatmap and overlay rendering
//! - [`encode_png`]: PNG serialization of rendered images
//!
//! ## Example
//!
//! ```rust,ignore
//! use scan_transforms::{Compositor, ScanPreprocessor};
//!
//! let scan = ScanPreprocessor::new().process::<NdArray>(&bytes, &device)?;
//! let vis = Compositor::new().compose(map.values(), &scan.original)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod colormap;
pub mod composite;
pub mod encode;
pub mod error;
pub mod preprocess;

pub use colormap::JetColormap;
pub use composite::{Compositor, Visualization, HEATMAP_WEIGHT, ORIGINAL_WEIGHT};
pub use encode::encode_png;
pub use error::{Result, TransformError};
pub use preprocess::{PreprocessedScan, ScanPreprocessor};

/// Re-exported so callers can name rendered images without depending on `image`.
pub use image::RgbImage;
