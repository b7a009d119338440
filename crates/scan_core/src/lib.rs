//! # scan_core
//!
//! Core types and traits for brainscan tumor triage.
//!
//! This crate provides:
//! - [`ScanShape`] for image tensor shape metadata
//! - [`ScanTensor`] wrapper for Burn tensors with the classifier's fixed input shape
//! - [`LayerId`] naming the classifier layers that can be explained
//! - [`ExplainableClassifier`], the seam between the classifier and Grad-CAM
//! - Normalization constants and error types
//!
//! ## Shape Convention
//!
//! Scan data follows the convention `(B, C, H, W)`:
//! - `B`: Batch size (always 1 at inference)
//! - `C`: Color channels, in R, G, B order
//! - `H`, `W`: Spatial size, fixed at [`INPUT_SIZE`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use scan_core::{ScanShape, ScanTensor};
//!
//! let tensor = Tensor::<NdArray, 4>::zeros(ScanShape::input().as_array(), &device);
//! let scan = ScanTensor::new(tensor)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod layer;
mod model_trait;
mod shape;
mod tensor;

pub use error::{CoreError, Result};
pub use layer::LayerId;
pub use model_trait::ExplainableClassifier;
pub use shape::ScanShape;
pub use tensor::ScanTensor;

/// Spatial resolution the classifier was trained at.
pub const INPUT_SIZE: usize = 224;

/// Number of color channels the classifier expects.
pub const INPUT_CHANNELS: usize = 3;

/// Per-channel mean used when the classifier was trained (ImageNet statistics).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation used when the classifier was trained.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_autodiff::Autodiff;

    /// CPU backend with autodiff, the default for explained inference.
    #[cfg(feature = "backend-ndarray")]
    pub type CpuAutodiff = burn_autodiff::Autodiff<burn_ndarray::NdArray>;
}
