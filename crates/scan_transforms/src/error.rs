//! Error types for scan transforms.

use thiserror::Error;

/// Result type alias for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors raised while preparing or rendering images.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Input bytes are not a decodable image.
    #[error("Cannot decode image: {0}")]
    Decode(String),

    /// Rendering output could not be encoded.
    #[error("Cannot encode image: {0}")]
    Encode(String),

    /// Map and image dimensions disagree.
    #[error("Dimension mismatch: map is {map:?}, image is {image:?}")]
    DimensionMismatch {
        /// Map dimensions as (height, width).
        map: (usize, usize),
        /// Image dimensions as (height, width).
        image: (usize, usize),
    },

    /// Tensor construction failed.
    #[error(transparent)]
    Core(#[from] scan_core::CoreError),
}
