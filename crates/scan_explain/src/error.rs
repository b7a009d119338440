//! Error types for explanations.

use scan_core::LayerId;
use thiserror::Error;

/// Result type alias for explanation operations.
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while explaining a prediction.
#[derive(Debug, Error)]
pub enum ExplainError {
    /// The classifier does not expose the requested layer.
    #[error("Layer `{0}` cannot be captured on this classifier")]
    UnknownLayer(LayerId),

    /// Backward pass requested before any forward pass.
    #[error("No forward pass has been captured")]
    NoForwardPass,

    /// Activation and gradient shapes disagree.
    #[error("Shape mismatch: activations {activations:?}, gradients {gradients:?}")]
    ShapeMismatch {
        /// Activation shape (channels, height, width).
        activations: [usize; 3],
        /// Gradient shape (channels, height, width).
        gradients: [usize; 3],
    },

    /// A NaN or infinity appeared in the computation.
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}
