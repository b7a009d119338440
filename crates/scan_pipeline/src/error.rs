//! Error types for the classify-and-explain pipeline.

use scan_models::CheckpointError;
use scan_transforms::TransformError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors returned to pipeline callers.
///
/// A degenerate explanation is not an error; it is reported on the result.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input is not a usable image. Nothing was computed.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The classifier weights are missing or do not fit the architecture.
    #[error("Model could not be loaded: {0}")]
    ModelLoad(#[from] CheckpointError),

    /// Inference failed after the input was accepted.
    #[error("Internal computation error: {0}")]
    InternalComputation(String),

    /// The pipeline configuration could not be read or written.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<TransformError> for PipelineError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Decode(msg) => PipelineError::InvalidImage(msg),
            other => {
                tracing::error!("Rendering failed: {other}");
                PipelineError::InternalComputation("rendering failed".to_string())
            }
        }
    }
}
