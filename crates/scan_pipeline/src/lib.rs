//! # scan_pipeline
//!
//! Classify-and-explain orchestration for brain scans.
//!
//! [`ScanPipeline`] ties the stages together: preprocess the upload, run the
//! classifier with Grad-CAM, turn the logit into a [`Prediction`] and render
//! the attention map over the scan.
//!
//! ## Example
//!
//! ```rust,ignore
//! use scan_pipeline::{PipelineConfig, ScanPipeline};
//!
//! let pipeline = ScanPipeline::<CpuAutodiff>::load(PipelineConfig::default(), &device)?;
//! let report = pipeline.classify_and_explain(&bytes)?;
//! println!("{} ({:.1}%)", report.label, report.confidence * 100.0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod result;

pub use config::{PipelineConfig, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_WEIGHTS};
pub use error::{PipelineError, Result};
pub use pipeline::ScanPipeline;
pub use result::{
    Diagnosis, ExplanationQuality, InferenceResult, Prediction, ScanReport, ScanSummary,
    DECISION_THRESHOLD,
};

/// Pipeline on the CPU backend.
#[cfg(feature = "backend-ndarray")]
pub type CpuPipeline = ScanPipeline<scan_core::backend::CpuAutodiff>;
