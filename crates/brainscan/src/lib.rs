//! # brainscan
//!
//! Brain scan tumor triage in Rust: a binary ResNet-18 classifier whose every
//! decision comes with a Grad-CAM attention map.
//!
//! - **Preprocessing**: decode, resize to 224x224, ImageNet normalization
//! - **Model**: ResNet-18 backbone and a stacked MLP head emitting one logit
//! - **Explainability**: per-call layer capture and Grad-CAM at `layer4`
//! - **Pipeline**: `classify_and_explain` returning label, probability and PNG renderings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brainscan::prelude::*;
//!
//! let device = Default::default();
//! let pipeline = CpuPipeline::load(PipelineConfig::new("weights/classifier.mpk"), &device)?;
//!
//! let report = pipeline.classify_and_explain(&std::fs::read("scan.jpg")?)?;
//! println!("{} with {:.1}% confidence", report.label, report.confidence * 100.0);
//! std::fs::write("overlay.png", &report.overlay_image)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `pytorch`: load torch `state_dict` checkpoints (`.pt` / `.pth`)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use scan_core as core;
pub use scan_explain as explain;
pub use scan_models as models;
pub use scan_pipeline as pipeline;
pub use scan_transforms as transforms;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use brainscan::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use scan_core::{ExplainableClassifier, LayerId, ScanShape, ScanTensor};

    // Transforms
    pub use scan_transforms::{encode_png, Compositor, JetColormap, ScanPreprocessor};

    // Models
    pub use scan_models::{load_classifier, ClassifierConfig, ModelManifest, TumorClassifier};

    // Explain
    pub use scan_explain::{AttentionMap, Explanation, GradCam, LayerCapture};

    // Pipeline
    pub use scan_pipeline::{
        Diagnosis, ExplanationQuality, InferenceResult, PipelineConfig, PipelineError,
        Prediction, ScanPipeline, ScanReport, ScanSummary,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use scan_core::backend::{self, CpuAutodiff};

    #[cfg(feature = "backend-ndarray")]
    pub use scan_pipeline::CpuPipeline;
}
