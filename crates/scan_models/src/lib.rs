//! # scan_models
//!
//! Brain scan classifier for brainscan.
//!
//! - [`TumorClassifier`] - ResNet-18 backbone with a stacked MLP head emitting one logit
//! - [`ResNetBackbone`] - torchvision-compatible ResNet-18 feature extractor
//! - [`checkpoint`] - loading and validating trained weights
//!
//! The classifier implements [`scan_core::ExplainableClassifier`], which lets
//! gradient-based explanations split the forward pass at any residual stage.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod classifier;
pub mod cnn;
pub mod traits;

pub use checkpoint::{
    load_classifier, load_record, save_model, CheckpointError, CheckpointFormat, ModelManifest,
};
pub use classifier::{ClassifierConfig, ClassifierHead, HeadBlock, TumorClassifier, ARCH_NAME};
pub use cnn::*;
