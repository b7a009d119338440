//! # scan_explain
//!
//! Explainability tools for brainscan: layer capture and Grad-CAM attention maps.
//!
//! This crate provides:
//! - [`LayerCapture`], a per-call object that records one layer's activation
//!   and the gradient of the logit with respect to it
//! - [`grad_cam`] and [`AttentionMap`] for turning those into a `[0, 1]` map
//! - [`GradCam`], which runs the whole explanation for a single scan
//!
//! Captures never outlive the call that created them, so one classifier can be
//! explained from many threads at once.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod error;

pub use activation::{ActivationSnapshot, GradientSnapshot, LayerCapture};
pub use attribution::{grad_cam, resize_bilinear, AttentionMap, Explanation, GradCam};
pub use error::{ExplainError, Result};
