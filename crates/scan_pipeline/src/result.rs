//! Prediction and report types.

use std::fmt;

use scan_explain::AttentionMap;
use scan_transforms::{encode_png, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Probability at or above which a scan is labelled [`Diagnosis::Tumor`].
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Triage label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diagnosis {
    /// Tumor suspected.
    Tumor,
    /// No tumor suspected.
    NoTumor,
}

impl Diagnosis {
    /// Label for a tumor probability.
    pub fn from_probability(probability: f64) -> Self {
        if probability >= DECISION_THRESHOLD {
            Diagnosis::Tumor
        } else {
            Diagnosis::NoTumor
        }
    }

    /// Human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Diagnosis::Tumor => "Tumor",
            Diagnosis::NoTumor => "No Tumor",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Classifier decision derived from one logit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label.
    pub diagnosis: Diagnosis,
    /// Probability of a tumor, in `[0, 1]`.
    pub probability: f64,
    /// Probability of the predicted label, in `[0.5, 1]`.
    pub confidence: f64,
}

impl Prediction {
    /// Apply the logistic function and the decision threshold.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InternalComputation`] for a NaN or infinite logit.
    pub fn from_logit(logit: f32) -> Result<Self> {
        if !logit.is_finite() {
            tracing::error!("Classifier produced non-finite logit {logit}");
            return Err(PipelineError::InternalComputation(
                "classifier output is not a number".to_string(),
            ));
        }

        let probability = sigmoid(f64::from(logit));
        let diagnosis = Diagnosis::from_probability(probability);
        let confidence = match diagnosis {
            Diagnosis::Tumor => probability,
            Diagnosis::NoTumor => 1.0 - probability,
        };

        Ok(Self {
            diagnosis,
            probability,
            confidence,
        })
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Whether the attention map carries information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationQuality {
    /// The map highlights at least one region.
    Full,
    /// No gradient reached the target layer; the map is all zero.
    Degenerate,
}

/// Result of classifying and explaining one scan.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Classifier decision.
    pub prediction: Prediction,
    /// The preprocessed scan, 224x224.
    pub original: RgbImage,
    /// Attention map rendered with the jet colormap, 224x224.
    pub heatmap: RgbImage,
    /// Blend of `original` and `heatmap`, 224x224.
    pub overlay: RgbImage,
    /// Attention map values in `[0, 1]`.
    pub attention: AttentionMap,
    /// Whether the attention map is usable.
    pub explanation: ExplanationQuality,
}

impl InferenceResult {
    /// Predicted label.
    pub fn diagnosis(&self) -> Diagnosis {
        self.prediction.diagnosis
    }

    /// Probability of a tumor.
    pub fn probability(&self) -> f64 {
        self.prediction.probability
    }

    /// Probability of the predicted label.
    pub fn confidence(&self) -> f64 {
        self.prediction.confidence
    }

    /// True if the attention map is all zero.
    pub fn is_degenerate(&self) -> bool {
        self.explanation == ExplanationQuality::Degenerate
    }

    /// Encode the images and build the external report.
    pub fn to_report(&self) -> Result<ScanReport> {
        Ok(ScanReport {
            label: self.prediction.diagnosis,
            probability: self.prediction.probability,
            confidence: self.prediction.confidence,
            original_image: encode_png(&self.original)?,
            heatmap_image: encode_png(&self.heatmap)?,
            overlay_image: encode_png(&self.overlay)?,
            degenerate_explanation: self.is_degenerate(),
        })
    }
}

/// Outcome of `classify_and_explain`, images encoded as PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    /// Predicted label.
    pub label: Diagnosis,
    /// Probability of a tumor.
    pub probability: f64,
    /// Probability of the predicted label.
    pub confidence: f64,
    /// The preprocessed scan.
    pub original_image: Vec<u8>,
    /// Rendered attention map.
    pub heatmap_image: Vec<u8>,
    /// Attention map over the scan.
    pub overlay_image: Vec<u8>,
    /// True if the attention map is all zero.
    pub degenerate_explanation: bool,
}

impl ScanReport {
    /// Serializable summary without the image payloads.
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            label: self.label,
            label_name: self.label.display_name().to_string(),
            probability: self.probability,
            confidence: self.confidence,
            degenerate_explanation: self.degenerate_explanation,
        }
    }
}

/// JSON-friendly view of a [`ScanReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Predicted label.
    pub label: Diagnosis,
    /// Human-readable label.
    pub label_name: String,
    /// Probability of a tumor.
    pub probability: f64,
    /// Probability of the predicted label.
    pub confidence: f64,
    /// True if the attention map is all zero.
    pub degenerate_explanation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_logit_is_tumor() {
        let prediction = Prediction::from_logit(0.0).unwrap();
        assert_eq!(prediction.diagnosis, Diagnosis::Tumor);
        assert_eq!(prediction.probability, 0.5);
        assert_eq!(prediction.confidence, 0.5);
    }

    #[test]
    fn test_negative_logit_is_no_tumor() {
        let prediction = Prediction::from_logit(-2.0).unwrap();
        assert_eq!(prediction.diagnosis, Diagnosis::NoTumor);
        assert!((prediction.probability - 0.119_202_922).abs() < 1e-6);
        assert!((prediction.confidence - 0.880_797_078).abs() < 1e-6);
    }

    #[test]
    fn test_extreme_logits_stay_in_range() {
        for logit in [-1e4f32, -88.0, 88.0, 1e4] {
            let prediction = Prediction::from_logit(logit).unwrap();
            assert!((0.0..=1.0).contains(&prediction.probability));
            assert!((0.5..=1.0).contains(&prediction.confidence));
        }
    }

    #[test]
    fn test_non_finite_logit_rejected() {
        for logit in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = Prediction::from_logit(logit).unwrap_err();
            assert!(matches!(err, PipelineError::InternalComputation(_)));
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Diagnosis::Tumor.to_string(), "Tumor");
        assert_eq!(Diagnosis::NoTumor.to_string(), "No Tumor");
        assert_eq!(serde_json::to_string(&Diagnosis::NoTumor).unwrap(), "\"NoTumor\"");
    }

    #[test]
    fn test_summary_drops_images() {
        let report = ScanReport {
            label: Diagnosis::Tumor,
            probability: 0.9,
            confidence: 0.9,
            original_image: vec![1, 2, 3],
            heatmap_image: vec![],
            overlay_image: vec![],
            degenerate_explanation: false,
        };

        let json = serde_json::to_value(report.summary()).unwrap();

        assert_eq!(json["label"], "Tumor");
        assert_eq!(json["label_name"], "Tumor");
        assert!(json.get("original_image").is_none());
    }
}
