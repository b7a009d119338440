//! Pipeline configuration.

use std::path::{Path, PathBuf};

use scan_core::LayerId;
use scan_models::ClassifierConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Default location of the classifier weights.
pub const DEFAULT_WEIGHTS: &str = "weights/brain_tumor_model.mpk";

/// Largest accepted upload (16 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for [`ScanPipeline`](crate::ScanPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Weight artifact (`.mpk`, or `.pt`/`.pth` with the `pytorch` feature).
    pub weights: PathBuf,
    /// Layer the attention map is computed at.
    pub target_layer: LayerId,
    /// Uploads larger than this are rejected.
    pub max_image_bytes: usize,
    /// Classifier architecture; the default ResNet-18 head when absent.
    /// A manifest next to the weights overrides it.
    pub classifier: Option<ClassifierConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: PathBuf::from(DEFAULT_WEIGHTS),
            target_layer: LayerId::DEFAULT_TARGET,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            classifier: None,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration for the given weights.
    pub fn new(weights: impl Into<PathBuf>) -> Self {
        Self {
            weights: weights.into(),
            ..Default::default()
        }
    }

    /// Set the explained layer.
    #[must_use]
    pub fn with_target_layer(mut self, layer: LayerId) -> Self {
        self.target_layer = layer;
        self
    }

    /// Set the upload size limit.
    #[must_use]
    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Set the classifier architecture.
    #[must_use]
    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Save config to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(())
    }

    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&json).map_err(|e| PipelineError::Config(e.to_string()))
    }
}
