//! Model checkpointing and loading utilities.
//!
//! Provides utilities for saving and loading classifier weights using Burn's record system.
//!
//! # Supported Formats
//!
//! - **Named MessagePack** (`*.mpk`): Burn's native format, includes parameter names
//! - **PyTorch** (`*.pt`, `*.pth`): torch `state_dict` from the original training code,
//!   either bare or under a `model_state_dict` key (requires the `pytorch` feature)
//!
//! A checkpoint may carry a JSON manifest next to it (`classifier.mpk` →
//! `classifier.json`) recording the architecture, version and configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use scan_models::checkpoint::{load_classifier, save_model, CheckpointFormat};
//! use scan_models::ClassifierConfig;
//!
//! let config = ClassifierConfig::default();
//! let model = config.init::<NdArray>(&device);
//! save_model(&model, "classifier.mpk", CheckpointFormat::NamedMessagePack)?;
//!
//! let loaded = load_classifier::<NdArray>("classifier.mpk", &config, &device)?;
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use scan_core::ScanShape;

use crate::classifier::{ClassifierConfig, TumorClassifier, TumorClassifierRecord, ARCH_NAME};

/// Checkpoint format for model serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// Named MessagePack (includes parameter names).
    NamedMessagePack,
    /// PyTorch pickled `state_dict`.
    PyTorch,
}

impl CheckpointFormat {
    /// Infer the format from a file extension. Unknown extensions are treated
    /// as Burn records.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("pt") | Some("pth") => CheckpointFormat::PyTorch,
            _ => CheckpointFormat::NamedMessagePack,
        }
    }

    /// Path the recorder actually reads or writes.
    ///
    /// Burn's file recorders force their own extension.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match self {
            CheckpointFormat::NamedMessagePack => path.with_extension("mpk"),
            CheckpointFormat::PyTorch => path.to_path_buf(),
        }
    }
}

/// Save a model to a checkpoint file.
///
/// Only Burn's own format can be written.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>, format: CheckpointFormat) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    let record = model.clone().into_record();

    match format {
        CheckpointFormat::NamedMessagePack => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            Recorder::<B>::record(&recorder, record, path.to_path_buf())
                .map_err(|e| CheckpointError::Save(e.to_string()))?;
        }
        CheckpointFormat::PyTorch => {
            return Err(CheckpointError::InvalidFormat(
                "PyTorch checkpoints are read-only".to_string(),
            ));
        }
    }

    Ok(())
}

/// Load a Burn record from a checkpoint file.
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::load(&recorder, path.as_ref().to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Load a torch `state_dict` into a classifier record.
///
/// The original training code saved either the bare state dict or a dict with
/// a `model_state_dict` entry; the wrapped form is tried first.
#[cfg(feature = "pytorch")]
fn load_pytorch_record<B: Backend>(
    path: &Path,
    config: &ClassifierConfig,
    device: &B::Device,
) -> Result<TumorClassifierRecord<B>> {
    use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

    let args = || {
        let mut args = LoadArgs::new(path.to_path_buf())
            .with_key_remap(r"downsample\.0\.", "downsample.conv.")
            .with_key_remap(r"downsample\.1\.", "downsample.bn.");
        // torch head: Sequential(Dropout, Linear, ReLU, Dropout, Linear, ReLU, Dropout, Linear)
        for i in 0..=config.hidden.len() {
            args = args.with_key_remap(
                &format!(r"^backbone\.fc\.{}\.", 3 * i + 1),
                &format!("head.blocks.{i}.linear."),
            );
        }
        args
    };

    let recorder = PyTorchFileRecorder::<FullPrecisionSettings>::default();
    match Recorder::<B>::load(&recorder, args().with_top_level_key("model_state_dict"), device) {
        Ok(record) => Ok(record),
        Err(wrapped) => {
            tracing::debug!("No model_state_dict entry ({wrapped}), reading bare state dict");
            Recorder::<B>::load(&recorder, args(), device)
                .map_err(|e| CheckpointError::Load(e.to_string()))
        }
    }
}

#[cfg(not(feature = "pytorch"))]
fn load_pytorch_record<B: Backend>(
    path: &Path,
    _config: &ClassifierConfig,
    _device: &B::Device,
) -> Result<TumorClassifierRecord<B>> {
    Err(CheckpointError::InvalidFormat(format!(
        "{} is a PyTorch checkpoint; rebuild with the `pytorch` feature",
        path.display()
    )))
}

/// Load a classifier checkpoint and verify it fits the architecture.
///
/// If a manifest sits next to the checkpoint, its configuration takes
/// precedence over `config`; the configuration actually used is returned with
/// the model. The model is ready for inference: dropout is disabled and no
/// parameter requires gradients.
///
/// # Errors
///
/// Fails if the file is missing or unreadable, if the manifest names another
/// architecture, or if the weights do not match the configured shapes.
pub fn load_classifier<B: Backend>(
    path: impl AsRef<Path>,
    config: &ClassifierConfig,
    device: &B::Device,
) -> Result<(TumorClassifier<B>, ClassifierConfig)> {
    let path = path.as_ref();
    let format = CheckpointFormat::from_path(path);
    let resolved = format.resolve(path);

    if !resolved.is_file() {
        return Err(CheckpointError::NotFound(resolved));
    }

    let config = match ModelManifest::load_beside(&resolved)? {
        Some(manifest) => {
            if manifest.arch != ARCH_NAME {
                return Err(CheckpointError::Incompatible(format!(
                    "manifest describes `{}`, expected `{ARCH_NAME}`",
                    manifest.arch
                )));
            }
            tracing::info!(
                "Using manifest for {} (version {})",
                resolved.display(),
                manifest.version
            );
            manifest.config
        }
        None => config.clone(),
    };

    let skeleton = config.clone().frozen().init::<B>(device);
    let expected_params = skeleton.num_params();

    let record = match format {
        CheckpointFormat::NamedMessagePack => {
            load_record::<B, TumorClassifier<B>>(&resolved, device)?
        }
        CheckpointFormat::PyTorch => load_pytorch_record::<B>(&resolved, &config, device)?,
    };

    // Burn panics when the record's module layout differs from the skeleton.
    let model = catch_unwind(AssertUnwindSafe(|| skeleton.load_record(record)))
        .map_err(|_| {
            CheckpointError::Incompatible(
                "checkpoint layout does not match the architecture".to_string(),
            )
        })?
        .no_grad();

    let loaded_params = model.num_params();
    if loaded_params != expected_params {
        return Err(CheckpointError::Incompatible(format!(
            "checkpoint holds {loaded_params} parameters, architecture expects {expected_params}"
        )));
    }

    probe(&model, device)?;

    tracing::info!(
        "Loaded {} from {} ({} parameters)",
        ARCH_NAME,
        resolved.display(),
        loaded_params
    );

    Ok((model, config))
}

/// Run one forward pass on a blank scan to catch mismatched tensor layouts.
///
/// Equal parameter counts do not rule out swapped dimensions; those only
/// surface as a panic inside the backend.
fn probe<B: Backend>(model: &TumorClassifier<B>, device: &B::Device) -> Result<()> {
    let input = Tensor::<B, 4>::zeros(ScanShape::input().as_array(), device);

    match catch_unwind(AssertUnwindSafe(|| model.forward(input).dims())) {
        Ok([1, 1]) => Ok(()),
        Ok(dims) => Err(CheckpointError::Incompatible(format!(
            "probe produced output of shape {dims:?}, expected [1, 1]"
        ))),
        Err(_) => Err(CheckpointError::Incompatible(
            "probe forward pass failed; tensor layouts do not match the architecture".to_string(),
        )),
    }
}

/// Model checkpoint manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    /// Model architecture name.
    pub arch: String,
    /// Weight artifact version.
    pub version: String,
    /// Classifier configuration the weights were trained with.
    pub config: ClassifierConfig,
    /// Validation accuracy (if applicable).
    pub val_acc: Option<f32>,
    /// Additional metadata.
    pub extra: HashMap<String, String>,
}

impl ModelManifest {
    /// Create a manifest for the classifier architecture.
    pub fn new(version: impl Into<String>, config: ClassifierConfig) -> Self {
        Self {
            arch: ARCH_NAME.to_string(),
            version: version.into(),
            config,
            val_acc: None,
            extra: HashMap::new(),
        }
    }

    /// Set the validation accuracy.
    #[must_use]
    pub fn with_val_acc(mut self, acc: f32) -> Self {
        self.val_acc = Some(acc);
        self
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Path of the manifest belonging to a checkpoint.
    pub fn path_for(checkpoint: impl AsRef<Path>) -> PathBuf {
        checkpoint.as_ref().with_extension("json")
    }

    /// Save manifest to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load manifest from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }

    /// Load the manifest next to `checkpoint`, if there is one.
    pub fn load_beside(checkpoint: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = Self::path_for(checkpoint);
        if path.is_file() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Checkpoint file does not exist.
    #[error("Checkpoint not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Weights do not fit the architecture.
    #[error("Incompatible checkpoint: {0}")]
    Incompatible(String),

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),
}
