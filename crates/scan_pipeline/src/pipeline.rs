//! The classify-and-explain pipeline.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use parking_lot::Mutex;
use scan_core::ExplainableClassifier;
use scan_explain::{Explanation, GradCam};
use scan_models::{load_classifier, TumorClassifier};
use scan_transforms::{Compositor, ScanPreprocessor, TransformError, Visualization};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::result::{ExplanationQuality, InferenceResult, Prediction, ScanReport};

/// Classifies brain scans and explains each decision with Grad-CAM.
///
/// The classifier weights are loaded once and shared by every call and every
/// clone of the pipeline. Each call works on its own handle to the model and
/// its own capture buffers, so a pipeline can serve many threads at once and
/// concurrent calls give the same results as sequential ones.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = ScanPipeline::<CpuAutodiff>::load(PipelineConfig::new("classifier.mpk"), &device)?;
///
/// let result = pipeline.infer(&std::fs::read("scan.jpg")?)?;
/// println!("{} ({:.3})", result.diagnosis(), result.probability());
/// ```
pub struct ScanPipeline<B: AutodiffBackend, M = TumorClassifier<B>> {
    model: Arc<Mutex<M>>,
    config: PipelineConfig,
    preprocessor: ScanPreprocessor,
    explainer: GradCam,
    compositor: Compositor,
    device: B::Device,
}

impl<B: AutodiffBackend, M> Clone for ScanPipeline<B, M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            config: self.config.clone(),
            preprocessor: self.preprocessor.clone(),
            explainer: self.explainer,
            compositor: self.compositor.clone(),
            device: self.device.clone(),
        }
    }
}

impl<B: AutodiffBackend> ScanPipeline<B, TumorClassifier<B>> {
    /// Load the classifier weights named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ModelLoad`] if the weights are missing,
    /// unreadable or do not fit the classifier architecture.
    pub fn load(config: PipelineConfig, device: &B::Device) -> Result<Self> {
        let started = Instant::now();
        let requested = config.classifier.clone().unwrap_or_default();

        let (model, used) = load_classifier::<B>(&config.weights, &requested, device).map_err(|e| {
            tracing::error!("Failed to load {}: {e}", config.weights.display());
            PipelineError::from(e)
        })?;

        tracing::info!(
            "Classifier ready in {:.2?} (base width {}, head {:?})",
            started.elapsed(),
            used.base_width,
            used.hidden
        );

        Ok(Self::from_model(model, config, device))
    }
}

impl<B, M> ScanPipeline<B, M>
where
    B: AutodiffBackend,
    M: ExplainableClassifier<B>,
{
    /// Wrap an already loaded classifier.
    ///
    /// The classifier's split forward pass runs in inference mode whatever
    /// dropout it was built with. Its parameters are frozen here, so gradients
    /// only ever flow to the captured layer and concurrent calls never share
    /// autodiff state.
    pub fn from_model(model: M, config: PipelineConfig, device: &B::Device) -> Self {
        let explainer = GradCam::new(config.target_layer);
        Self {
            model: Arc::new(Mutex::new(model.no_grad())),
            config,
            preprocessor: ScanPreprocessor::new(),
            explainer,
            compositor: Compositor::new(),
            device: device.clone(),
        }
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Device inference runs on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Handle to the shared classifier.
    ///
    /// Parameters are reference counted, so this does not copy weights.
    pub fn model(&self) -> M {
        self.model.lock().clone()
    }

    /// Classify one uploaded image and render its attention map.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidImage`] if the bytes are too large or not an image
    /// - [`PipelineError::InternalComputation`] if inference fails
    pub fn infer(&self, bytes: &[u8]) -> Result<InferenceResult> {
        let started = Instant::now();

        if bytes.len() > self.config.max_image_bytes {
            tracing::debug!("Rejected upload of {} bytes", bytes.len());
            return Err(PipelineError::InvalidImage(format!(
                "upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.config.max_image_bytes
            )));
        }

        let scan = guard_decode(|| {
            self.preprocessor
                .process::<B::InnerBackend>(bytes, &self.device)
        })?;
        let preprocessed = started.elapsed();

        let model = self.model();
        let original = scan.original;
        let tensor = scan.tensor;

        let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<(Explanation, Visualization)> {
            let explanation = self.explainer.explain::<B, M>(&model, tensor).map_err(|e| {
                tracing::error!("Explanation at {} failed: {e}", self.explainer.layer);
                PipelineError::InternalComputation("attention map computation failed".to_string())
            })?;
            let visualization = self.compositor.compose(explanation.map.values(), &original)?;
            Ok((explanation, visualization))
        }));

        let (explanation, visualization) = match outcome {
            Ok(result) => result?,
            Err(payload) => {
                tracing::error!("Inference panicked: {}", panic_message(payload.as_ref()));
                return Err(PipelineError::InternalComputation(
                    "numeric computation failed".to_string(),
                ));
            }
        };

        let prediction = Prediction::from_logit(explanation.logit)?;

        let quality = if explanation.is_degenerate() {
            tracing::warn!(
                "Attention map at {} is all zero; no gradient reached the layer",
                explanation.layer
            );
            ExplanationQuality::Degenerate
        } else {
            ExplanationQuality::Full
        };

        tracing::info!(
            "Diagnosis: {} (p = {:.4}, confidence = {:.4})",
            prediction.diagnosis,
            prediction.probability,
            prediction.confidence
        );
        tracing::debug!(
            "Preprocessing {:.2?}, total {:.2?}",
            preprocessed,
            started.elapsed()
        );

        Ok(InferenceResult {
            prediction,
            original: visualization.original,
            heatmap: visualization.heatmap,
            overlay: visualization.overlay,
            attention: explanation.map,
            explanation: quality,
        })
    }

    /// Classify, explain and encode the images as PNG.
    pub fn classify_and_explain(&self, bytes: &[u8]) -> Result<ScanReport> {
        self.infer(bytes)?.to_report()
    }

    /// Read an image file and run [`infer`](Self::infer) on it.
    pub fn infer_file(&self, path: impl AsRef<Path>) -> Result<InferenceResult> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::InvalidImage(format!("{}: {e}", path.display())))?;
        self.infer(&bytes)
    }
}

/// Run preprocessing, turning decoder errors and decoder panics into
/// [`PipelineError::InvalidImage`].
fn guard_decode<T>(
    decode: impl FnOnce() -> std::result::Result<T, TransformError>,
) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(decode)) {
        Ok(decoded) => decoded.map_err(|e| {
            tracing::debug!("Rejected upload: {e}");
            PipelineError::from(e)
        }),
        Err(payload) => {
            tracing::warn!("Decoder panicked: {}", panic_message(payload.as_ref()));
            Err(PipelineError::InvalidImage("image could not be decoded".to_string()))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
