//! Binary tumor classifier: ResNet-18 features and a stacked MLP head.

use burn::nn::{
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    Dropout, DropoutConfig, Linear, LinearConfig, Relu,
};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use scan_core::LayerId;
use serde::{Deserialize, Serialize};

use crate::cnn::ResNetBackbone;

/// Architecture name recorded in checkpoint manifests.
pub const ARCH_NAME: &str = "resnet18-binary";

/// Configuration for [`TumorClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Channels of the first residual stage (64 for a standard ResNet-18).
    pub base_width: usize,
    /// Hidden sizes of the decision head.
    pub hidden: Vec<usize>,
    /// Dropout before each head linear layer (`hidden.len() + 1` entries).
    pub dropout: Vec<f64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_width: 64,
            hidden: vec![512, 256],
            dropout: vec![0.3, 0.3, 0.2],
        }
    }
}

impl ClassifierConfig {
    /// Create a config with a custom backbone width and the default head.
    pub fn new(base_width: usize) -> Self {
        Self {
            base_width,
            ..Default::default()
        }
    }

    /// Set the head hidden sizes.
    #[must_use]
    pub fn with_hidden(mut self, hidden: Vec<usize>) -> Self {
        self.hidden = hidden;
        self
    }

    /// Disable dropout.
    ///
    /// Dropout has no parameters, so a frozen config loads the same weights.
    /// Burn applies dropout on any autodiff backend, and explanations run on one.
    #[must_use]
    pub fn frozen(mut self) -> Self {
        self.dropout.iter_mut().for_each(|p| *p = 0.0);
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TumorClassifier<B> {
        TumorClassifier::new(self, device)
    }
}

/// One `{dropout, linear}` step of the head; ReLU is applied between steps.
#[derive(Module, Debug)]
pub struct HeadBlock<B: Backend> {
    dropout: Dropout,
    linear: Linear<B>,
}

/// Decision head reducing pooled features to a single logit.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    blocks: Vec<HeadBlock<B>>,
}

impl<B: Backend> ClassifierHead<B> {
    fn new(in_features: usize, config: &ClassifierConfig, device: &B::Device) -> Self {
        let sizes: Vec<usize> = std::iter::once(in_features)
            .chain(config.hidden.iter().copied())
            .chain(std::iter::once(1))
            .collect();

        let blocks = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| HeadBlock {
                dropout: DropoutConfig::new(config.dropout.get(i).copied().unwrap_or(0.0)).init(),
                linear: LinearConfig::new(pair[0], pair[1]).init(device),
            })
            .collect();

        Self { blocks }
    }

    /// Forward pass from `(batch, features)` to `(batch, 1)`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.run(x, true)
    }

    /// Forward pass with every dropout skipped, whatever its probability.
    pub fn forward_inference(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.run(x, false)
    }

    fn run(&self, x: Tensor<B, 2>, dropout: bool) -> Tensor<B, 2> {
        let relu = Relu::new();
        let last = self.blocks.len().saturating_sub(1);

        self.blocks
            .iter()
            .enumerate()
            .fold(x, |out, (i, block)| {
                let out = if dropout {
                    block.dropout.forward(out)
                } else {
                    out
                };
                let out = block.linear.forward(out);
                if i < last {
                    relu.forward(out)
                } else {
                    out
                }
            })
    }
}

/// Brain tumor classifier producing one logit per image.
///
/// A positive logit favours `Tumor`. The designated explanation target is
/// [`LayerId::Layer4`], the last residual stage before global pooling.
#[derive(Module, Debug)]
pub struct TumorClassifier<B: Backend> {
    backbone: ResNetBackbone<B>,
    pool: AdaptiveAvgPool2d,
    head: ClassifierHead<B>,
}

impl<B: Backend> TumorClassifier<B> {
    /// Create a new classifier with freshly initialized weights.
    pub fn new(config: &ClassifierConfig, device: &B::Device) -> Self {
        let backbone = ResNetBackbone::new(config.base_width, device);
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let head = ClassifierHead::new(config.base_width * 8, config, device);

        Self {
            backbone,
            pool,
            head,
        }
    }

    /// Forward pass up to and including `layer`.
    pub fn forward_until(&self, x: Tensor<B, 4>, layer: LayerId) -> Tensor<B, 4> {
        self.backbone.forward_until(x, layer)
    }

    /// Remainder of the forward pass from the output of `layer`.
    pub fn forward_after(&self, activation: Tensor<B, 4>, layer: LayerId) -> Tensor<B, 2> {
        let out = self.backbone.forward_after(activation, layer);
        let out = self.pool.forward(out);
        let [batch, channels, _, _] = out.dims();
        self.head.forward(out.reshape([batch, channels]))
    }

    /// Inference-mode remainder of the forward pass from the output of `layer`.
    ///
    /// Dropout is skipped even on autodiff backends, so the logit only depends
    /// on the input and the weights.
    pub fn forward_after_inference(
        &self,
        activation: Tensor<B, 4>,
        layer: LayerId,
    ) -> Tensor<B, 2> {
        let out = self.backbone.forward_after(activation, layer);
        let out = self.pool.forward(out);
        let [batch, channels, _, _] = out.dims();
        self.head.forward_inference(out.reshape([batch, channels]))
    }

    /// Forward pass returning logits of shape (batch, 1).
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(x);
        self.forward_after(features, LayerId::Layer4)
    }

    /// Forward pass returning tumor probabilities.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_core::backend::{Autodiff, NdArray};

    fn small_config() -> ClassifierConfig {
        ClassifierConfig::new(4).with_hidden(vec![16, 8])
    }

    #[test]
    fn test_classifier_config_default() {
        let config = ClassifierConfig::default();
        assert_eq!(config.base_width, 64);
        assert_eq!(config.hidden, vec![512, 256]);
        assert_eq!(config.dropout.len(), config.hidden.len() + 1);
    }

    #[test]
    fn test_frozen_disables_dropout() {
        let config = ClassifierConfig::default().frozen();
        assert!(config.dropout.iter().all(|p| *p == 0.0));
        assert_eq!(config.hidden, ClassifierConfig::default().hidden);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = small_config().init::<NdArray>(&device);
        let x = Tensor::<NdArray, 4>::zeros([1, 3, 224, 224], &device);

        assert_eq!(model.forward(x.clone()).dims(), [1, 1]);

        let probs = model.forward_probs(x);
        let p: f32 = probs.into_scalar().elem();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_frozen_model_is_deterministic_with_autodiff() {
        type B = Autodiff<NdArray>;
        let device = Default::default();
        let model = small_config().frozen().init::<B>(&device);
        let x = Tensor::<B, 4>::ones([1, 3, 224, 224], &device);

        let a: f32 = model.forward(x.clone()).into_scalar().elem();
        let b: f32 = model.forward(x).into_scalar().elem();
        assert_eq!(a, b);
    }

    #[test]
    fn test_inference_forward_ignores_dropout() {
        type B = Autodiff<NdArray>;
        let device = Default::default();
        let model = small_config().init::<B>(&device);
        let frozen = small_config()
            .frozen()
            .init::<B>(&device)
            .load_record(model.clone().into_record());
        let x = Tensor::<B, 4>::ones([1, 3, 224, 224], &device);
        let features = model.forward_until(x, LayerId::Layer4);

        let a: f32 = model
            .forward_after_inference(features.clone(), LayerId::Layer4)
            .into_scalar()
            .elem();
        let b: f32 = model
            .forward_after_inference(features.clone(), LayerId::Layer4)
            .into_scalar()
            .elem();
        let expected: f32 = frozen
            .forward_after(features, LayerId::Layer4)
            .into_scalar()
            .elem();

        assert_eq!(a, b);
        assert!((a - expected).abs() < 1e-5);
    }

    #[test]
    fn test_split_at_every_layer() {
        let device = Default::default();
        let model = small_config().init::<NdArray>(&device);
        let x = Tensor::<NdArray, 4>::ones([1, 3, 224, 224], &device);
        let full: f32 = model.forward(x.clone()).into_scalar().elem();

        for layer in LayerId::ALL {
            let activation = model.forward_until(x.clone(), layer);
            let split: f32 = model.forward_after(activation, layer).into_scalar().elem();
            assert!((full - split).abs() < 1e-4, "split at {layer} diverged");
        }
    }
}
