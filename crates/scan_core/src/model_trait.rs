//! Model traits for explained inference.
//!
//! Defines the seam between a classifier and the attention map generator.
//! Instead of registering hooks on a layer, a classifier exposes its forward
//! pass split at a named layer; the caller owns whatever it captures there.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::layer::LayerId;

/// Trait for binary classifiers that can be explained at a named layer.
///
/// Implementations must compute the inference-mode function on every backend
/// (no dropout, no batch statistics), so that splitting the forward pass does
/// not change the logit.
pub trait ExplainableClassifier<B: AutodiffBackend>: AutodiffModule<B> + Clone + Send {
    /// Layers that can be used as explanation targets, in forward order.
    fn layers(&self) -> &'static [LayerId];

    /// Forward pass up to and including `layer`.
    ///
    /// Runs on the inner backend: nothing before the target layer needs gradients.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, 3, 224, 224)
    ///
    /// # Returns
    ///
    /// Activations of shape (batch, channels, height, width)
    fn forward_to_layer(
        &self,
        x: Tensor<B::InnerBackend, 4>,
        layer: LayerId,
    ) -> Tensor<B::InnerBackend, 4>;

    /// Remainder of the forward pass, from the output of `layer` to the logit.
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, 1)
    fn forward_from_layer(&self, activation: Tensor<B, 4>, layer: LayerId) -> Tensor<B, 2>;

    /// Full forward pass returning the logit.
    fn forward_logit(&self, x: Tensor<B::InnerBackend, 4>) -> Tensor<B::InnerBackend, 2> {
        let last = self.layers().last().copied().unwrap_or(LayerId::DEFAULT_TARGET);
        let features = self.forward_to_layer(x, last);
        let features = Tensor::<B, 4>::from_inner(features);
        self.forward_from_layer(features, last).inner()
    }
}
