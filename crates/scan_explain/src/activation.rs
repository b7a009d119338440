//! Activation and gradient capture at a single layer.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use scan_core::{ExplainableClassifier, LayerId};

use crate::error::{ExplainError, Result};

/// Activation of the captured layer for the first item in the batch.
#[derive(Debug, Clone)]
pub struct ActivationSnapshot<B: Backend> {
    /// Layer the activation was taken from.
    pub layer: LayerId,
    /// Values of shape (channels, height, width).
    pub values: Tensor<B, 3>,
}

/// Gradient of the logit with respect to the captured layer.
#[derive(Debug, Clone)]
pub struct GradientSnapshot<B: Backend> {
    /// Layer the gradient was taken at.
    pub layer: LayerId,
    /// Values of shape (channels, height, width).
    pub values: Tensor<B, 3>,
}

fn first_item<B: Backend>(tensor: Tensor<B, 4>) -> Tensor<B, 3> {
    let [_, channels, height, width] = tensor.dims();
    tensor
        .slice([0..1, 0..channels, 0..height, 0..width])
        .reshape([channels, height, width])
}

/// Records one layer's activation and gradient for a single call.
///
/// The model is only borrowed; everything captured is owned by this value and
/// released by [`detach`](Self::detach) or on drop. The activation is lifted
/// into the autodiff graph as a fresh leaf, so the backward pass stops there
/// and the model's parameters are never touched.
///
/// # Example
///
/// ```rust,ignore
/// let mut capture = LayerCapture::attach(&model, LayerId::Layer4)?;
/// let (logit, activation) = capture.run_forward_capturing_layer(input)?;
/// let gradient = capture.run_backward_capturing_layer()?;
/// capture.detach();
/// ```
#[derive(Debug)]
pub struct LayerCapture<'m, B: AutodiffBackend, M> {
    model: &'m M,
    layer: LayerId,
    leaf: Option<Tensor<B, 4>>,
    logit: Option<Tensor<B, 2>>,
    activation: Option<ActivationSnapshot<B::InnerBackend>>,
}

impl<'m, B, M> LayerCapture<'m, B, M>
where
    B: AutodiffBackend,
    M: ExplainableClassifier<B>,
{
    /// Bind a capture to `layer` of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::UnknownLayer`] if the model cannot be split there.
    pub fn attach(model: &'m M, layer: LayerId) -> Result<Self> {
        if !model.layers().contains(&layer) {
            return Err(ExplainError::UnknownLayer(layer));
        }
        Ok(Self {
            model,
            layer,
            leaf: None,
            logit: None,
            activation: None,
        })
    }

    /// Layer this capture is bound to.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Activation recorded by the last forward pass.
    pub fn activation(&self) -> Option<&ActivationSnapshot<B::InnerBackend>> {
        self.activation.as_ref()
    }

    /// Run the model on `x`, recording the activation of the bound layer.
    ///
    /// Returns the logits of shape `(batch, 1)` and the activation snapshot.
    /// A second call replaces everything captured by the first.
    pub fn run_forward_capturing_layer(
        &mut self,
        x: Tensor<B::InnerBackend, 4>,
    ) -> Result<(Tensor<B::InnerBackend, 2>, ActivationSnapshot<B::InnerBackend>)> {
        let activation = self.model.forward_to_layer(x, self.layer);
        let leaf = Tensor::<B, 4>::from_inner(activation.clone()).require_grad();
        let logit = self.model.forward_from_layer(leaf.clone(), self.layer);

        let snapshot = ActivationSnapshot {
            layer: self.layer,
            values: first_item(activation),
        };

        let logit_values = logit.clone().inner();
        self.leaf = Some(leaf);
        self.logit = Some(logit);
        self.activation = Some(snapshot.clone());

        Ok((logit_values, snapshot))
    }

    /// Backpropagate from the logit recorded by the last forward pass.
    ///
    /// Every call builds a fresh gradient container and consumes the recorded
    /// graph; a new forward pass is needed before the next backward pass.
    /// Returns `None` when no gradient reached the bound layer.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::NoForwardPass`] if there is no recorded graph.
    pub fn run_backward_capturing_layer(
        &mut self,
    ) -> Result<Option<GradientSnapshot<B::InnerBackend>>> {
        let (Some(leaf), Some(logit)) = (self.leaf.take(), self.logit.take()) else {
            return Err(ExplainError::NoForwardPass);
        };

        let grads = logit.sum().backward();

        Ok(leaf.grad(&grads).map(|gradient| GradientSnapshot {
            layer: self.layer,
            values: first_item(gradient),
        }))
    }

    /// Release everything captured.
    pub fn detach(self) {}
}
