//! Batch normalization with frozen statistics.

use burn::module::Param;
use burn::prelude::*;

/// Batch normalization that always uses its running statistics.
///
/// Burn's `BatchNorm` switches to batch statistics whenever the backend tracks
/// gradients. Explanations backpropagate through the classifier at inference
/// time, so the backbone uses this frozen variant instead: the affine transform
/// is identical on every backend.
///
/// Field names match torch `BatchNorm2d` state dict keys.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    weight: Param<Tensor<B, 1>>,
    bias: Param<Tensor<B, 1>>,
    running_mean: Param<Tensor<B, 1>>,
    running_var: Param<Tensor<B, 1>>,
    epsilon: f64,
}

impl<B: Backend> FrozenBatchNorm<B> {
    /// Create an identity normalization for `channels` channels.
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            weight: Param::from_tensor(Tensor::ones([channels], device)),
            bias: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var: Param::from_tensor(Tensor::ones([channels], device)),
            epsilon: 1e-5,
        }
    }

    /// Number of normalized channels.
    pub fn channels(&self) -> usize {
        self.weight.val().dims()[0]
    }

    /// Forward pass over `(batch, channels, height, width)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();
        let std = self.running_var.val().add_scalar(self.epsilon).sqrt();
        let scale = self.weight.val() / std;
        let shift = self.bias.val() - self.running_mean.val() * scale.clone();

        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}
