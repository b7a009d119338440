//! ResNet-18 backbone for 224x224 scans.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{MaxPool2d, MaxPool2dConfig},
    PaddingConfig2d, Relu,
};
use burn::prelude::*;
use scan_core::LayerId;

use super::norm::FrozenBatchNorm;

/// Projection shortcut used when a block changes width or stride.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .init(device);
        let bn = FrozenBatchNorm::new(out_channels, device);
        Self { conv, bn }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Residual block with two 3x3 convolutions and skip connection.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm<B>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    /// Create a new residual block.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn1 = FrozenBatchNorm::new(out_channels, device);

        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn2 = FrozenBatchNorm::new(out_channels, device);

        // Shortcut connection if dimensions differ
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample::new(in_channels, out_channels, stride, device))
        } else {
            None
        };

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let relu = Relu::new();

        let out = self.conv1.forward(x.clone());
        let out = self.bn1.forward(out);
        let out = relu.forward(out);

        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(x),
            None => x,
        };

        relu.forward(out + shortcut)
    }
}

/// ResNet-18 feature extractor: stem plus four residual stages.
///
/// Field names follow torchvision so that checkpoints map one to one.
#[derive(Module, Debug)]
pub struct ResNetBackbone<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm<B>,
    maxpool: MaxPool2d,
    layer1: Vec<BasicBlock<B>>,
    layer2: Vec<BasicBlock<B>>,
    layer3: Vec<BasicBlock<B>>,
    layer4: Vec<BasicBlock<B>>,
}

impl<B: Backend> ResNetBackbone<B> {
    /// Create a ResNet-18 backbone whose first stage has `base_width` channels.
    ///
    /// Stage widths are `w, 2w, 4w, 8w`; `base_width = 64` is the standard network.
    pub fn new(base_width: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([3, base_width], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn1 = FrozenBatchNorm::new(base_width, device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let stage = |in_channels: usize, out_channels: usize, stride: usize| {
            vec![
                BasicBlock::new(in_channels, out_channels, stride, device),
                BasicBlock::new(out_channels, out_channels, 1, device),
            ]
        };

        Self {
            conv1,
            bn1,
            maxpool,
            layer1: stage(base_width, base_width, 1),
            layer2: stage(base_width, base_width * 2, 2),
            layer3: stage(base_width * 2, base_width * 4, 2),
            layer4: stage(base_width * 4, base_width * 8, 2),
        }
    }

    /// Number of channels produced by the last stage.
    pub fn out_channels(&self) -> usize {
        self.layer4
            .last()
            .map(|block| block.bn2.channels())
            .unwrap_or_default()
    }

    fn stem(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(x);
        let out = self.bn1.forward(out);
        let out = Relu::new().forward(out);
        self.maxpool.forward(out)
    }

    fn stage(&self, layer: LayerId) -> &[BasicBlock<B>] {
        match layer {
            LayerId::Stem => &[],
            LayerId::Layer1 => &self.layer1,
            LayerId::Layer2 => &self.layer2,
            LayerId::Layer3 => &self.layer3,
            LayerId::Layer4 => &self.layer4,
        }
    }

    fn run_stages(&self, mut x: Tensor<B, 4>, layers: impl Iterator<Item = LayerId>) -> Tensor<B, 4> {
        for layer in layers {
            for block in self.stage(layer) {
                x = block.forward(x);
            }
        }
        x
    }

    /// Forward pass up to and including `layer`.
    pub fn forward_until(&self, x: Tensor<B, 4>, layer: LayerId) -> Tensor<B, 4> {
        let x = self.stem(x);
        let stages = LayerId::ALL
            .into_iter()
            .filter(|id| *id != LayerId::Stem && id.depth() <= layer.depth());
        self.run_stages(x, stages)
    }

    /// Forward pass of the stages after `layer`.
    pub fn forward_after(&self, x: Tensor<B, 4>, layer: LayerId) -> Tensor<B, 4> {
        let stages = LayerId::ALL
            .into_iter()
            .filter(|id| id.depth() > layer.depth());
        self.run_stages(x, stages)
    }

    /// Full forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_until(x, LayerId::Layer4)
    }
}
