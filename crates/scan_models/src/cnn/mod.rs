//! Convolutional building blocks of the classifier.

mod norm;
mod resnet;

pub use norm::FrozenBatchNorm;
pub use resnet::{BasicBlock, Downsample, ResNetBackbone};
