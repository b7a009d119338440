//! Trait implementations for explained inference.
//!
//! Implements `ExplainableClassifier` for the tumor classifier.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use scan_core::{ExplainableClassifier, LayerId};

use crate::classifier::TumorClassifier;

impl<B: AutodiffBackend> ExplainableClassifier<B> for TumorClassifier<B> {
    fn layers(&self) -> &'static [LayerId] {
        &LayerId::ALL
    }

    fn forward_to_layer(
        &self,
        x: Tensor<B::InnerBackend, 4>,
        layer: LayerId,
    ) -> Tensor<B::InnerBackend, 4> {
        self.valid().forward_until(x, layer)
    }

    fn forward_from_layer(&self, activation: Tensor<B, 4>, layer: LayerId) -> Tensor<B, 2> {
        self.forward_after_inference(activation, layer)
    }
}
