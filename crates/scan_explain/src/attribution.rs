//! Grad-CAM attention maps.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, ArrayView2};
use scan_core::{ExplainableClassifier, LayerId, ScanTensor, INPUT_SIZE};

use crate::activation::LayerCapture;
use crate::error::{ExplainError, Result};

/// Compute the rectified Grad-CAM map for one item.
///
/// # Arguments
///
/// * `activations` - Activations of the target layer (channels, height, width)
/// * `gradients` - Gradients w.r.t. those activations, same shape
///
/// # Returns
///
/// Map of shape (height, width), all values non-negative.
pub fn grad_cam<B: Backend>(activations: Tensor<B, 3>, gradients: Tensor<B, 3>) -> Result<Tensor<B, 2>> {
    if activations.dims() != gradients.dims() {
        return Err(ExplainError::ShapeMismatch {
            activations: activations.dims(),
            gradients: gradients.dims(),
        });
    }
    let [_, height, width] = activations.dims();

    // Spatial mean of the gradients: (channels, height, width) -> (channels, 1, 1)
    let weights = gradients.mean_dim(2).mean_dim(1);

    // Weighted sum over channels: (channels, height, width) -> (1, height, width)
    let cam = (activations * weights).sum_dim(0);

    Ok(cam.reshape([height, width]).clamp_min(0.0))
}

/// Source index pair and fractional weight for one output position.
fn taps(input: usize, output: usize) -> Vec<(usize, usize, f32)> {
    let scale = input as f32 / output as f32;
    let last = input.saturating_sub(1);

    (0..output)
        .map(|dst| {
            let src = (dst as f32 + 0.5) * scale - 0.5;
            if src <= 0.0 {
                (0, 0, 0.0)
            } else if src >= last as f32 {
                (last, last, 0.0)
            } else {
                let low = src.floor() as usize;
                (low, low + 1, src - low as f32)
            }
        })
        .collect()
}

/// Bilinear resize with half-pixel centers and clamped edges.
///
/// Matches the usual image-library convention: output pixel `d` samples the
/// source at `(d + 0.5) * in / out - 0.5`.
pub fn resize_bilinear(src: ArrayView2<'_, f32>, size: [usize; 2]) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    let [out_h, out_w] = size;
    if in_h == 0 || in_w == 0 {
        return Array2::zeros((out_h, out_w));
    }

    let rows = taps(in_h, out_h);
    let cols = taps(in_w, out_w);

    Array2::from_shape_fn((out_h, out_w), |(i, j)| {
        let (y0, y1, fy) = rows[i];
        let (x0, x1, fx) = cols[j];
        let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
        let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Attention map over the input image, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionMap {
    values: Array2<f32>,
}

impl AttentionMap {
    /// Resize a rectified map to `size`, then scale it so the maximum is 1.
    ///
    /// A map whose maximum is zero stays all zero.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::NonFinite`] if the map holds NaN or infinity.
    pub fn from_rectified<B: Backend>(raw: Tensor<B, 2>, size: [usize; 2]) -> Result<Self> {
        let [height, width] = raw.dims();
        let data = raw
            .into_data()
            .to_vec::<f32>()
            .map_err(|_| ExplainError::NonFinite("attention map data"))?;
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ExplainError::NonFinite("attention map"));
        }

        let raw = Array2::from_shape_vec((height, width), data)
            .map_err(|_| ExplainError::NonFinite("attention map layout"))?;
        let mut values = resize_bilinear(raw.view(), size);

        let max = values.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            values.mapv_inplace(|v| (v / max).clamp(0.0, 1.0));
        } else {
            values.fill(0.0);
        }

        Ok(Self { values })
    }

    /// All-zero map, used when no gradient reached the target layer.
    pub fn zeros(size: [usize; 2]) -> Self {
        Self {
            values: Array2::zeros((size[0], size[1])),
        }
    }

    /// True if the map carries no attention at all.
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Map values indexed `[row, column]`.
    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    /// Consume the map and return its values.
    pub fn into_values(self) -> Array2<f32> {
        self.values
    }

    /// Map size as `[height, width]`.
    pub fn size(&self) -> [usize; 2] {
        let (height, width) = self.values.dim();
        [height, width]
    }

    /// Largest value in the map (0 or 1).
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }
}

/// Prediction and attention map for one scan.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Raw classifier logit.
    pub logit: f32,
    /// Layer the map was computed at.
    pub layer: LayerId,
    /// Attention map at input resolution.
    pub map: AttentionMap,
}

impl Explanation {
    /// True if no attention reached the input.
    pub fn is_degenerate(&self) -> bool {
        self.map.is_degenerate()
    }
}

/// Gradient-weighted class activation mapping at a single layer.
///
/// The gradient is taken from the classifier's single logit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradCam {
    /// Layer to explain.
    pub layer: LayerId,
    /// Output map size as `[height, width]`.
    pub output_size: [usize; 2],
}

impl Default for GradCam {
    fn default() -> Self {
        Self {
            layer: LayerId::DEFAULT_TARGET,
            output_size: [INPUT_SIZE, INPUT_SIZE],
        }
    }
}

impl GradCam {
    /// Explain at `layer`, producing a map at input resolution.
    #[must_use]
    pub fn new(layer: LayerId) -> Self {
        Self {
            layer,
            ..Default::default()
        }
    }

    /// Set the output map size.
    #[must_use]
    pub fn with_output_size(mut self, output_size: [usize; 2]) -> Self {
        self.output_size = output_size;
        self
    }

    /// Classify `input` and compute its attention map.
    ///
    /// If no gradient reaches the target layer the map is all zero; see
    /// [`Explanation::is_degenerate`].
    pub fn explain<B, M>(&self, model: &M, input: ScanTensor<B::InnerBackend>) -> Result<Explanation>
    where
        B: AutodiffBackend,
        M: ExplainableClassifier<B>,
    {
        let mut capture = LayerCapture::attach(model, self.layer)?;
        let (logit, activation) = capture.run_forward_capturing_layer(input.into_inner())?;
        let logit: f32 = logit.into_scalar().elem();
        let gradient = capture.run_backward_capturing_layer()?;
        capture.detach();

        let map = match gradient {
            Some(gradient) => {
                let raw = grad_cam(activation.values, gradient.values)?;
                AttentionMap::from_rectified(raw, self.output_size)?
            }
            None => {
                tracing::debug!("No gradient reached {}", self.layer);
                AttentionMap::zeros(self.output_size)
            }
        };

        Ok(Explanation {
            logit,
            layer: self.layer,
            map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::Param;
    use scan_core::backend::{Autodiff, NdArray};
    use scan_models::ClassifierConfig;

    type TestBackend = Autodiff<NdArray>;

    /// Activation of shape (1, 2, 8, 8) cut from the top-left of the input.
    fn fixed_activation<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
        x.slice([0..1, 0..2, 0..8, 0..8]).clamp_min(0.0)
    }

    /// Logit is the weighted sum of the activation.
    #[derive(Module, Debug)]
    struct LinearProbe<B: Backend> {
        weight: Param<Tensor<B, 1>>,
    }

    /// Logit does not depend on the activation at all.
    #[derive(Module, Debug)]
    struct Detached<B: Backend> {
        weight: Param<Tensor<B, 1>>,
    }

    /// Logit depends on the activation with zero gradient.
    #[derive(Module, Debug)]
    struct ZeroGradient<B: Backend> {
        weight: Param<Tensor<B, 1>>,
    }

    fn stub_weight<B: Backend>() -> Param<Tensor<B, 1>> {
        Param::from_tensor(Tensor::ones([1], &Default::default()))
    }

    impl<B: AutodiffBackend> ExplainableClassifier<B> for LinearProbe<B> {
        fn layers(&self) -> &'static [LayerId] {
            &[LayerId::Layer4]
        }

        fn forward_to_layer(&self, x: Tensor<B::InnerBackend, 4>, _: LayerId) -> Tensor<B::InnerBackend, 4> {
            fixed_activation(x)
        }

        fn forward_from_layer(&self, activation: Tensor<B, 4>, _: LayerId) -> Tensor<B, 2> {
            (activation.sum() * self.weight.val().sum()).reshape([1, 1])
        }
    }

    impl<B: AutodiffBackend> ExplainableClassifier<B> for Detached<B> {
        fn layers(&self) -> &'static [LayerId] {
            &[LayerId::Layer4]
        }

        fn forward_to_layer(&self, x: Tensor<B::InnerBackend, 4>, _: LayerId) -> Tensor<B::InnerBackend, 4> {
            fixed_activation(x)
        }

        fn forward_from_layer(&self, activation: Tensor<B, 4>, _: LayerId) -> Tensor<B, 2> {
            let constant = Tensor::<B, 1>::ones([1], &activation.device()).require_grad();
            (constant * 2.0).reshape([1, 1])
        }
    }

    impl<B: AutodiffBackend> ExplainableClassifier<B> for ZeroGradient<B> {
        fn layers(&self) -> &'static [LayerId] {
            &[LayerId::Layer4]
        }

        fn forward_to_layer(&self, x: Tensor<B::InnerBackend, 4>, _: LayerId) -> Tensor<B::InnerBackend, 4> {
            fixed_activation(x)
        }

        fn forward_from_layer(&self, activation: Tensor<B, 4>, _: LayerId) -> Tensor<B, 2> {
            (activation.sum() * 0.0).reshape([1, 1])
        }
    }

    /// Input with a bright 2x2 patch in the top-left corner.
    fn patch_input() -> ScanTensor<NdArray> {
        let device = Default::default();
        let mut data = vec![0.0f32; 3 * 224 * 224];
        for c in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    data[c * 224 * 224 + y * 224 + x] = 1.0;
                }
            }
        }
        let tensor = Tensor::<NdArray, 4>::from_data(TensorData::new(data, [1, 3, 224, 224]), &device);
        ScanTensor::new(tensor).unwrap()
    }

    #[test]
    fn test_grad_cam_weights_by_mean_gradient() {
        let device = Default::default();
        // Two channels of 1x2; gradients average to +1 and -1.
        let activations = Tensor::<NdArray, 1>::from_floats([1.0, 2.0, 3.0, 0.5], &device).reshape([2, 1, 2]);
        let gradients = Tensor::<NdArray, 1>::from_floats([0.5, 1.5, -1.0, -1.0], &device).reshape([2, 1, 2]);

        let cam = grad_cam(activations, gradients).unwrap();
        let values = cam.into_data().to_vec::<f32>().unwrap();

        // [1 - 3, 2 - 0.5] rectified
        assert_eq!(values, vec![0.0, 1.5]);
    }

    #[test]
    fn test_grad_cam_shape_mismatch() {
        let device = Default::default();
        let activations = Tensor::<NdArray, 3>::zeros([4, 7, 7], &device);
        let gradients = Tensor::<NdArray, 3>::zeros([4, 14, 14], &device);

        let err = grad_cam(activations, gradients).unwrap_err();
        assert!(matches!(err, ExplainError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_resize_bilinear_half_pixel() {
        let src = Array2::from_shape_vec((2, 2), vec![0.0f32, 1.0, 2.0, 3.0]).unwrap();

        let out = resize_bilinear(src.view(), [4, 4]);

        let first_row: Vec<f32> = out.row(0).to_vec();
        assert_eq!(first_row, vec![0.0, 0.25, 0.75, 1.0]);
        assert_eq!(out[[3, 3]], 3.0);
        assert_eq!(out[[3, 0]], 2.0);
    }

    #[test]
    fn test_resize_constant_stays_constant() {
        let src = Array2::from_elem((7, 7), 0.4f32);
        let out = resize_bilinear(src.view(), [224, 224]);
        assert!(out.iter().all(|v| (v - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_attention_map_normalized() {
        let device = Default::default();
        let raw = Tensor::<NdArray, 1>::from_floats([0.0, 2.0, 4.0, 1.0], &device).reshape([2, 2]);

        let map = AttentionMap::from_rectified(raw, [8, 8]).unwrap();

        assert_eq!(map.size(), [8, 8]);
        assert_eq!(map.max(), 1.0);
        assert!(map.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(!map.is_degenerate());
    }

    #[test]
    fn test_attention_map_zero_stays_zero() {
        let device = Default::default();
        let raw = Tensor::<NdArray, 2>::zeros([7, 7], &device);

        let map = AttentionMap::from_rectified(raw, [224, 224]).unwrap();

        assert!(map.is_degenerate());
        assert_eq!(map, AttentionMap::zeros([224, 224]));
    }

    #[test]
    fn test_attention_map_rejects_nan() {
        let device = Default::default();
        let raw = Tensor::<NdArray, 1>::from_floats([0.0, f32::NAN], &device).reshape([1, 2]);

        let err = AttentionMap::from_rectified(raw, [4, 4]).unwrap_err();
        assert!(matches!(err, ExplainError::NonFinite(_)));
    }

    #[test]
    fn test_explain_linear_probe_highlights_patch() {
        let model = LinearProbe::<TestBackend> { weight: stub_weight() };

        let explanation = GradCam::default().explain::<TestBackend, _>(&model, patch_input()).unwrap();

        // 2 channels x 4 bright pixels
        assert!((explanation.logit - 8.0).abs() < 1e-5);
        assert_eq!(explanation.map.size(), [224, 224]);
        assert_eq!(explanation.map.max(), 1.0);
        assert_eq!(explanation.map.values()[[0, 0]], 1.0);
        assert_eq!(explanation.map.values()[[223, 223]], 0.0);
    }

    #[test]
    fn test_explain_detached_logit_is_degenerate() {
        let model = Detached::<TestBackend> { weight: stub_weight() };

        let explanation = GradCam::default().explain::<TestBackend, _>(&model, patch_input()).unwrap();

        assert!(explanation.is_degenerate());
        assert_eq!(explanation.map.size(), [224, 224]);
        assert!((explanation.logit - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_explain_zero_gradient_is_degenerate() {
        let model = ZeroGradient::<TestBackend> { weight: stub_weight() };

        let explanation = GradCam::default().explain::<TestBackend, _>(&model, patch_input()).unwrap();

        assert!(explanation.is_degenerate());
        assert!(explanation.map.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_explain_unknown_layer() {
        let model = LinearProbe::<TestBackend> { weight: stub_weight() };

        let err = GradCam::new(LayerId::Layer2).explain::<TestBackend, _>(&model, patch_input()).unwrap_err();
        assert!(matches!(err, ExplainError::UnknownLayer(LayerId::Layer2)));
    }

    #[test]
    fn test_explain_classifier_map_in_range() {
        let device = Default::default();
        let model = ClassifierConfig::new(4)
            .with_hidden(vec![8])
            .frozen()
            .init::<TestBackend>(&device);

        let explanation = GradCam::new(LayerId::Layer4)
            .explain::<TestBackend, _>(&model, ScanTensor::<NdArray>::zeros(&device))
            .unwrap();

        assert!(explanation.logit.is_finite());
        assert_eq!(explanation.layer, LayerId::Layer4);
        let max = explanation.map.max();
        assert!(max == 0.0 || max == 1.0);
        assert!(explanation.map.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
