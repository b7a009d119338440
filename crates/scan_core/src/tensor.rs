//! Scan tensor type.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ScanShape;

/// A preprocessed scan ready for the classifier.
///
/// Wraps a Burn tensor and guarantees the shape is exactly `(1, 3, 224, 224)`.
/// Values are expected to be normalized with [`IMAGENET_MEAN`](crate::IMAGENET_MEAN)
/// and [`IMAGENET_STD`](crate::IMAGENET_STD); the wrapper checks shape only.
///
/// # Example
///
/// ```rust,ignore
/// use scan_core::{ScanShape, ScanTensor};
///
/// let tensor = Tensor::<NdArray, 4>::zeros([1, 3, 224, 224], &device);
/// let scan = ScanTensor::new(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct ScanTensor<B: Backend> {
    inner: Tensor<B, 4>,
    shape: ScanShape,
}

impl<B: Backend> ScanTensor<B> {
    /// Create a new ScanTensor from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor shape is not `(1, 3, 224, 224)`.
    pub fn new(tensor: Tensor<B, 4>) -> Result<Self> {
        let shape = ScanShape::from(tensor.dims());
        let expected = ScanShape::input();
        if shape != expected {
            return Err(CoreError::InvalidShape {
                expected: expected.to_string(),
                got: shape.to_string(),
            });
        }
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Create a zero-filled scan (the normalized image would be mean gray).
    pub fn zeros(device: &B::Device) -> Self {
        let shape = ScanShape::input();
        Self {
            inner: Tensor::zeros(shape.as_array(), device),
            shape,
        }
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ScanShape {
        self.shape
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 4> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 4> {
        self.inner
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_scan_tensor_accepts_input_shape() {
        let device = Default::default();
        let tensor = Tensor::<NdArray, 4>::zeros([1, 3, 224, 224], &device);
        let scan = ScanTensor::new(tensor).unwrap();
        assert_eq!(scan.shape(), ScanShape::input());
    }

    #[test]
    fn test_scan_tensor_rejects_grayscale() {
        let device = Default::default();
        let tensor = Tensor::<NdArray, 4>::zeros([1, 1, 224, 224], &device);
        let err = ScanTensor::new(tensor).unwrap_err();
        assert!(matches!(err, CoreError::InvalidShape { .. }));
    }

    #[test]
    fn test_scan_tensor_rejects_wrong_resolution() {
        let device = Default::default();
        let tensor = Tensor::<NdArray, 4>::zeros([1, 3, 256, 256], &device);
        assert!(ScanTensor::new(tensor).is_err());
    }
}
