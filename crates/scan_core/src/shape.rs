//! Scan tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::{INPUT_CHANNELS, INPUT_SIZE};

/// Shape metadata for image tensors.
///
/// Follows the convention `(B, C, H, W)`:
/// - `B`: Batch size
/// - `C`: Channels
/// - `H`: Height
/// - `W`: Width
///
/// # Example
///
/// ```rust
/// use scan_core::ScanShape;
///
/// let shape = ScanShape::new(1, 3, 224, 224);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.numel(), 3 * 224 * 224);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanShape {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ScanShape {
    /// Create a new ScanShape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// The single-image input shape the classifier expects: `(1, 3, 224, 224)`.
    #[must_use]
    pub const fn input() -> Self {
        Self::new(1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE)
    }

    /// Create a ScanShape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 4 elements.
    ///
    /// # Example
    ///
    /// ```rust
    /// use scan_core::ScanShape;
    ///
    /// let shape = ScanShape::from_dims(&[1, 512, 7, 7]).unwrap();
    /// assert_eq!(shape.channels(), 512);
    /// ```
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 4 {
            return Err(CoreError::DimensionError {
                expected: 4,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2], dims[3]))
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Check if this is an empty shape (any dimension is zero).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }
}

impl From<[usize; 4]> for ScanShape {
    fn from(dims: [usize; 4]) -> Self {
        Self::new(dims[0], dims[1], dims[2], dims[3])
    }
}

impl std::fmt::Display for ScanShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.channels, self.height, self.width
        )
    }
}
