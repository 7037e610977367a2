//! Image tensor types.

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::ImageShape;

/// An image tensor wrapper with shape metadata.
///
/// Wraps a 4D Burn tensor following the `(B, C, H, W)` convention. Used for
/// the model input, its gradient, and per-layer output gradients.
///
/// ```rust,ignore
/// use fullgrad_core::ImageTensor;
///
/// let tensor = Tensor::<NdArray, 4>::zeros([1, 3, 224, 224], &device);
/// let image = ImageTensor::new(tensor)?;
/// let first = image.item(0)?; // (3, 224, 224)
/// ```
#[derive(Debug, Clone)]
pub struct ImageTensor<B: Backend> {
    inner: Tensor<B, 4>,
    shape: ImageShape,
}

impl<B: Backend> ImageTensor<B> {
    /// Create a new ImageTensor from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero.
    pub fn new(tensor: Tensor<B, 4>) -> Result<Self> {
        let shape = ImageShape::from(tensor.dims());
        if shape.is_empty() {
            return Err(CoreError::InvalidShape {
                expected: "non-empty (B, C, H, W)".to_string(),
                got: shape.to_string(),
            });
        }
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Create an ImageTensor filled with zeros.
    pub fn zeros(shape: ImageShape, device: &B::Device) -> Self {
        Self {
            inner: Tensor::zeros(shape.as_array(), device),
            shape,
        }
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.shape.batch()
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.shape.channels()
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

    /// Select a single batch item as a `(C, H, W)` tensor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ItemOutOfBounds`] if `index >= batch`.
    pub fn item(&self, index: usize) -> Result<Tensor<B, 3>> {
        let [batch, channels, height, width] = self.shape.as_array();
        if index >= batch {
            return Err(CoreError::ItemOutOfBounds { index, batch });
        }
        Ok(self
            .inner
            .clone()
            .slice([index..index + 1, 0..channels, 0..height, 0..width])
            .reshape([channels, height, width]))
    }

    /// Check that `other` has the same shape, e.g. an image and its gradient.
    pub fn ensure_same_shape(&self, other: &Self) -> Result<()> {
        if self.shape != other.shape {
            return Err(CoreError::ShapeMismatch(format!(
                "{} != {}",
                self.shape, other.shape
            )));
        }
        Ok(())
    }
}
