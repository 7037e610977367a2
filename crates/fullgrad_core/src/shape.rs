//! Image shape metadata.

use serde::{Deserialize, Serialize};

/// Shape metadata for image tensors.
///
/// Follows the convention `(B, C, H, W)`:
/// - `B`: Batch size (number of images)
/// - `C`: Channels
/// - `H`: Height
/// - `W`: Width
///
/// # Example
///
/// ```rust
/// use fullgrad_core::ImageShape;
///
/// let shape = ImageShape::new(1, 3, 224, 224);
/// assert_eq!(shape.batch(), 1);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.spatial(), [224, 224]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new ImageShape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
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

    /// Spatial size as `[H, W]`.
    #[must_use]
    pub const fn spatial(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Check if this is an empty shape (any dimension is zero).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(B={}, C={}, H={}, W={})",
            self.batch, self.channels, self.height, self.width
        )
    }
}

impl From<[usize; 4]> for ImageShape {
    fn from([batch, channels, height, width]: [usize; 4]) -> Self {
        Self::new(batch, channels, height, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_from_tensor_dims() {
        let shape = ImageShape::from([2, 64, 56, 56]);
        assert_eq!(shape.channels(), 64);
        assert_eq!(shape.spatial(), [56, 56]);
        assert_eq!(shape.as_array(), [2, 64, 56, 56]);
    }

    #[test]
    fn test_shape_is_empty() {
        assert!(!ImageShape::new(1, 3, 8, 8).is_empty());
        assert!(ImageShape::new(0, 3, 8, 8).is_empty());
        assert!(ImageShape::new(1, 3, 0, 8).is_empty());
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(ImageShape::new(1, 3, 4, 5).to_string(), "(B=1, C=3, H=4, W=5)");
    }

    #[test]
    fn test_shape_serialization() {
        let shape = ImageShape::new(1, 3, 224, 224);
        let json = serde_json::to_string(&shape).unwrap();
        let restored: ImageShape = serde_json::from_str(&json).unwrap();
        assert_eq!(shape, restored);
    }
}
