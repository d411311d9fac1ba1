//! Error types for volume construction and indexing.

use crate::{GridCoord, GridDims};

/// Result type for volume operations.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors that can occur while building or indexing volumes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum VolumeError {
    /// At least one dimension is zero.
    #[error("volume dimensions {dims} contain a zero extent")]
    EmptyDimensions {
        /// The offending dimensions.
        dims: GridDims,
    },

    /// The voxel count does not fit the `u32` node id space.
    #[error("volume {dims} has more voxels than a u32 node id can address")]
    TooLarge {
        /// The offending dimensions.
        dims: GridDims,
    },

    /// The sample buffer length does not match the dimensions.
    #[error("buffer holds {actual} samples, dimensions require {expected}")]
    SizeMismatch {
        /// Voxel count implied by the dimensions.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// A coordinate lies outside the grid.
    #[error("coordinate {coord:?} is outside {dims}")]
    OutOfBounds {
        /// The coordinate that was out of bounds.
        coord: GridCoord,
        /// Grid dimensions.
        dims: GridDims,
    },
}

impl VolumeError {
    /// Returns true if this error concerns the shape of the volume rather than
    /// a single access.
    #[must_use]
    pub const fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyDimensions { .. } | Self::TooLarge { .. } | Self::SizeMismatch { .. }
        )
    }
}
