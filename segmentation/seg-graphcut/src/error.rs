//! Error types for segmentation.

use seg_maxflow::FlowError;
use seg_types::{GridDims, NodeId, SeedClass, VolumeError};

/// Result type for segmentation operations.
pub type SegmentationResult<T> = Result<T, SegmentationError>;

/// Which input a dimension check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskInput {
    /// The foreground seed mask.
    Foreground,
    /// The background seed mask.
    Background,
}

impl std::fmt::Display for MaskInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Foreground => f.write_str("foreground mask"),
            Self::Background => f.write_str("background mask"),
        }
    }
}

/// Errors that can occur during segmentation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SegmentationError {
    /// A seed set has no voxels.
    #[error("{0:?} seed set is empty")]
    EmptySeedSet(SeedClass),

    /// A mask does not match the volume shape.
    #[error("{input} has dimensions {actual}, volume has {expected}")]
    DimensionMismatch {
        /// Which mask was wrong.
        input: MaskInput,
        /// Volume dimensions.
        expected: GridDims,
        /// Mask dimensions.
        actual: GridDims,
    },

    /// Sigma is zero, negative or not finite.
    #[error("sigma must be positive and finite, got {0}")]
    InvalidSigma(f64),

    /// Some voxels are seeded as both foreground and background.
    #[error("{count} voxels are seeded as both classes (first: {first})")]
    ConflictingSeeds {
        /// Number of conflicting voxels.
        count: usize,
        /// Lowest conflicting node id.
        first: NodeId,
    },

    /// A seed id lies outside the volume.
    #[error("seed {node} is outside a volume of {node_count} voxels")]
    SeedOutOfRange {
        /// The offending seed.
        node: NodeId,
        /// Voxel count of the volume.
        node_count: usize,
    },

    /// The infinite terminal capacity does not dominate the finite ones.
    #[error("largest incident capacity {max_incident} leaves no safety margin below the sentinel")]
    SentinelTooSmall {
        /// Largest per-node sum of finite capacities.
        max_incident: f64,
    },

    /// Noise estimation produced no usable sigma.
    #[error("noise estimate {estimate:?} cannot be used as sigma")]
    DegenerateNoiseEstimate {
        /// The raw estimate, `None` when there were no neighbor pairs.
        estimate: Option<f64>,
    },

    /// A parameter is out of range.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The max-flow backend failed.
    #[error("max-flow error: {0}")]
    Flow(#[from] FlowError),

    /// Volume construction or indexing failed.
    #[error("volume error: {0}")]
    Volume(#[from] VolumeError),
}

impl SegmentationError {
    /// Creates an invalid-parameters error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Returns true for misuse of the graph lifecycle (mutation after solve,
    /// double solve, query before solve).
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        match self {
            Self::Flow(err) => err.is_invariant_violation(),
            _ => false,
        }
    }

    /// Returns true if the error was caused by the caller's input rather than
    /// a solver failure.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptySeedSet(_)
                | Self::DimensionMismatch { .. }
                | Self::InvalidSigma(_)
                | Self::ConflictingSeeds { .. }
                | Self::SeedOutOfRange { .. }
                | Self::InvalidParams(_)
                | Self::DegenerateNoiseEstimate { .. }
                | Self::Volume(_)
                | Self::Flow(FlowError::Grid(_))
        )
    }

    /// Returns true if solving was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Flow(FlowError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SegmentationError::EmptySeedSet(SeedClass::Background);
        assert_eq!(err.to_string(), "Background seed set is empty");

        let err = SegmentationError::DimensionMismatch {
            input: MaskInput::Foreground,
            expected: GridDims::new(4, 4, 4),
            actual: GridDims::new(4, 4, 3),
        };
        assert_eq!(
            err.to_string(),
            "foreground mask has dimensions 4x4x3, volume has 4x4x4"
        );
    }

    #[test]
    fn test_predicates() {
        let err: SegmentationError = FlowError::AlreadySolved.into();
        assert!(err.is_invariant_violation());
        assert!(!err.is_input_error());

        let err: SegmentationError = FlowError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_invariant_violation());

        assert!(SegmentationError::InvalidSigma(0.0).is_input_error());
        assert!(SegmentationError::invalid_params("lambda").is_input_error());

        let dims = GridDims::new(0, 1, 1);
        let err: SegmentationError = FlowError::from(VolumeError::EmptyDimensions { dims }).into();
        assert!(err.is_input_error());
        assert!(!err.is_invariant_violation());
    }
}
