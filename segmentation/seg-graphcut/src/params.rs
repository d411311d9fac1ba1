//! Parameters for graph-cut segmentation.

use seg_maxflow::SolverKind;
use seg_types::Label;

use crate::noise::NoiseConvention;
use crate::region::RegionTerm;
use crate::weight::DirectionPolicy;
use crate::{SegmentationError, SegmentationResult};

/// Where the boundary spread comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sigma {
    /// A caller-supplied value.
    Fixed(f64),
    /// Estimated from the volume by the noise estimator.
    Auto,
}

impl Default for Sigma {
    fn default() -> Self {
        Self::Fixed(50.0)
    }
}

/// Parameters for graph-cut segmentation.
///
/// # Example
///
/// ```
/// use seg_graphcut::{DirectionPolicy, GraphCutParams, RegionTerm, Sigma};
/// use seg_maxflow::SolverKind;
///
/// let params = GraphCutParams::default()
///     .with_sigma(Sigma::Fixed(10.0))
///     .with_direction(DirectionPolicy::BrightToDark)
///     .with_region(RegionTerm::histogram())
///     .with_solver(SolverKind::Grid);
/// assert!(params.validate().is_ok());
/// assert_eq!(params.foreground_value, 255);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphCutParams {
    /// Boundary spread.
    pub sigma: Sigma,

    /// Orientation preference of the boundary term.
    pub direction: DirectionPolicy,

    /// Weight of the region term relative to the boundary term.
    pub lambda: f64,

    /// Optional region (data) term.
    pub region: RegionTerm,

    /// Averaging used when `sigma` is [`Sigma::Auto`].
    pub noise: NoiseConvention,

    /// Max-flow backend.
    pub solver: SolverKind,

    /// Label written for foreground voxels.
    pub foreground_value: Label,

    /// Label written for background voxels.
    pub background_value: Label,
}

impl Default for GraphCutParams {
    fn default() -> Self {
        Self {
            sigma: Sigma::default(),
            direction: DirectionPolicy::Symmetric,
            lambda: 1.0,
            region: RegionTerm::None,
            noise: NoiseConvention::SignedMean,
            solver: SolverKind::Adjacency,
            foreground_value: 255,
            background_value: 0,
        }
    }
}

impl GraphCutParams {
    /// Sets the boundary spread.
    #[must_use]
    pub const fn with_sigma(mut self, sigma: Sigma) -> Self {
        self.sigma = sigma;
        self
    }

    /// Sets the direction policy.
    #[must_use]
    pub const fn with_direction(mut self, direction: DirectionPolicy) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the region weight.
    #[must_use]
    pub const fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Sets the region term.
    #[must_use]
    pub const fn with_region(mut self, region: RegionTerm) -> Self {
        self.region = region;
        self
    }

    /// Sets the noise convention for [`Sigma::Auto`].
    #[must_use]
    pub const fn with_noise(mut self, noise: NoiseConvention) -> Self {
        self.noise = noise;
        self
    }

    /// Sets the max-flow backend.
    #[must_use]
    pub const fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Sets the output label values.
    #[must_use]
    pub const fn with_labels(mut self, foreground: Label, background: Label) -> Self {
        self.foreground_value = foreground;
        self.background_value = background;
        self
    }

    /// Checks every parameter that does not depend on the volume.
    ///
    /// # Errors
    ///
    /// [`SegmentationError::InvalidSigma`] for a fixed sigma that is not
    /// positive and finite, [`SegmentationError::InvalidParams`] for a
    /// negative or non-finite lambda and for a bad region term.
    pub fn validate(&self) -> SegmentationResult<()> {
        if let Sigma::Fixed(sigma) = self.sigma {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(SegmentationError::InvalidSigma(sigma));
            }
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(SegmentationError::invalid_params(format!(
                "lambda must be finite and non-negative, got {}",
                self.lambda
            )));
        }
        self.region.validate()
    }
}
