//! Boundary weights between neighboring voxels.
//!
//! The weight of a neighbor pair falls off as a Gaussian of the intensity
//! difference:
//!
//! ```text
//! w = exp(-(a - b)^2 / (2 sigma^2))
//! ```
//!
//! Similar voxels are expensive to separate, voxels across an edge are cheap.
//! [`DirectionPolicy`] optionally makes the cut orientation-aware by keeping
//! the full weight `1.0` on one of the two arcs.

use crate::{SegmentationError, SegmentationResult};

/// Which intensity transition the cut prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DirectionPolicy {
    /// Same weight in both directions.
    #[default]
    Symmetric,
    /// Cheap to cut where the object is brighter than its surroundings.
    BrightToDark,
    /// Cheap to cut where the object is darker than its surroundings.
    DarkToBright,
}

/// Validated sigma and direction policy.
///
/// # Example
///
/// ```
/// use seg_graphcut::{DirectionPolicy, WeightModel};
///
/// let model = WeightModel::new(10.0, DirectionPolicy::BrightToDark).unwrap();
/// let (forward, reverse) = model.weights(200.0, 50.0);
/// assert_eq!(reverse, 1.0);
/// assert!(forward < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightModel {
    sigma: f64,
    direction: DirectionPolicy,
    inv_two_sigma_sq: f64,
}

impl WeightModel {
    /// Creates a weight model.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::InvalidSigma`] if `sigma` is not a
    /// positive finite number.
    pub fn new(sigma: f64, direction: DirectionPolicy) -> SegmentationResult<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(SegmentationError::InvalidSigma(sigma));
        }
        Ok(Self {
            sigma,
            direction,
            inv_two_sigma_sq: 1.0 / (2.0 * sigma * sigma),
        })
    }

    /// Sigma in intensity units.
    #[must_use]
    pub const fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Direction policy.
    #[must_use]
    pub const fn direction(&self) -> DirectionPolicy {
        self.direction
    }

    /// Undirected Gaussian weight of a pair.
    #[inline]
    #[must_use]
    pub fn similarity(&self, a: f64, b: f64) -> f64 {
        let d = a - b;
        (-d * d * self.inv_two_sigma_sq).exp()
    }

    /// Capacities `(a -> b, b -> a)` for neighbors with intensities `a`, `b`.
    #[inline]
    #[must_use]
    pub fn weights(&self, a: f64, b: f64) -> (f64, f64) {
        let w = self.similarity(a, b);
        match self.direction {
            DirectionPolicy::Symmetric => (w, w),
            DirectionPolicy::BrightToDark => {
                if a > b {
                    (w, 1.0)
                } else {
                    (1.0, w)
                }
            }
            DirectionPolicy::DarkToBright => {
                if a > b {
                    (1.0, w)
                } else {
                    (w, 1.0)
                }
            }
        }
    }
}

/// Capacities `(a -> b, b -> a)` for one neighbor pair.
///
/// Convenience form of [`WeightModel::weights`] that validates sigma on
/// every call.
///
/// # Errors
///
/// Returns [`SegmentationError::InvalidSigma`] for a non-positive or
/// non-finite sigma.
pub fn boundary_weight(
    a: f64,
    b: f64,
    sigma: f64,
    direction: DirectionPolicy,
) -> SegmentationResult<(f64, f64)> {
    Ok(WeightModel::new(sigma, direction)?.weights(a, b))
}
