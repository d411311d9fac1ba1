//! Boundary spread estimation from neighbor differences.
//!
//! The estimate averages `center - neighbor` over every forward neighbor
//! pair, the same pairs the graph builder links. With
//! [`NoiseConvention::SignedMean`] positive and negative steps cancel, so a
//! volume with symmetric noise can estimate near zero; the pipeline rejects
//! such estimates instead of building a graph from them.

use rayon::prelude::*;
use seg_types::{Intensity, Volume};
use tracing::{debug, warn};

/// How neighbor differences are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoiseConvention {
    /// Mean of the signed differences `center - neighbor`.
    #[default]
    SignedMean,
    /// Mean of the absolute differences.
    AbsoluteMean,
}

/// Estimates sigma from a volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseEstimator {
    convention: NoiseConvention,
}

impl NoiseEstimator {
    /// Creates an estimator.
    #[must_use]
    pub const fn new(convention: NoiseConvention) -> Self {
        Self { convention }
    }

    /// The averaging convention.
    #[must_use]
    pub const fn convention(&self) -> NoiseConvention {
        self.convention
    }

    /// Mean neighbor difference, or `None` if the volume has no neighbor
    /// pairs (a single voxel).
    ///
    /// Slices are summed in parallel and combined in slice order, so the
    /// result does not depend on the thread count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate<T: Intensity>(&self, volume: &Volume<T>) -> Option<f64> {
        let dims = volume.dims();
        let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
        let slice = dims.slice_len();
        let samples = volume.as_slice();
        let absolute = self.convention == NoiseConvention::AbsoluteMean;

        let partials: Vec<(f64, usize)> = (0..nz)
            .into_par_iter()
            .map(|z| {
                let mut sum = 0.0;
                let mut pairs = 0usize;
                let base = z * slice;
                for y in 0..ny {
                    for x in 0..nx {
                        let i = base + y * nx + x;
                        let center = samples[i].to_f64();
                        let mut add = |j: usize| {
                            let d = center - samples[j].to_f64();
                            sum += if absolute { d.abs() } else { d };
                            pairs += 1;
                        };
                        if x + 1 < nx {
                            add(i + 1);
                        }
                        if y + 1 < ny {
                            add(i + nx);
                        }
                        if z + 1 < nz {
                            add(i + slice);
                        }
                    }
                }
                (sum, pairs)
            })
            .collect();

        let (sum, pairs) = partials
            .iter()
            .fold((0.0, 0usize), |(s, n), &(ps, pn)| (s + ps, n + pn));
        if pairs == 0 {
            warn!(dims = %dims, "no neighbor pairs for noise estimation");
            return None;
        }
        let estimate = sum / pairs as f64;
        debug!(
            convention = ?self.convention,
            pairs,
            estimate,
            "estimated boundary sigma"
        );
        Some(estimate)
    }
}

/// Signed-mean sigma estimate of a volume.
///
/// # Example
///
/// ```
/// use seg_graphcut::estimate_sigma;
/// use seg_types::{GridDims, Volume};
///
/// // Intensity drops by 2 along x: every x pair differs by +2, y/z pairs by 0.
/// let volume = Volume::from_fn(GridDims::new(3, 1, 1), |c| 10 - 2 * c.x as i32).unwrap();
/// assert_eq!(estimate_sigma(&volume), Some(2.0));
/// ```
#[must_use]
pub fn estimate_sigma<T: Intensity>(volume: &Volume<T>) -> Option<f64> {
    NoiseEstimator::default().estimate(volume)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use seg_types::GridDims;

    #[test]
    fn test_single_voxel_has_no_pairs() {
        let volume = Volume::new_fill(GridDims::new(1, 1, 1), 5u8).unwrap();
        assert_eq!(estimate_sigma(&volume), None);
    }

    #[test]
    fn test_uniform_volume_is_zero() {
        let volume = Volume::new_fill(GridDims::new(4, 4, 4), 100i16).unwrap();
        assert_eq!(estimate_sigma(&volume), Some(0.0));
    }

    #[test]
    fn test_signed_versus_absolute() {
        // Alternating 0/10 along x: signed steps cancel, absolute ones do not.
        let volume =
            Volume::from_vec(GridDims::new(3, 1, 1), vec![0.0f32, 10.0, 0.0]).unwrap();
        let signed = NoiseEstimator::new(NoiseConvention::SignedMean)
            .estimate(&volume)
            .unwrap();
        let absolute = NoiseEstimator::new(NoiseConvention::AbsoluteMean)
            .estimate(&volume)
            .unwrap();
        assert_relative_eq!(signed, 0.0);
        assert_relative_eq!(absolute, 10.0);
    }

    #[test]
    fn test_counts_all_three_axes() {
        // Ramp along z only: 2x2x2 has 12 pairs, 4 of them along z with
        // difference -3.
        let volume = Volume::from_fn(GridDims::new(2, 2, 2), |c| 3.0 * c.z as f64).unwrap();
        let estimate = estimate_sigma(&volume).unwrap();
        assert_relative_eq!(estimate, -12.0 / 12.0);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let volume = Volume::from_fn(GridDims::new(7, 5, 9), |c| {
            ((c.x * 31 + c.y * 17 + c.z * 7) % 23) as f64 * 0.37
        })
        .unwrap();
        let first = estimate_sigma(&volume).unwrap();
        for _ in 0..5 {
            assert_eq!(estimate_sigma(&volume).unwrap(), first);
        }
    }
}
