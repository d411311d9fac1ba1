//! Region (data) terms: per-voxel terminal capacities from intensity.
//!
//! A region term adds `(source, sink)` capacities to every voxel before the
//! seed constraints go in. The source capacity is the cost of labeling the
//! voxel background, the sink capacity the cost of labeling it foreground.
//! Both scale with `lambda`.

use seg_types::{Intensity, SeedSet, Volume};

use crate::{SegmentationError, SegmentationResult};

/// Probability floor for empty histogram bins.
pub const HISTOGRAM_FLOOR: f64 = 1e-10;

/// Object probability of a voxel at or below the threshold.
const P_OBJECT_IF_DARK: f64 = 0.6;
/// Background probability of a voxel at or below the threshold.
const P_BACKGROUND_IF_DARK: f64 = 0.9;

/// Optional intensity model added on top of the hard seed constraints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegionTerm {
    /// Hard constraints only.
    #[default]
    None,
    /// Likelihoods from normalized histograms of the seed intensities.
    Histogram {
        /// Number of equal-width bins.
        bins: usize,
        /// Lower edge of the first bin.
        min: f64,
        /// Upper edge of the last bin.
        max: f64,
    },
    /// Fixed likelihoods for voxels above and below a threshold.
    Threshold {
        /// Voxels strictly above this value count as bright.
        threshold: f64,
    },
}

impl RegionTerm {
    /// Histogram term with 10 bins over `[-1024, 3071]` (CT Hounsfield range).
    #[must_use]
    pub const fn histogram() -> Self {
        Self::Histogram {
            bins: 10,
            min: -1024.0,
            max: 3071.0,
        }
    }

    /// Threshold term at 200.
    #[must_use]
    pub const fn threshold() -> Self {
        Self::Threshold { threshold: 200.0 }
    }

    /// Returns true unless this is [`RegionTerm::None`].
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Checks bin count and range.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::InvalidParams`] for zero bins, a
    /// non-finite range, `min >= max`, or a non-finite threshold.
    pub fn validate(&self) -> SegmentationResult<()> {
        match *self {
            Self::None => Ok(()),
            Self::Histogram { bins, min, max } => {
                if bins == 0 {
                    return Err(SegmentationError::invalid_params(
                        "histogram needs at least one bin",
                    ));
                }
                if !(min.is_finite() && max.is_finite() && min < max) {
                    return Err(SegmentationError::invalid_params(format!(
                        "histogram range [{min}, {max}] is empty or not finite"
                    )));
                }
                Ok(())
            }
            Self::Threshold { threshold } => {
                if threshold.is_finite() {
                    Ok(())
                } else {
                    Err(SegmentationError::invalid_params(format!(
                        "region threshold {threshold} is not finite"
                    )))
                }
            }
        }
    }
}

/// Normalized intensity histogram over fixed bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f64,
    max: f64,
    probabilities: Vec<f64>,
}

impl Histogram {
    /// Builds a normalized histogram. Values outside `[min, max]` land in the
    /// end bins.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_samples(
        samples: impl IntoIterator<Item = f64>,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Self {
        let bins = bins.max(1);
        let mut counts = vec![0usize; bins];
        let mut total = 0usize;
        for value in samples {
            counts[Self::bin_index(value, bins, min, max)] += 1;
            total += 1;
        }
        let probabilities = if total == 0 {
            vec![0.0; bins]
        } else {
            counts.iter().map(|&c| c as f64 / total as f64).collect()
        };
        Self {
            min,
            max,
            probabilities,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn bin_index(value: f64, bins: usize, min: f64, max: f64) -> usize {
        let t = (value - min) / (max - min);
        let raw = (t * bins as f64).floor();
        if raw.is_nan() || raw < 0.0 {
            0
        } else {
            (raw as usize).min(bins - 1)
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.probabilities.len()
    }

    /// Probability of the bin holding `value`, floored at
    /// [`HISTOGRAM_FLOOR`].
    #[must_use]
    pub fn probability(&self, value: f64) -> f64 {
        let index = Self::bin_index(value, self.bins(), self.min, self.max);
        self.probabilities[index].max(HISTOGRAM_FLOOR)
    }
}

/// A region term prepared for one volume and seed configuration.
#[derive(Debug, Clone)]
pub enum RegionModel {
    /// No region capacities.
    None,
    /// Seed-intensity histograms.
    Histogram {
        /// Scale of the negative log likelihoods.
        lambda: f64,
        /// Foreground seed intensities.
        foreground: Histogram,
        /// Background seed intensities.
        background: Histogram,
    },
    /// Bright/dark likelihoods.
    Threshold {
        /// Scale of the negative log likelihoods.
        lambda: f64,
        /// Bright/dark cut-off.
        threshold: f64,
    },
}

impl RegionModel {
    /// Prepares `term` for a volume and its seeds.
    ///
    /// Seeds must already be validated against the volume.
    #[must_use]
    pub fn prepare<T: Intensity>(
        term: RegionTerm,
        lambda: f64,
        volume: &Volume<T>,
        foreground: &SeedSet,
        background: &SeedSet,
    ) -> Self {
        match term {
            RegionTerm::None => Self::None,
            RegionTerm::Histogram { bins, min, max } => {
                let sample = |seeds: &SeedSet| {
                    let values: Vec<f64> = seeds
                        .iter()
                        .filter_map(|n| volume.at(n))
                        .map(Intensity::to_f64)
                        .collect();
                    Histogram::from_samples(values, bins, min, max)
                };
                Self::Histogram {
                    lambda,
                    foreground: sample(foreground),
                    background: sample(background),
                }
            }
            RegionTerm::Threshold { threshold } => Self::Threshold { lambda, threshold },
        }
    }

    /// Returns true if the model adds nothing.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Terminal capacities `(source, sink)` for a voxel of the given
    /// intensity.
    #[must_use]
    pub fn capacities(&self, intensity: f64) -> (f64, f64) {
        match self {
            Self::None => (0.0, 0.0),
            Self::Histogram {
                lambda,
                foreground,
                background,
            } => (
                -lambda * background.probability(intensity).ln(),
                -lambda * foreground.probability(intensity).ln(),
            ),
            Self::Threshold { lambda, threshold } => {
                let (p_background, p_object) = if intensity > *threshold {
                    (1.0 - P_BACKGROUND_IF_DARK, 1.0 - P_OBJECT_IF_DARK)
                } else {
                    (P_BACKGROUND_IF_DARK, P_OBJECT_IF_DARK)
                };
                (-lambda * p_background.ln(), -lambda * p_object.ln())
            }
        }
    }

    /// Largest capacity this model can add to a single terminal link.
    #[must_use]
    pub fn max_capacity(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Histogram { lambda, .. } => -lambda * HISTOGRAM_FLOOR.ln(),
            Self::Threshold { lambda, .. } => {
                -lambda * (1.0 - P_BACKGROUND_IF_DARK).ln().min(P_OBJECT_IF_DARK.ln())
            }
        }
    }
}
