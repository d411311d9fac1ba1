//! End-to-end binary segmentation.
//!
//! [`segment`] runs every check before the first edge goes into a graph:
//! parameters, mask dimensions, seed extraction, seed validation and sigma
//! resolution. Only then is a backend allocated, filled, solved and read back
//! into a label volume.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use seg_types::{GridDims, Intensity, LabelVolume, SeedSet, Volume};
use tracing::{debug, info, info_span};

use crate::builder::{GraphBuilder, validate_seeds};
use crate::error::MaskInput;
use crate::extract::SegmentationExtractor;
use crate::noise::{NoiseConvention, NoiseEstimator};
use crate::params::{GraphCutParams, Sigma};
use crate::region::RegionModel;
use crate::weight::WeightModel;
use crate::{SegmentationError, SegmentationResult};

/// Caller-chosen identity of one segmentation run, attached to its logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestId(pub String);

impl RequestId {
    /// Creates an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Inputs of one segmentation run.
///
/// Masks seed every voxel whose value is greater than `M::default()`.
#[derive(Debug, Clone)]
pub struct SegmentationRequest<'a, T, M = u8> {
    /// Identity used in log spans.
    pub id: RequestId,
    /// Intensity volume.
    pub volume: &'a Volume<T>,
    /// Foreground seed mask.
    pub foreground_mask: &'a Volume<M>,
    /// Background seed mask.
    pub background_mask: &'a Volume<M>,
    /// Optional flag that aborts the solve.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl<'a, T, M> SegmentationRequest<'a, T, M> {
    /// Creates a request without a cancel flag.
    #[must_use]
    pub fn new(
        id: impl Into<RequestId>,
        volume: &'a Volume<T>,
        foreground_mask: &'a Volume<M>,
        background_mask: &'a Volume<M>,
    ) -> Self {
        Self {
            id: id.into(),
            volume,
            foreground_mask,
            background_mask,
            cancel: None,
        }
    }

    /// Installs a cancel flag; setting it to `true` makes the solve return
    /// [`seg_maxflow::FlowError::Cancelled`].
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Wall-clock time spent in each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageTimings {
    /// Parameter, mask and seed checks plus sigma resolution.
    pub validate: Duration,
    /// Backend allocation and graph construction.
    pub build: Duration,
    /// Max-flow computation.
    pub solve: Duration,
    /// Label volume extraction.
    pub extract: Duration,
}

impl StageTimings {
    /// Sum of all stages.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.validate + self.build + self.solve + self.extract
    }
}

/// Summary of one segmentation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationStats {
    /// Sigma used for the boundary weights.
    pub sigma: f64,
    /// Backend name.
    pub solver: &'static str,
    /// Number of voxel nodes.
    pub nodes: usize,
    /// Number of boundary edges.
    pub edges: usize,
    /// Maximum flow value (equal to the minimum cut capacity).
    pub flow: f64,
    /// Voxels on the source side of the cut.
    pub foreground_voxels: usize,
    /// Stage timings.
    pub timings: StageTimings,
}

/// Labels and statistics of one segmentation run.
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    /// One label per voxel, with the input volume's geometry.
    pub labels: LabelVolume,
    /// Run statistics.
    pub stats: SegmentationStats,
}

/// Resolves the boundary sigma for a volume.
///
/// # Errors
///
/// [`SegmentationError::DegenerateNoiseEstimate`] if an automatic estimate is
/// missing, not finite or not positive.
pub fn resolve_sigma<T: Intensity>(
    params: &GraphCutParams,
    volume: &Volume<T>,
) -> SegmentationResult<f64> {
    sigma_for(params.sigma, params.noise, volume)
}

pub(crate) fn sigma_for<T: Intensity>(
    sigma: Sigma,
    noise: NoiseConvention,
    volume: &Volume<T>,
) -> SegmentationResult<f64> {
    match sigma {
        Sigma::Fixed(sigma) => Ok(sigma),
        Sigma::Auto => {
            let estimate = NoiseEstimator::new(noise).estimate(volume);
            match estimate {
                Some(sigma) if sigma.is_finite() && sigma > 0.0 => Ok(sigma),
                _ => Err(SegmentationError::DegenerateNoiseEstimate { estimate }),
            }
        }
    }
}

/// Returns an error unless `mask` has the dimensions `expected`.
fn check_mask<M>(
    input: MaskInput,
    expected: GridDims,
    mask: &Volume<M>,
) -> SegmentationResult<()>
where
    M: Copy,
{
    if mask.dims() == expected {
        Ok(())
    } else {
        Err(SegmentationError::DimensionMismatch {
            input,
            expected,
            actual: mask.dims(),
        })
    }
}

/// Segments a volume into foreground and background.
///
/// # Errors
///
/// Input errors ([`SegmentationError::is_input_error`]) are returned before
/// any graph is built. Backend failures and cancellation surface as
/// [`SegmentationError::Flow`].
///
/// # Example
///
/// ```
/// use seg_graphcut::{GraphCutParams, SegmentationRequest, segment};
/// use seg_types::{GridCoord, GridDims, Volume};
///
/// let dims = GridDims::new(6, 1, 1);
/// let volume = Volume::from_vec(dims, vec![200u8, 200, 200, 10, 10, 10]).unwrap();
/// let mut fg = Volume::new_fill(dims, 0u8).unwrap();
/// let mut bg = Volume::new_fill(dims, 0u8).unwrap();
/// fg.set(GridCoord::new(0, 0, 0), 1).unwrap();
/// bg.set(GridCoord::new(5, 0, 0), 1).unwrap();
///
/// let request = SegmentationRequest::new("line", &volume, &fg, &bg);
/// let output = segment(&request, &GraphCutParams::default()).unwrap();
/// assert_eq!(output.labels.as_slice(), &[255, 255, 255, 0, 0, 0]);
/// assert_eq!(output.stats.foreground_voxels, 3);
/// ```
pub fn segment<T, M>(
    request: &SegmentationRequest<'_, T, M>,
    params: &GraphCutParams,
) -> SegmentationResult<SegmentationOutput>
where
    T: Intensity,
    M: Copy + PartialOrd + Default,
{
    let span = info_span!("segment", request = %request.id, solver = %params.solver);
    let _guard = span.enter();

    let started = Instant::now();
    params.validate()?;
    let volume = request.volume;
    let dims = volume.dims();
    let (foreground, background) =
        seeds_from_masks(dims, request.foreground_mask, request.background_mask)?;

    let sigma = resolve_sigma(params, volume)?;
    let weights = WeightModel::new(sigma, params.direction)?;
    let region = RegionModel::prepare(
        params.region,
        params.lambda,
        volume,
        &foreground,
        &background,
    );
    let validate = started.elapsed();
    debug!(
        dims = %dims,
        sigma,
        foreground_seeds = foreground.len(),
        background_seeds = background.len(),
        "inputs validated"
    );

    let started = Instant::now();
    let mut graph = params.solver.create(dims)?;
    if let Some(flag) = &request.cancel {
        graph.set_cancel_flag(Arc::clone(flag));
    }
    let build_stats = GraphBuilder::new(weights).with_region(region).build(
        volume,
        &foreground,
        &background,
        graph.as_mut(),
    )?;
    let build = started.elapsed();

    let started = Instant::now();
    let flow = graph.solve()?;
    let solve = started.elapsed();

    let started = Instant::now();
    let extractor = SegmentationExtractor::new(params.foreground_value, params.background_value);
    let labels = extractor.extract_like(graph.as_ref(), volume)?;
    let extract = started.elapsed();

    let foreground_voxels = labels
        .as_slice()
        .iter()
        .filter(|&&label| label == params.foreground_value)
        .count();
    let stats = SegmentationStats {
        sigma,
        solver: graph.name(),
        nodes: build_stats.nodes,
        edges: build_stats.boundary_edges,
        flow,
        foreground_voxels,
        timings: StageTimings {
            validate,
            build,
            solve,
            extract,
        },
    };
    info!(
        nodes = stats.nodes,
        edges = stats.edges,
        flow,
        foreground_voxels,
        elapsed_ms = stats.timings.total().as_secs_f64() * 1e3,
        "segmentation complete"
    );
    Ok(SegmentationOutput { labels, stats })
}

/// Seed sets read from a pair of masks, checked against each other.
///
/// # Errors
///
/// [`SegmentationError::DimensionMismatch`] if a mask does not match `dims`,
/// and the errors of [`validate_seeds`].
pub fn seeds_from_masks<M>(
    dims: GridDims,
    foreground_mask: &Volume<M>,
    background_mask: &Volume<M>,
) -> SegmentationResult<(SeedSet, SeedSet)>
where
    M: Copy + PartialOrd + Default,
{
    check_mask(MaskInput::Foreground, dims, foreground_mask)?;
    check_mask(MaskInput::Background, dims, background_mask)?;
    let foreground = SeedSet::from_mask(foreground_mask);
    let background = SeedSet::from_mask(background_mask);
    validate_seeds(foreground_mask.indexer(), &foreground, &background)?;
    Ok((foreground, background))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use seg_maxflow::{FlowError, SolverKind};
    use seg_types::{GridCoord, SeedClass, Vector3, VolumeGeometry};
    use std::sync::atomic::Ordering;

    type Coords<'a> = &'a [(usize, usize, usize)];

    fn masks(dims: GridDims, fg: Coords<'_>, bg: Coords<'_>) -> (Volume<u8>, Volume<u8>) {
        let mut f = Volume::new_fill(dims, 0u8).unwrap();
        let mut b = Volume::new_fill(dims, 0u8).unwrap();
        for &c in fg {
            f.set(GridCoord::from(c), 1).unwrap();
        }
        for &c in bg {
            b.set(GridCoord::from(c), 1).unwrap();
        }
        (f, b)
    }

    #[test]
    fn test_dimension_mismatch_names_mask() {
        let volume = Volume::new_fill(GridDims::new(3, 3, 3), 0i16).unwrap();
        let (fg, _) = masks(GridDims::new(3, 3, 3), &[(0, 0, 0)], &[]);
        let (_, bg) = masks(GridDims::new(3, 3, 2), &[], &[(2, 2, 1)]);
        let request = SegmentationRequest::new("dims", &volume, &fg, &bg);
        let err = segment(&request, &GraphCutParams::default()).unwrap_err();
        assert_eq!(
            err,
            SegmentationError::DimensionMismatch {
                input: MaskInput::Background,
                expected: GridDims::new(3, 3, 3),
                actual: GridDims::new(3, 3, 2),
            }
        );
    }

    #[test]
    fn test_empty_masks() {
        let dims = GridDims::new(3, 3, 3);
        let volume = Volume::new_fill(dims, 0i16).unwrap();
        let (fg, bg) = masks(dims, &[], &[(2, 2, 2)]);
        let request = SegmentationRequest::new("empty", &volume, &fg, &bg);
        assert_eq!(
            segment(&request, &GraphCutParams::default()).unwrap_err(),
            SegmentationError::EmptySeedSet(SeedClass::Foreground)
        );

        let (fg, bg) = masks(dims, &[(0, 0, 0)], &[]);
        let request = SegmentationRequest::new("empty", &volume, &fg, &bg);
        assert_eq!(
            segment(&request, &GraphCutParams::default()).unwrap_err(),
            SegmentationError::EmptySeedSet(SeedClass::Background)
        );
    }

    #[test]
    fn test_auto_sigma_on_uniform_volume_is_degenerate() {
        let dims = GridDims::new(3, 3, 3);
        let volume = Volume::new_fill(dims, 10i16).unwrap();
        let (fg, bg) = masks(dims, &[(0, 0, 0)], &[(2, 2, 2)]);
        let request = SegmentationRequest::new("auto", &volume, &fg, &bg);
        let params = GraphCutParams::default().with_sigma(Sigma::Auto);
        assert_eq!(
            segment(&request, &params).unwrap_err(),
            SegmentationError::DegenerateNoiseEstimate {
                estimate: Some(0.0)
            }
        );
    }

    #[test]
    fn test_auto_sigma_uses_estimate() {
        // Decreasing ramp along x: every x step is +5, so the signed mean over
        // a 4x1x1 line is 5.
        let dims = GridDims::new(4, 1, 1);
        let volume = Volume::from_vec(dims, vec![15i16, 10, 5, 0]).unwrap();
        let params = GraphCutParams::default().with_sigma(Sigma::Auto);
        assert!((resolve_sigma(&params, &volume).unwrap() - 5.0).abs() < 1e-12);

        let abs = params.clone().with_noise(NoiseConvention::AbsoluteMean);
        assert!((resolve_sigma(&abs, &volume).unwrap() - 5.0).abs() < 1e-12);

        let (fg, bg) = masks(dims, &[(0, 0, 0)], &[(3, 0, 0)]);
        let request = SegmentationRequest::new("auto", &volume, &fg, &bg);
        let output = segment(&request, &params).unwrap();
        assert!((output.stats.sigma - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_output_keeps_geometry_and_labels() {
        let dims = GridDims::new(4, 1, 1);
        let geometry = VolumeGeometry::default().with_spacing(Vector3::new(0.5, 0.5, 2.0));
        let volume = Volume::from_vec(dims, vec![100u16, 100, 0, 0])
            .unwrap()
            .with_geometry(geometry);
        let (fg, bg) = masks(dims, &[(0, 0, 0)], &[(3, 0, 0)]);
        let request = SegmentationRequest::new("geom", &volume, &fg, &bg);
        let params = GraphCutParams::default()
            .with_sigma(Sigma::Fixed(10.0))
            .with_labels(2, 1);
        let output = segment(&request, &params).unwrap();
        assert_eq!(output.labels.geometry(), &geometry);
        assert_eq!(output.labels.as_slice(), &[2, 2, 1, 1]);
        assert_eq!(output.stats.nodes, 4);
        assert_eq!(output.stats.edges, 3);
        assert_eq!(output.stats.solver, "adjacency");
        assert_eq!(output.stats.foreground_voxels, 2);
    }

    #[test]
    fn test_cancelled_request() {
        let dims = GridDims::new(4, 4, 4);
        let volume = Volume::new_fill(dims, 0u8).unwrap();
        let (fg, bg) = masks(dims, &[(0, 0, 0)], &[(3, 3, 3)]);
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Relaxed);
        for solver in SolverKind::ALL {
            let request = SegmentationRequest::new("cancel", &volume, &fg, &bg)
                .with_cancel_flag(Arc::clone(&flag));
            let params = GraphCutParams::default().with_solver(solver);
            let err = segment(&request, &params).unwrap_err();
            assert_eq!(err, SegmentationError::Flow(FlowError::Cancelled));
            assert!(err.is_cancelled());
        }
    }

    #[test]
    fn test_seeds_from_masks() {
        let dims = GridDims::new(2, 2, 1);
        let (fg, bg) = masks(dims, &[(0, 0, 0)], &[(1, 1, 0)]);
        let (f, b) = seeds_from_masks(dims, &fg, &bg).unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(b.len(), 1);

        let (fg, bg) = masks(dims, &[(0, 0, 0), (1, 1, 0)], &[(1, 1, 0)]);
        assert!(matches!(
            seeds_from_masks(dims, &fg, &bg),
            Err(SegmentationError::ConflictingSeeds { count: 1, .. })
        ));
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::from("case-17");
        assert_eq!(id.to_string(), "case-17");
        assert_eq!(id.as_str(), "case-17");
        assert_eq!(RequestId::from(String::from("x")), RequestId::new("x"));
    }
}
