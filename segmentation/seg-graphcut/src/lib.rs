//! Seeded graph-cut segmentation of 3D intensity volumes.
//!
//! A volume becomes a 6-connected graph with one node per voxel. Neighbor
//! pairs are linked by a Gaussian similarity of their intensities, seed voxels
//! are tied to the source (foreground) or sink (background) with infinite
//! capacity, and the minimum cut splits the volume into two labels.
//!
//! # Stages
//!
//! | Stage | Type | Output |
//! |-------|------|--------|
//! | Boundary weights | [`WeightModel`] | Capacities per neighbor pair |
//! | Optional data term | [`RegionTerm`], [`RegionModel`] | Terminal capacities per voxel |
//! | Sigma estimation | [`NoiseEstimator`] | Sigma for [`Sigma::Auto`] |
//! | Construction | [`GraphBuilder`] | A filled [`seg_maxflow::MaxFlowGraph`] |
//! | Extraction | [`SegmentationExtractor`] | A [`seg_types::LabelVolume`] |
//!
//! [`segment`] runs all of them for one [`SegmentationRequest`].
//! [`segment_multilabel`] extends the same boundary model to several seeded
//! classes.
//!
//! # Logging
//!
//! Stages emit `tracing` events; [`segment`] wraps them in a span carrying the
//! caller's [`RequestId`]. No subscriber is installed here.
//!
//! # Example
//!
//! ```
//! use seg_graphcut::{DirectionPolicy, GraphCutParams, SegmentationRequest, Sigma, segment};
//! use seg_maxflow::SolverKind;
//! use seg_types::{GridCoord, GridDims, Volume};
//!
//! // A bright 2x2x2 cube in a dark 6x6x6 volume.
//! let dims = GridDims::new(6, 6, 6);
//! let volume = Volume::from_fn(dims, |c| {
//!     let inside = (2..4).contains(&c.x) && (2..4).contains(&c.y) && (2..4).contains(&c.z);
//!     if inside { 1000i16 } else { 0 }
//! })
//! .unwrap();
//!
//! let mut fg = Volume::new_fill(dims, 0u8).unwrap();
//! let mut bg = Volume::new_fill(dims, 0u8).unwrap();
//! fg.set(GridCoord::new(2, 2, 2), 1).unwrap();
//! bg.set(GridCoord::new(0, 0, 0), 1).unwrap();
//!
//! let params = GraphCutParams::default()
//!     .with_sigma(Sigma::Fixed(50.0))
//!     .with_direction(DirectionPolicy::BrightToDark)
//!     .with_solver(SolverKind::Grid);
//! let request = SegmentationRequest::new("cube", &volume, &fg, &bg);
//! let output = segment(&request, &params).unwrap();
//!
//! assert_eq!(output.stats.foreground_voxels, 8);
//! assert_eq!(output.labels.get(GridCoord::new(3, 3, 3)), Some(255));
//! assert_eq!(output.labels.get(GridCoord::new(5, 5, 5)), Some(0));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod builder;
mod error;
mod extract;
mod multilabel;
mod noise;
mod params;
mod pipeline;
mod region;
mod weight;

pub use builder::{BuildStats, GraphBuilder, SENTINEL_MARGIN, build_graph, validate_seeds};
pub use error::{MaskInput, SegmentationError, SegmentationResult};
pub use extract::{SegmentationExtractor, extract};
pub use multilabel::{MultiLabelOutput, MultiLabelParams, segment_multilabel};
pub use noise::{NoiseConvention, NoiseEstimator, estimate_sigma};
pub use params::{GraphCutParams, Sigma};
pub use pipeline::{
    RequestId, SegmentationOutput, SegmentationRequest, SegmentationStats, StageTimings,
    resolve_sigma, seeds_from_masks, segment,
};
pub use region::{HISTOGRAM_FLOOR, Histogram, RegionModel, RegionTerm};
pub use weight::{DirectionPolicy, WeightModel, boundary_weight};
