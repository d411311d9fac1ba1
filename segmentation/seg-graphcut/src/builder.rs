//! Volume-to-graph construction.
//!
//! One pass over the voxels in index order. Each voxel links to its `+x`,
//! `+y` and `+z` neighbors, so every unordered neighbor pair gets exactly one
//! boundary edge. Region capacities go in next, then the seed constraints.
//! Every check runs before the first edge is inserted.

use seg_maxflow::{CAPACITY_INFINITY, MaxFlowGraph};
use seg_types::{Intensity, NodeId, SeedClass, SeedSet, Volume, VoxelIndexer};
use tracing::debug;

use crate::region::RegionModel;
use crate::weight::{DirectionPolicy, WeightModel};
use crate::{SegmentationError, SegmentationResult};

/// Factor by which [`CAPACITY_INFINITY`] must exceed every finite per-node
/// capacity sum.
pub const SENTINEL_MARGIN: f64 = 1e6;

/// Upper bound of one boundary arc capacity.
const MAX_BOUNDARY_WEIGHT: f64 = 1.0;

/// Counters from one graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildStats {
    /// Number of voxel nodes.
    pub nodes: usize,
    /// Number of boundary edges inserted.
    pub boundary_edges: usize,
    /// Number of foreground seeds.
    pub foreground_seeds: usize,
    /// Number of background seeds.
    pub background_seeds: usize,
    /// Largest per-node sum of finite incident capacity.
    pub max_incident_capacity: f64,
}

/// Checks both seed sets against the grid.
///
/// # Errors
///
/// [`SegmentationError::EmptySeedSet`] for an empty set,
/// [`SegmentationError::SeedOutOfRange`] for a seed outside the grid and
/// [`SegmentationError::ConflictingSeeds`] if a voxel is in both sets.
pub fn validate_seeds(
    indexer: &VoxelIndexer,
    foreground: &SeedSet,
    background: &SeedSet,
) -> SegmentationResult<()> {
    for (seeds, class) in [
        (foreground, SeedClass::Foreground),
        (background, SeedClass::Background),
    ] {
        if seeds.is_empty() {
            return Err(SegmentationError::EmptySeedSet(class));
        }
        if let Some(node) = seeds.max_node().filter(|&n| !indexer.contains(n)) {
            return Err(SegmentationError::SeedOutOfRange {
                node,
                node_count: indexer.node_count(),
            });
        }
    }
    if let Some(first) = foreground.conflicts_with(background) {
        let count = foreground.iter().filter(|&n| background.contains(n)).count();
        return Err(SegmentationError::ConflictingSeeds { count, first });
    }
    Ok(())
}

/// Fills a [`MaxFlowGraph`] from a volume and its seeds.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    weights: WeightModel,
    region: RegionModel,
}

impl GraphBuilder {
    /// Builder with hard constraints only.
    #[must_use]
    pub const fn new(weights: WeightModel) -> Self {
        Self {
            weights,
            region: RegionModel::None,
        }
    }

    /// Adds a prepared region model.
    #[must_use]
    pub fn with_region(mut self, region: RegionModel) -> Self {
        self.region = region;
        self
    }

    /// The boundary weight model.
    #[must_use]
    pub const fn weights(&self) -> &WeightModel {
        &self.weights
    }

    /// Inserts all boundary edges, region capacities and seed constraints.
    ///
    /// # Errors
    ///
    /// Seed validation errors, [`SegmentationError::InvalidParams`] if the
    /// graph is not sized for the volume,
    /// [`SegmentationError::SentinelTooSmall`] if the region term is too large
    /// for the infinite sentinel, and [`SegmentationError::Flow`] if the
    /// backend rejects an insertion.
    pub fn build<T, G>(
        &self,
        volume: &Volume<T>,
        foreground: &SeedSet,
        background: &SeedSet,
        out: &mut G,
    ) -> SegmentationResult<BuildStats>
    where
        T: Intensity,
        G: MaxFlowGraph + ?Sized,
    {
        let indexer = volume.indexer();
        validate_seeds(indexer, foreground, background)?;
        if out.node_count() != indexer.node_count() {
            return Err(SegmentationError::invalid_params(format!(
                "graph has {} nodes, volume has {} voxels",
                out.node_count(),
                indexer.node_count()
            )));
        }
        // Six arcs out and six in, each at most one, plus both region links.
        let bound = 12.0 * MAX_BOUNDARY_WEIGHT + 2.0 * self.region.max_capacity();
        if !(bound.is_finite() && bound * SENTINEL_MARGIN < CAPACITY_INFINITY) {
            return Err(SegmentationError::SentinelTooSmall {
                max_incident: bound,
            });
        }

        let dims = indexer.dims();
        let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
        let slice = dims.slice_len();
        let samples = volume.as_slice();
        let mut incident = vec![0.0f64; samples.len()];
        let mut boundary_edges = 0usize;

        let mut link = |a: usize, b: usize, out: &mut G| -> SegmentationResult<()> {
            let (fwd, rev) = self
                .weights
                .weights(samples[a].to_f64(), samples[b].to_f64());
            out.add_boundary_edge(node(a), node(b), fwd, rev)?;
            incident[a] += fwd + rev;
            incident[b] += fwd + rev;
            boundary_edges += 1;
            Ok(())
        };

        let mut i = 0usize;
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    if x + 1 < nx {
                        link(i, i + 1, out)?;
                    }
                    if y + 1 < ny {
                        link(i, i + nx, out)?;
                    }
                    if z + 1 < nz {
                        link(i, i + slice, out)?;
                    }
                    i += 1;
                }
            }
        }

        if !self.region.is_none() {
            for (i, sample) in samples.iter().enumerate() {
                let (source, sink) = self.region.capacities(sample.to_f64());
                out.set_terminal_weights(node(i), source, sink)?;
                incident[i] += source + sink;
            }
        }

        for n in foreground.iter() {
            out.set_terminal_weights(n, CAPACITY_INFINITY, 0.0)?;
        }
        for n in background.iter() {
            out.set_terminal_weights(n, 0.0, CAPACITY_INFINITY)?;
        }

        let max_incident_capacity = incident.iter().copied().fold(0.0, f64::max);
        let stats = BuildStats {
            nodes: samples.len(),
            boundary_edges,
            foreground_seeds: foreground.len(),
            background_seeds: background.len(),
            max_incident_capacity,
        };
        debug!(
            backend = out.name(),
            nodes = stats.nodes,
            edges = stats.boundary_edges,
            foreground_seeds = stats.foreground_seeds,
            background_seeds = stats.background_seeds,
            max_incident = stats.max_incident_capacity,
            "graph built"
        );
        Ok(stats)
    }
}

/// Node id of a linear index; the indexer guarantees it fits `u32`.
#[allow(clippy::cast_possible_truncation)]
#[inline]
const fn node(i: usize) -> NodeId {
    NodeId(i as u32)
}

/// Builds the segmentation graph with hard constraints only.
///
/// Validates the seeds and sigma, then fills `out`. Nothing is inserted if
/// any check fails.
///
/// # Errors
///
/// See [`validate_seeds`], [`WeightModel::new`] and [`GraphBuilder::build`].
pub fn build_graph<T, G>(
    volume: &Volume<T>,
    foreground: &SeedSet,
    background: &SeedSet,
    sigma: f64,
    direction: DirectionPolicy,
    out: &mut G,
) -> SegmentationResult<BuildStats>
where
    T: Intensity,
    G: MaxFlowGraph + ?Sized,
{
    validate_seeds(volume.indexer(), foreground, background)?;
    let weights = WeightModel::new(sigma, direction)?;
    GraphBuilder::new(weights).build(volume, foreground, background, out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::region::RegionTerm;
    use approx::assert_relative_eq;
    use seg_maxflow::{AdjacencyGraph, Partition};
    use seg_types::{GridCoord, GridDims};

    fn seeds(volume: &Volume<i16>, coords: &[(usize, usize, usize)]) -> SeedSet {
        SeedSet::from_coords(volume.indexer(), coords.iter().copied().map(GridCoord::from))
            .unwrap()
    }

    #[test]
    fn test_edge_count_matches_grid() {
        for dims in [
            GridDims::new(10, 10, 10),
            GridDims::new(3, 3, 3),
            GridDims::new(5, 1, 1),
            GridDims::new(2, 3, 4),
        ] {
            let volume = Volume::new_fill(dims, 0i16).unwrap();
            let fg = SeedSet::from_nodes([NodeId(0)]);
            let last = u32::try_from(dims.voxel_count() - 1).unwrap();
            let bg = SeedSet::from_nodes([NodeId(last)]);
            let mut graph = AdjacencyGraph::new(volume.len());
            let stats = build_graph(
                &volume,
                &fg,
                &bg,
                50.0,
                DirectionPolicy::BrightToDark,
                &mut graph,
            )
            .unwrap();
            assert_eq!(stats.boundary_edges, dims.expected_edge_count());
            assert_eq!(graph.edge_count(), dims.expected_edge_count());
        }
    }

    #[test]
    fn test_seed_validation_order() {
        let volume = Volume::new_fill(GridDims::new(3, 3, 3), 0i16).unwrap();
        let indexer = volume.indexer();
        let fg = seeds(&volume, &[(0, 0, 0)]);
        let bg = seeds(&volume, &[(2, 2, 2)]);

        assert_eq!(
            validate_seeds(indexer, &SeedSet::new(), &bg),
            Err(SegmentationError::EmptySeedSet(SeedClass::Foreground))
        );
        assert_eq!(
            validate_seeds(indexer, &fg, &SeedSet::new()),
            Err(SegmentationError::EmptySeedSet(SeedClass::Background))
        );

        let both = seeds(&volume, &[(0, 0, 0), (2, 2, 2), (1, 1, 1)]);
        assert_eq!(
            validate_seeds(indexer, &both, &seeds(&volume, &[(1, 1, 1), (2, 2, 2)])),
            Err(SegmentationError::ConflictingSeeds {
                count: 2,
                first: NodeId(13)
            })
        );

        let outside = SeedSet::from_nodes([NodeId(27)]);
        assert!(matches!(
            validate_seeds(indexer, &outside, &bg),
            Err(SegmentationError::SeedOutOfRange { .. })
        ));
        assert!(validate_seeds(indexer, &fg, &bg).is_ok());
    }

    #[test]
    fn test_invalid_sigma_inserts_nothing() {
        let volume = Volume::new_fill(GridDims::new(3, 3, 3), 0i16).unwrap();
        let fg = seeds(&volume, &[(0, 0, 0)]);
        let bg = seeds(&volume, &[(2, 2, 2)]);
        let mut graph = AdjacencyGraph::new(27);
        let err = build_graph(&volume, &fg, &bg, 0.0, DirectionPolicy::Symmetric, &mut graph)
            .unwrap_err();
        assert_eq!(err, SegmentationError::InvalidSigma(0.0));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_graph_size_mismatch() {
        let volume = Volume::new_fill(GridDims::new(2, 2, 2), 0i16).unwrap();
        let fg = SeedSet::from_nodes([NodeId(0)]);
        let bg = SeedSet::from_nodes([NodeId(7)]);
        let mut graph = AdjacencyGraph::new(5);
        let err = build_graph(&volume, &fg, &bg, 1.0, DirectionPolicy::Symmetric, &mut graph)
            .unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidParams(_)));
    }

    #[test]
    fn test_incident_capacity_uniform_volume() {
        // Every weight is 1 on a uniform volume; the center of a 3^3 cube
        // has 6 edges, each contributing 2.
        let volume = Volume::new_fill(GridDims::new(3, 3, 3), 7i16).unwrap();
        let fg = SeedSet::from_nodes([NodeId(0)]);
        let bg = SeedSet::from_nodes([NodeId(26)]);
        let mut graph = AdjacencyGraph::new(27);
        let stats =
            build_graph(&volume, &fg, &bg, 5.0, DirectionPolicy::Symmetric, &mut graph).unwrap();
        assert_relative_eq!(stats.max_incident_capacity, 12.0);
        assert_eq!(stats.foreground_seeds, 1);
        assert_eq!(stats.background_seeds, 1);
    }

    #[test]
    fn test_sentinel_margin_rejects_huge_lambda() {
        let volume = Volume::new_fill(GridDims::new(2, 1, 1), 0i16).unwrap();
        let fg = SeedSet::from_nodes([NodeId(0)]);
        let bg = SeedSet::from_nodes([NodeId(1)]);
        let region = RegionModel::prepare(RegionTerm::threshold(), 1e305, &volume, &fg, &bg);
        let builder = GraphBuilder::new(WeightModel::new(1.0, DirectionPolicy::Symmetric).unwrap())
            .with_region(region);
        let mut graph = AdjacencyGraph::new(2);
        let err = builder.build(&volume, &fg, &bg, &mut graph).unwrap_err();
        assert!(matches!(err, SegmentationError::SentinelTooSmall { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_threshold_region_alone_decides_free_voxels() {
        // Two bright voxels between a dark background seed and a bright
        // foreground seed, with weak links: the threshold term pulls the
        // bright voxels to the foreground.
        let volume = Volume::from_vec(GridDims::new(4, 1, 1), vec![0i16, 300, 300, 300]).unwrap();
        let fg = SeedSet::from_nodes([NodeId(3)]);
        let bg = SeedSet::from_nodes([NodeId(0)]);
        let region = RegionModel::prepare(
            RegionTerm::Threshold { threshold: 200.0 },
            10.0,
            &volume,
            &fg,
            &bg,
        );
        let builder = GraphBuilder::new(WeightModel::new(10.0, DirectionPolicy::Symmetric).unwrap())
            .with_region(region);
        let mut graph = AdjacencyGraph::new(4);
        builder.build(&volume, &fg, &bg, &mut graph).unwrap();
        graph.solve().unwrap();
        assert_eq!(graph.partition_of(NodeId(1)).unwrap(), Partition::Source);
        assert_eq!(graph.partition_of(NodeId(2)).unwrap(), Partition::Source);
        assert_eq!(graph.partition_of(NodeId(0)).unwrap(), Partition::Sink);
    }
}
