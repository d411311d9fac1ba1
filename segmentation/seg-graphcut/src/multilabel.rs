//! Multi-label segmentation by alpha-expansion.
//!
//! Each class has its own seed set. The labeling minimizes a Potts energy:
//! every forward neighbor pair with different labels costs the symmetric
//! boundary weight of the pair. Seeds are hard constraints.
//!
//! Starting from class 0 everywhere (seeds at their own class), each cycle
//! tries one expansion move per class `alpha`: every free voxel may switch to
//! `alpha` or keep its label. The move is a binary cut, built with the
//! standard submodular construction for pairwise terms, and is kept only if
//! it lowers the energy. Iteration stops after a cycle without improvement.
//!
//! In the move graph, a voxel on the sink side switches to `alpha`. Seeds
//! and voxels already labeled `alpha` are pinned to the source side.

use hashbrown::HashMap;
use seg_maxflow::{CAPACITY_INFINITY, MaxFlowGraph, Partition, SolverKind};
use seg_types::{Intensity, Label, LabelVolume, NodeId, SeedSet, Volume};
use tracing::{debug, info};

use crate::noise::NoiseConvention;
use crate::params::Sigma;
use crate::pipeline::sigma_for;
use crate::weight::{DirectionPolicy, WeightModel};
use crate::{SegmentationError, SegmentationResult};

/// Relative energy decrease below which a move counts as no improvement.
const ENERGY_TOLERANCE: f64 = 1e-12;

/// Marker for voxels without a seed.
const FREE: u16 = u16::MAX;

/// Parameters for [`segment_multilabel`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiLabelParams {
    /// Boundary spread.
    pub sigma: Sigma,
    /// Averaging used when `sigma` is [`Sigma::Auto`].
    pub noise: NoiseConvention,
    /// Backend for every expansion move.
    pub solver: SolverKind,
    /// Upper bound on full expansion cycles.
    pub max_cycles: usize,
    /// Output label per class; empty means the class index.
    pub label_values: Vec<Label>,
}

impl Default for MultiLabelParams {
    fn default() -> Self {
        Self {
            sigma: Sigma::default(),
            noise: NoiseConvention::SignedMean,
            solver: SolverKind::Adjacency,
            max_cycles: 5,
            label_values: Vec::new(),
        }
    }
}

impl MultiLabelParams {
    /// Sets the boundary spread.
    #[must_use]
    pub const fn with_sigma(mut self, sigma: Sigma) -> Self {
        self.sigma = sigma;
        self
    }

    /// Sets the backend.
    #[must_use]
    pub const fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Sets the cycle limit.
    #[must_use]
    pub const fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Sets the output label of each class.
    #[must_use]
    pub fn with_label_values(mut self, values: Vec<Label>) -> Self {
        self.label_values = values;
        self
    }

    /// Output label of class `class`.
    fn label_of(&self, class: u16) -> Label {
        self.label_values
            .get(usize::from(class))
            .copied()
            .unwrap_or_else(|| Label::try_from(class).unwrap_or(Label::MAX))
    }
}

/// Result of [`segment_multilabel`].
#[derive(Debug, Clone)]
pub struct MultiLabelOutput {
    /// One label per voxel, with the input volume's geometry.
    pub labels: LabelVolume,
    /// Potts energy of the final labeling.
    pub energy: f64,
    /// Expansion cycles run.
    pub cycles: usize,
    /// Expansion moves that lowered the energy.
    pub accepted_moves: usize,
}

/// Neighbor pairs with their symmetric weights.
struct PottsTerms {
    pairs: Vec<(u32, u32, f64)>,
}

impl PottsTerms {
    #[allow(clippy::cast_possible_truncation)]
    fn new<T: Intensity>(volume: &Volume<T>, weights: &WeightModel) -> Self {
        let dims = volume.dims();
        let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
        let slice = dims.slice_len();
        let samples = volume.as_slice();
        let mut pairs = Vec::with_capacity(dims.expected_edge_count());
        let mut push = |a: usize, b: usize| {
            let w = weights.similarity(samples[a].to_f64(), samples[b].to_f64());
            pairs.push((a as u32, b as u32, w));
        };
        let mut i = 0usize;
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    if x + 1 < nx {
                        push(i, i + 1);
                    }
                    if y + 1 < ny {
                        push(i, i + nx);
                    }
                    if z + 1 < nz {
                        push(i, i + slice);
                    }
                    i += 1;
                }
            }
        }
        Self { pairs }
    }

    fn energy(&self, labels: &[u16]) -> f64 {
        self.pairs
            .iter()
            .filter(|&&(a, b, _)| labels[a as usize] != labels[b as usize])
            .map(|&(_, _, w)| w)
            .sum()
    }
}

/// Checks the class seed sets and returns the class of every seeded voxel.
fn seed_classes(node_count: usize, classes: &[SeedSet]) -> SegmentationResult<Vec<u16>> {
    if classes.len() < 2 {
        return Err(SegmentationError::invalid_params(format!(
            "multi-label segmentation needs at least two classes, got {}",
            classes.len()
        )));
    }
    if classes.len() > usize::from(Label::MAX) + 1 {
        return Err(SegmentationError::invalid_params(format!(
            "{} classes do not fit the label type",
            classes.len()
        )));
    }
    for (class, seeds) in classes.iter().enumerate() {
        if seeds.is_empty() {
            return Err(SegmentationError::invalid_params(format!(
                "class {class} has no seeds"
            )));
        }
        if let Some(node) = seeds.max_node().filter(|n| n.index() >= node_count) {
            return Err(SegmentationError::SeedOutOfRange { node, node_count });
        }
    }

    let mut owner: HashMap<NodeId, u16> = HashMap::new();
    let mut conflicts: Vec<NodeId> = Vec::new();
    for (class, seeds) in classes.iter().enumerate() {
        // Class count is bounded by the label range above.
        #[allow(clippy::cast_possible_truncation)]
        let class = class as u16;
        for node in seeds.iter() {
            if let Some(&other) = owner.get(&node) {
                if other != class {
                    conflicts.push(node);
                }
            } else {
                owner.insert(node, class);
            }
        }
    }
    if let Some(&first) = conflicts.iter().min() {
        conflicts.sort_unstable();
        conflicts.dedup();
        return Err(SegmentationError::ConflictingSeeds {
            count: conflicts.len(),
            first,
        });
    }

    let mut seeded = vec![FREE; node_count];
    for (node, class) in owner {
        seeded[node.index()] = class;
    }
    Ok(seeded)
}

/// Builds and solves the binary graph of one expansion move and returns the
/// labeling it proposes.
#[allow(clippy::cast_possible_truncation)]
fn expansion_move(
    graph: &mut dyn MaxFlowGraph,
    terms: &PottsTerms,
    labels: &[u16],
    seeded: &[u16],
    alpha: u16,
) -> SegmentationResult<Vec<u16>> {
    let n = labels.len();
    let pinned = |i: usize| labels[i] == alpha || seeded[i] != FREE;
    let mut source = vec![0.0f64; n];
    let mut sink = vec![0.0f64; n];

    for &(p, q, w) in &terms.pairs {
        let (p, q) = (p as usize, q as usize);
        if pinned(p) && pinned(q) {
            continue;
        }
        let (lp, lq) = (labels[p], labels[q]);
        // Costs of (keep, keep), (keep, switch), (switch, keep); switching
        // both costs nothing.
        let a = if lp == lq { 0.0 } else { w };
        let b = if lp == alpha { 0.0 } else { w };
        let c = if lq == alpha { 0.0 } else { w };

        let unary_p = c - a;
        if unary_p > 0.0 {
            source[p] += unary_p;
        } else {
            sink[p] -= unary_p;
        }
        sink[q] += c;
        let pair = b + c - a;
        if pair > 0.0 {
            graph.add_boundary_edge(NodeId(p as u32), NodeId(q as u32), pair, 0.0)?;
        }
    }

    for (i, (&to_source, &to_sink)) in source.iter().zip(&sink).enumerate() {
        let node = NodeId(i as u32);
        if pinned(i) {
            graph.set_terminal_weights(node, CAPACITY_INFINITY, to_sink)?;
        } else if to_source > 0.0 || to_sink > 0.0 {
            graph.set_terminal_weights(node, to_source, to_sink)?;
        }
    }

    graph.solve()?;
    let mut proposal = labels.to_vec();
    for (i, label) in proposal.iter_mut().enumerate() {
        if graph.partition_of(NodeId(i as u32))? == Partition::Sink {
            *label = alpha;
        }
    }
    Ok(proposal)
}

/// Labels every voxel with one of several seeded classes.
///
/// `classes[k]` holds the seeds of class `k`. Boundary weights are always
/// symmetric.
///
/// # Errors
///
/// [`SegmentationError::InvalidParams`] for fewer than two classes, an empty
/// class, a bad label table or zero cycles,
/// [`SegmentationError::SeedOutOfRange`],
/// [`SegmentationError::ConflictingSeeds`] if a voxel is seeded for two
/// classes, sigma errors as in [`crate::segment`], and
/// [`SegmentationError::Flow`] from the backend.
///
/// # Example
///
/// ```
/// use seg_graphcut::{MultiLabelParams, Sigma, segment_multilabel};
/// use seg_types::{GridDims, NodeId, SeedSet, Volume};
///
/// let intensities = vec![0i16, 0, 100, 100, 200, 200];
/// let volume = Volume::from_vec(GridDims::new(6, 1, 1), intensities).unwrap();
/// let classes = [
///     SeedSet::from_nodes([NodeId(0)]),
///     SeedSet::from_nodes([NodeId(2)]),
///     SeedSet::from_nodes([NodeId(5)]),
/// ];
/// let params = MultiLabelParams::default().with_sigma(Sigma::Fixed(10.0));
/// let output = segment_multilabel(&volume, &classes, &params).unwrap();
/// assert_eq!(output.labels.as_slice(), &[0, 0, 1, 1, 2, 2]);
/// ```
pub fn segment_multilabel<T: Intensity>(
    volume: &Volume<T>,
    classes: &[SeedSet],
    params: &MultiLabelParams,
) -> SegmentationResult<MultiLabelOutput> {
    if params.max_cycles == 0 {
        return Err(SegmentationError::invalid_params(
            "max_cycles must be at least one",
        ));
    }
    if !params.label_values.is_empty() && params.label_values.len() != classes.len() {
        return Err(SegmentationError::invalid_params(format!(
            "{} label values for {} classes",
            params.label_values.len(),
            classes.len()
        )));
    }
    let dims = volume.dims();
    let seeded = seed_classes(volume.len(), classes)?;
    let sigma = sigma_for(params.sigma, params.noise, volume)?;
    let weights = WeightModel::new(sigma, DirectionPolicy::Symmetric)?;
    let terms = PottsTerms::new(volume, &weights);

    let mut labels: Vec<u16> = seeded
        .iter()
        .map(|&class| if class == FREE { 0 } else { class })
        .collect();
    let mut energy = terms.energy(&labels);
    debug!(
        classes = classes.len(),
        sigma,
        initial_energy = energy,
        "starting alpha-expansion"
    );

    // Class count is bounded by the label range.
    #[allow(clippy::cast_possible_truncation)]
    let class_count = classes.len() as u16;
    let mut cycles = 0usize;
    let mut accepted_moves = 0usize;
    while cycles < params.max_cycles {
        cycles += 1;
        let mut improved = false;
        for alpha in 0..class_count {
            let mut graph = params.solver.create(dims)?;
            let proposal = expansion_move(graph.as_mut(), &terms, &labels, &seeded, alpha)?;
            let candidate = terms.energy(&proposal);
            if candidate < energy * (1.0 - ENERGY_TOLERANCE) {
                debug!(cycle = cycles, alpha, energy = candidate, "expansion accepted");
                labels = proposal;
                energy = candidate;
                accepted_moves += 1;
                improved = true;
            }
        }
        if !improved {
            break;
        }
    }

    let output = labels.iter().map(|&class| params.label_of(class)).collect();
    let labels = Volume::from_vec(dims, output)?.with_geometry(*volume.geometry());
    info!(
        classes = classes.len(),
        cycles,
        accepted_moves,
        energy,
        "multi-label segmentation complete"
    );
    Ok(MultiLabelOutput {
        labels,
        energy,
        cycles,
        accepted_moves,
    })
}
