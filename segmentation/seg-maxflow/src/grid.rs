//! Structured-grid backend with implicit 6-connected arcs.
//!
//! No adjacency lists are stored. Arc `node * 6 + d` leaves `node` in
//! direction `d` (see [`Direction`]), its sister is
//! `neighbor * 6 + opposite(d)`, and capacities sit in one flat vector of
//! `6 * N` entries. Border arcs exist in the vector but are never visited.
//! Solved with the shared Boykov-Kolmogorov engine.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use seg_types::{Direction, GridDims, NodeId, VoxelIndexer};
use tracing::debug;

use crate::graph::{
    Solution, Terminals, check_edge, saturating_add, solution_flow, solution_partition,
};
use crate::topology::Topology;
use crate::{FlowError, FlowResult, MaxFlowGraph, Partition, bk, graph};

const DIRECTIONS: usize = 6;

/// Flow graph over a fixed 6-connected voxel grid.
#[derive(Debug)]
pub struct GridGraph {
    dims: GridDims,
    node_count: usize,
    /// Signed linear offset per direction.
    offsets: [isize; DIRECTIONS],
    /// Bit `d` set when the node has a neighbor in direction `d`.
    neighbor_mask: Vec<u8>,
    r_cap: Vec<f64>,
    terminals: Option<Terminals>,
    tr_cap: Vec<f64>,
    edge_count: usize,
    cancel: Option<Arc<AtomicBool>>,
    solution: Option<Solution>,
}

impl GridGraph {
    /// Creates a grid graph with all capacities zero.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Grid`] if the dimensions are empty or too large
    /// for `u32` node ids, and [`FlowError::Solver`] if the capacity planes
    /// cannot be allocated.
    pub fn new(dims: GridDims) -> FlowResult<Self> {
        let indexer = VoxelIndexer::new(dims)?;
        let node_count = indexer.node_count();

        let mut r_cap = Vec::new();
        r_cap
            .try_reserve_exact(node_count * DIRECTIONS)
            .map_err(|e| FlowError::solver(format!("cannot allocate capacity planes: {e}")))?;
        r_cap.resize(node_count * DIRECTIONS, 0.0);

        let neighbor_mask = indexer
            .iter_nodes()
            .map(|node| {
                Direction::ALL
                    .iter()
                    .filter(|&&d| indexer.neighbor(node, d).is_some())
                    .fold(0u8, |mask, d| mask | (1 << d.index()))
            })
            .collect();

        // Grid extents fit u32, so they fit isize on every supported target.
        let nx = isize::try_from(dims.nx).unwrap_or(isize::MAX);
        let slice = isize::try_from(dims.slice_len()).unwrap_or(isize::MAX);

        Ok(Self {
            dims,
            node_count,
            offsets: [1, -1, nx, -nx, slice, -slice],
            neighbor_mask,
            r_cap,
            terminals: Some(Terminals::new(node_count)),
            tr_cap: Vec::new(),
            edge_count: 0,
            cancel: None,
            solution: None,
        })
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    #[inline]
    fn has_neighbor(&self, node: usize, dir: usize) -> bool {
        self.neighbor_mask[node] & (1 << dir) != 0
    }

    #[inline]
    fn neighbor_unchecked(&self, node: usize, dir: usize) -> usize {
        node.wrapping_add_signed(self.offsets[dir])
    }

    /// Direction leading from `a` to `b`, if they are grid neighbors.
    fn direction_between(&self, a: usize, b: usize) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| {
            self.has_neighbor(a, d.index()) && self.neighbor_unchecked(a, d.index()) == b
        })
    }
}

impl Topology for GridGraph {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn arcs(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        (0..DIRECTIONS)
            .filter(move |&d| self.has_neighbor(node, d))
            .map(move |d| node * DIRECTIONS + d)
    }

    fn head(&self, arc: usize) -> usize {
        self.neighbor_unchecked(arc / DIRECTIONS, arc % DIRECTIONS)
    }

    fn sister(&self, arc: usize) -> usize {
        // Directions are paired so that opposite(d) == d ^ 1.
        self.head(arc) * DIRECTIONS + ((arc % DIRECTIONS) ^ 1)
    }
}

impl MaxFlowGraph for GridGraph {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn add_boundary_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        cap_ab: f64,
        cap_ba: f64,
    ) -> FlowResult<()> {
        if self.solution.is_some() {
            return Err(FlowError::GraphMutationAfterSolve);
        }
        let (ia, ib, cap_ab, cap_ba) = check_edge(a, b, cap_ab, cap_ba, self.node_count)?;
        let dir = self
            .direction_between(ia, ib)
            .ok_or(FlowError::NonGridEdge {
                a: a.raw(),
                b: b.raw(),
            })?;
        let forward = ia * DIRECTIONS + dir.index();
        let reverse = ib * DIRECTIONS + dir.opposite().index();
        self.r_cap[forward] = saturating_add(self.r_cap[forward], cap_ab);
        self.r_cap[reverse] = saturating_add(self.r_cap[reverse], cap_ba);
        self.edge_count += 1;
        Ok(())
    }

    fn set_terminal_weights(
        &mut self,
        node: NodeId,
        source_cap: f64,
        sink_cap: f64,
    ) -> FlowResult<()> {
        match self.terminals.as_mut() {
            Some(terminals) if self.solution.is_none() => {
                terminals.add(node, source_cap, sink_cap)
            }
            _ => Err(FlowError::GraphMutationAfterSolve),
        }
    }

    fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn solve(&mut self) -> FlowResult<f64> {
        if self.solution.is_some() {
            return Err(FlowError::AlreadySolved);
        }
        let terminals = self.terminals.take().ok_or(FlowError::AlreadySolved)?;
        let (mut tr_cap, base_flow) = terminals.into_signed();
        let mut r_cap = std::mem::take(&mut self.r_cap);
        let result = bk::solve(&*self, &mut r_cap, &mut tr_cap, self.cancel.as_ref());
        self.r_cap = r_cap;
        self.tr_cap = tr_cap;
        let augmented = result?;

        let source_side = graph::source_reachable(&*self, |u| self.tr_cap[u], &self.r_cap);
        let flow = saturating_add(base_flow, augmented);
        debug!(
            backend = self.name(),
            dims = %self.dims,
            edges = self.edge_count,
            flow,
            "max-flow solved"
        );
        self.solution = Some(Solution { flow, source_side });
        Ok(flow)
    }

    fn is_solved(&self) -> bool {
        self.solution.is_some()
    }

    fn flow_value(&self) -> FlowResult<f64> {
        solution_flow(self.solution.as_ref())
    }

    fn partition_of(&self, node: NodeId) -> FlowResult<Partition> {
        solution_partition(self.solution.as_ref(), node)
    }
}
