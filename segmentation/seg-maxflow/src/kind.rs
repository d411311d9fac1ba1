//! Runtime backend selection.

use std::fmt;

use seg_types::{GridDims, VoxelIndexer};

use crate::{
    AdjacencyGraph, FlowError, FlowResult, GridGraph, LayeredGraph, MaxFlowGraph,
    expected_edge_count,
};

/// Which max-flow backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverKind {
    /// [`AdjacencyGraph`]: Boykov-Kolmogorov on linked adjacency lists.
    #[default]
    Adjacency,
    /// [`LayeredGraph`]: Dinic level graphs with blocking flow.
    Layered,
    /// [`GridGraph`]: Boykov-Kolmogorov on implicit 6-connected arcs.
    Grid,
}

impl SolverKind {
    /// Every backend.
    pub const ALL: [Self; 3] = [Self::Adjacency, Self::Layered, Self::Grid];

    /// Backend name, matching [`MaxFlowGraph::name`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Adjacency => "adjacency",
            Self::Layered => "layered",
            Self::Grid => "grid",
        }
    }

    /// Returns true if the backend accepts arbitrary node pairs, not only
    /// grid neighbors.
    #[must_use]
    pub const fn accepts_any_edge(self) -> bool {
        !matches!(self, Self::Grid)
    }

    /// Builds an empty backend sized for a voxel grid.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Grid`] if the grid is empty or too large, and
    /// [`FlowError::Solver`] if storage cannot be reserved.
    pub fn create(self, dims: GridDims) -> FlowResult<Box<dyn MaxFlowGraph>> {
        let indexer = VoxelIndexer::new(dims)?;
        let nodes = indexer.node_count();
        let edges = expected_edge_count(dims);
        Ok(match self {
            Self::Adjacency => Box::new(AdjacencyGraph::with_capacity(nodes, edges)?),
            Self::Layered => Box::new(LayeredGraph::with_capacity(nodes, edges)?),
            Self::Grid => Box::new(GridGraph::new(dims)?),
        })
    }

    /// Builds an empty backend for a general graph of `node_count` nodes.
    ///
    /// # Errors
    ///
    /// [`SolverKind::Grid`] needs grid dimensions and is rejected here with
    /// [`FlowError::Solver`]; the others fail only on allocation.
    pub fn create_general(
        self,
        node_count: usize,
        edge_hint: usize,
    ) -> FlowResult<Box<dyn MaxFlowGraph>> {
        match self {
            Self::Adjacency => Ok(Box::new(AdjacencyGraph::with_capacity(
                node_count, edge_hint,
            )?)),
            Self::Layered => Ok(Box::new(LayeredGraph::with_capacity(
                node_count, edge_hint,
            )?)),
            Self::Grid => Err(FlowError::solver(
                "grid backend requires grid dimensions",
            )),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
