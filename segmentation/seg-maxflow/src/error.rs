//! Error types for graph construction and solving.

use seg_types::VolumeError;

/// Result type for max-flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors raised by [`crate::MaxFlowGraph`] backends.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum FlowError {
    /// An edge or terminal weight was added after `solve()`.
    #[error("graph cannot be modified after solve")]
    GraphMutationAfterSolve,

    /// `solve()` was called a second time.
    #[error("graph has already been solved")]
    AlreadySolved,

    /// A result was queried before `solve()`.
    #[error("graph has not been solved yet")]
    NotSolved,

    /// A node id is outside the graph.
    #[error("node {node} is out of range for a graph of {node_count} nodes")]
    NodeOutOfRange {
        /// Raw node id.
        node: u32,
        /// Number of nodes in the graph.
        node_count: usize,
    },

    /// An edge connects a node to itself.
    #[error("self-loop on node {node}")]
    SelfLoop {
        /// Raw node id.
        node: u32,
    },

    /// A capacity is negative or NaN.
    #[error("invalid capacity {value}")]
    InvalidCapacity {
        /// The rejected capacity.
        value: f64,
    },

    /// The grid backend only accepts 6-connected neighbor pairs.
    #[error("nodes {a} and {b} are not grid neighbors")]
    NonGridEdge {
        /// First endpoint.
        a: u32,
        /// Second endpoint.
        b: u32,
    },

    /// The grid dimensions cannot back a graph (empty, or too many voxels for
    /// `u32` node ids).
    #[error("invalid grid: {0}")]
    Grid(#[from] VolumeError),

    /// Solving was cancelled through the cancel flag.
    #[error("solve cancelled")]
    Cancelled,

    /// The backend failed for an internal reason (e.g. allocation).
    #[error("solver failure: {0}")]
    Solver(String),
}

impl FlowError {
    /// Creates a solver failure.
    #[must_use]
    pub fn solver(message: impl Into<String>) -> Self {
        Self::Solver(message.into())
    }

    /// Returns true for lifecycle misuse (mutation after solve, double solve,
    /// query before solve).
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::GraphMutationAfterSolve | Self::AlreadySolved | Self::NotSolved
        )
    }

    /// Returns true if the grid dimensions were rejected.
    #[must_use]
    pub const fn is_grid_error(&self) -> bool {
        matches!(self, Self::Grid(_))
    }

    /// Returns true if this error came from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
