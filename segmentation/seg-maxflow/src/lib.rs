//! Max-flow / min-cut backends for voxel graph cuts.
//!
//! Every backend implements the [`MaxFlowGraph`] trait: edges and terminal
//! weights go in, [`MaxFlowGraph::solve`] runs once, and
//! [`MaxFlowGraph::partition_of`] reports which side of the minimum cut each
//! node ended up on.
//!
//! # Backends
//!
//! | Backend | Representation | Strategy |
//! |---------|----------------|----------|
//! | [`AdjacencyGraph`] | Linked arc lists, paired sister arcs | Boykov-Kolmogorov search trees |
//! | [`LayeredGraph`] | Edge list, packed to forward-star at solve | BFS level graph + blocking flow |
//! | [`GridGraph`] | Implicit 6-connected arcs, `6 * N` capacities | Boykov-Kolmogorov search trees |
//!
//! [`SolverKind`] selects a backend at runtime and builds it boxed.
//!
//! # Partition convention
//!
//! A node is [`Partition::Source`] iff it is reachable from the source in the
//! final residual graph. That set is the unique minimal source side of every
//! minimum cut, so all backends agree node for node. A graph without terminal
//! weights puts every node on the sink side.
//!
//! # Capacities
//!
//! Capacities are `f64`. [`CAPACITY_INFINITY`] (`f64::MAX`) stands in for
//! infinite terminal links, and terminal additions saturate at it.
//!
//! # Example
//!
//! ```
//! use seg_maxflow::{AdjacencyGraph, MaxFlowGraph, Partition, CAPACITY_INFINITY};
//! use seg_types::NodeId;
//!
//! let mut graph = AdjacencyGraph::new(3);
//! graph.add_boundary_edge(NodeId(0), NodeId(1), 1.0, 1.0).unwrap();
//! graph.add_boundary_edge(NodeId(1), NodeId(2), 5.0, 5.0).unwrap();
//! graph.set_terminal_weights(NodeId(0), CAPACITY_INFINITY, 0.0).unwrap();
//! graph.set_terminal_weights(NodeId(2), 0.0, CAPACITY_INFINITY).unwrap();
//!
//! let flow = graph.solve().unwrap();
//! assert_eq!(flow, 1.0);
//! assert_eq!(graph.partition_of(NodeId(0)).unwrap(), Partition::Source);
//! assert_eq!(graph.partition_of(NodeId(1)).unwrap(), Partition::Sink);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adjacency;
pub mod grid;
pub mod layered;

mod bk;
mod error;
mod graph;
mod kind;
mod topology;

pub use adjacency::AdjacencyGraph;
pub use error::{FlowError, FlowResult};
pub use graph::{CAPACITY_INFINITY, MaxFlowGraph, Partition, SATURATION_TOLERANCE, expected_edge_count};
pub use grid::GridGraph;
pub use kind::SolverKind;
pub use layered::LayeredGraph;
