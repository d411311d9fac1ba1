//! The backend trait and the pieces every backend shares.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use seg_types::{GridDims, NodeId};

use crate::topology::Topology;
use crate::{FlowError, FlowResult};

/// Capacity used for "infinite" terminal links.
///
/// Terminal weight sums saturate here instead of overflowing to `+inf`.
pub const CAPACITY_INFINITY: f64 = f64::MAX;

/// Fraction of an arc's residual a push may leave behind and still saturate
/// the arc.
///
/// Relative to the residual before the push, so arcs of any magnitude keep
/// their capacity; only the rounding remnant of `r - b` with `b ~= r` is
/// dropped. Backends snap such remnants to exactly zero, and the partition
/// treats exactly zero as saturated.
pub const SATURATION_TOLERANCE: f64 = 1e-12;

/// Side of the minimum cut a node ends up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Partition {
    /// Reachable from the source in the residual graph.
    Source,
    /// Everything else.
    Sink,
}

impl Partition {
    /// Returns true for [`Partition::Source`].
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::Source)
    }
}

/// Number of undirected 6-connected neighbor pairs in a grid, for pre-sizing.
///
/// `3*nx*ny*nz - nx*ny - ny*nz - nx*nz`; zero for an empty grid.
#[must_use]
pub const fn expected_edge_count(dims: GridDims) -> usize {
    dims.expected_edge_count()
}

/// A capacitated graph with a source and a sink terminal.
///
/// Lifecycle is one-way: build (`add_boundary_edge`, `set_terminal_weights`),
/// then `solve()` once, then query `partition_of`. Out-of-order calls return
/// the corresponding [`FlowError`] and leave the graph unchanged.
pub trait MaxFlowGraph: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Number of non-terminal nodes.
    fn node_count(&self) -> usize;

    /// Number of boundary edges added so far.
    fn edge_count(&self) -> usize;

    /// Adds a pair of directed arcs between `a` and `b`.
    ///
    /// # Errors
    ///
    /// [`FlowError::GraphMutationAfterSolve`] after solving,
    /// [`FlowError::NodeOutOfRange`], [`FlowError::SelfLoop`] and
    /// [`FlowError::InvalidCapacity`] for bad input.
    fn add_boundary_edge(&mut self, a: NodeId, b: NodeId, cap_ab: f64, cap_ba: f64)
    -> FlowResult<()>;

    /// Adds terminal capacities to `node`. Repeated calls accumulate.
    ///
    /// # Errors
    ///
    /// [`FlowError::GraphMutationAfterSolve`] after solving,
    /// [`FlowError::NodeOutOfRange`] and [`FlowError::InvalidCapacity`].
    fn set_terminal_weights(&mut self, node: NodeId, source_cap: f64, sink_cap: f64)
    -> FlowResult<()>;

    /// Installs a flag that aborts `solve()` with [`FlowError::Cancelled`]
    /// once it reads `true`.
    fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>);

    /// Computes the maximum flow and returns its value.
    ///
    /// # Errors
    ///
    /// [`FlowError::AlreadySolved`] on a second call, [`FlowError::Cancelled`]
    /// if cancelled, [`FlowError::Solver`] on internal failure.
    fn solve(&mut self) -> FlowResult<f64>;

    /// Returns true once `solve()` has succeeded.
    fn is_solved(&self) -> bool;

    /// Value of the maximum flow.
    ///
    /// # Errors
    ///
    /// [`FlowError::NotSolved`] before solving.
    fn flow_value(&self) -> FlowResult<f64>;

    /// Side of the minimum cut for `node`.
    ///
    /// # Errors
    ///
    /// [`FlowError::NotSolved`] before solving, [`FlowError::NodeOutOfRange`].
    fn partition_of(&self, node: NodeId) -> FlowResult<Partition>;
}

/// Checks that `node` addresses one of `node_count` nodes.
pub(crate) fn check_node(node: NodeId, node_count: usize) -> FlowResult<usize> {
    if node.index() < node_count {
        Ok(node.index())
    } else {
        Err(FlowError::NodeOutOfRange {
            node: node.raw(),
            node_count,
        })
    }
}

/// Rejects negative and NaN capacities; clamps `+inf` to the sentinel.
pub(crate) fn check_capacity(value: f64) -> FlowResult<f64> {
    if value.is_nan() || value < 0.0 {
        Err(FlowError::InvalidCapacity { value })
    } else {
        Ok(value.min(CAPACITY_INFINITY))
    }
}

/// Validates both endpoints and capacities of a boundary edge.
pub(crate) fn check_edge(
    a: NodeId,
    b: NodeId,
    cap_ab: f64,
    cap_ba: f64,
    node_count: usize,
) -> FlowResult<(usize, usize, f64, f64)> {
    let ia = check_node(a, node_count)?;
    let ib = check_node(b, node_count)?;
    if ia == ib {
        return Err(FlowError::SelfLoop { node: a.raw() });
    }
    Ok((ia, ib, check_capacity(cap_ab)?, check_capacity(cap_ba)?))
}

/// Adds two capacities, saturating at [`CAPACITY_INFINITY`].
#[inline]
pub(crate) fn saturating_add(a: f64, b: f64) -> f64 {
    (a + b).min(CAPACITY_INFINITY)
}

/// Per-node source and sink capacities, accumulated before solving.
#[derive(Debug, Clone, Default)]
pub(crate) struct Terminals {
    source: Vec<f64>,
    sink: Vec<f64>,
}

impl Terminals {
    pub(crate) fn new(node_count: usize) -> Self {
        Self {
            source: vec![0.0; node_count],
            sink: vec![0.0; node_count],
        }
    }

    pub(crate) fn add(&mut self, node: NodeId, source_cap: f64, sink_cap: f64) -> FlowResult<()> {
        let i = check_node(node, self.source.len())?;
        let source_cap = check_capacity(source_cap)?;
        let sink_cap = check_capacity(sink_cap)?;
        self.source[i] = saturating_add(self.source[i], source_cap);
        self.sink[i] = saturating_add(self.sink[i], sink_cap);
        Ok(())
    }

    /// Cancels the shared part of each node's two terminal links.
    ///
    /// Returns the signed residual `source - sink` per node and the flow that
    /// the cancelled part already carries.
    pub(crate) fn into_signed(self) -> (Vec<f64>, f64) {
        let mut base_flow = 0.0;
        let signed = self
            .source
            .iter()
            .zip(&self.sink)
            .map(|(&s, &t)| {
                base_flow = saturating_add(base_flow, s.min(t));
                s - t
            })
            .collect();
        (signed, base_flow)
    }
}

/// Result of a finished solve.
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub(crate) flow: f64,
    pub(crate) source_side: Vec<bool>,
}

impl Solution {
    pub(crate) fn partition_of(&self, node: NodeId) -> FlowResult<Partition> {
        let i = check_node(node, self.source_side.len())?;
        Ok(if self.source_side[i] {
            Partition::Source
        } else {
            Partition::Sink
        })
    }
}

/// Shared answer to the post-solve queries.
pub(crate) fn solution_flow(solution: Option<&Solution>) -> FlowResult<f64> {
    solution.map(|s| s.flow).ok_or(FlowError::NotSolved)
}

/// Shared answer to `partition_of`.
pub(crate) fn solution_partition(solution: Option<&Solution>, node: NodeId) -> FlowResult<Partition> {
    solution.ok_or(FlowError::NotSolved)?.partition_of(node)
}

/// Residual left after pushing `amount` through `residual`, snapped to zero
/// when at most [`SATURATION_TOLERANCE`] of `residual` remains.
#[inline]
pub(crate) fn consume(residual: f64, amount: f64) -> f64 {
    let left = residual - amount;
    if left <= residual * SATURATION_TOLERANCE {
        0.0
    } else {
        left
    }
}

/// Reads an optional cancel flag.
#[inline]
pub(crate) fn is_cancelled(flag: Option<&Arc<AtomicBool>>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Marks every node reachable from the source in the residual graph.
///
/// `source_residual(u)` is the residual capacity of the source link into `u`;
/// `r_cap[arc]` the residual capacity of each arc.
pub(crate) fn source_reachable<T: Topology>(
    topology: &T,
    source_residual: impl Fn(usize) -> f64,
    r_cap: &[f64],
) -> Vec<bool> {
    let n = topology.node_count();
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    for (u, mark) in seen.iter_mut().enumerate() {
        if source_residual(u) > 0.0 {
            *mark = true;
            queue.push_back(u);
        }
    }
    while let Some(u) = queue.pop_front() {
        for arc in topology.arcs(u) {
            let v = topology.head(arc);
            if !seen[v] && r_cap[arc] > 0.0 {
                seen[v] = true;
                queue.push_back(v);
            }
        }
    }
    seen
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Arcs `2k` and `2k + 1` join the ends of link `k` in both directions.
    #[derive(Default)]
    struct Chain {
        links: Vec<(usize, usize)>,
        nodes: usize,
    }

    impl Chain {
        fn link(&mut self, a: usize, b: usize) {
            self.links.push((a, b));
            self.nodes = self.nodes.max(a.max(b) + 1);
        }
    }

    impl Topology for Chain {
        fn node_count(&self) -> usize {
            self.nodes
        }

        fn arcs(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
            (0..self.links.len() * 2).filter(move |&arc| self.head(arc ^ 1) == node)
        }

        fn head(&self, arc: usize) -> usize {
            let (a, b) = self.links[arc / 2];
            if arc % 2 == 0 { b } else { a }
        }

        fn sister(&self, arc: usize) -> usize {
            arc ^ 1
        }
    }

    #[test]
    fn test_check_capacity() {
        assert!(check_capacity(-1.0).is_err());
        assert!(check_capacity(f64::NAN).is_err());
        assert_relative_eq!(check_capacity(2.5).unwrap(), 2.5);
        assert_eq!(check_capacity(f64::INFINITY).unwrap(), CAPACITY_INFINITY);
    }

    #[test]
    fn test_check_edge() {
        assert_eq!(
            check_edge(NodeId(1), NodeId(1), 1.0, 1.0, 4),
            Err(FlowError::SelfLoop { node: 1 })
        );
        assert!(matches!(
            check_edge(NodeId(0), NodeId(4), 1.0, 1.0, 4),
            Err(FlowError::NodeOutOfRange { node: 4, .. })
        ));
        assert_eq!(
            check_edge(NodeId(0), NodeId(3), 1.0, 0.0, 4).unwrap(),
            (0, 3, 1.0, 0.0)
        );
    }

    #[test]
    fn test_terminal_saturation() {
        let mut terminals = Terminals::new(2);
        terminals.add(NodeId(0), CAPACITY_INFINITY, 0.0).unwrap();
        terminals.add(NodeId(0), CAPACITY_INFINITY, 0.0).unwrap();
        terminals.add(NodeId(1), 3.0, 1.0).unwrap();
        let (signed, base) = terminals.into_signed();
        assert_eq!(signed[0], CAPACITY_INFINITY);
        assert_relative_eq!(signed[1], 2.0);
        assert_relative_eq!(base, 1.0);
    }

    #[test]
    fn test_consume_snaps_rounding_remnants() {
        assert_eq!(consume(0.3, 0.1 + 0.2), 0.0);
        let left = consume(0.3, 0.1);
        assert_relative_eq!(left, 0.2);
        assert_eq!(consume(left, 0.2), 0.0);
        // Tiny capacities are not rounded away.
        assert_relative_eq!(consume(2e-22, 1e-22), 1e-22, max_relative = 1e-12);
        assert_eq!(consume(CAPACITY_INFINITY, 1.0), CAPACITY_INFINITY);
    }

    #[test]
    fn test_reachability_follows_tiny_residuals() {
        // 0 -> 1 -> 2 with residuals far below any absolute tolerance.
        let mut topology = Chain::default();
        topology.link(0, 1);
        topology.link(1, 2);
        let r_cap = [1e-22, 0.0, 0.0, 0.0];
        let seen = source_reachable(&topology, |u| if u == 0 { 1e-30 } else { 0.0 }, &r_cap);
        assert_eq!(seen, vec![true, true, false]);
    }

    #[test]
    fn test_expected_edge_count() {
        assert_eq!(expected_edge_count(GridDims::new(10, 10, 10)), 2700);
        assert_eq!(expected_edge_count(GridDims::new(2, 1, 1)), 1);
    }
}
