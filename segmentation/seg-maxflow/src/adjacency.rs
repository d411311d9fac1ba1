//! Adjacency-list backend solved with Boykov-Kolmogorov search trees.
//!
//! Arcs live in flat vectors. Each boundary edge adds two arcs at ids `2k`
//! and `2k + 1`, so the sister of an arc is `arc ^ 1`. Per-node arc lists are
//! singly linked through `next`, newest first.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use seg_types::NodeId;
use tracing::debug;

use crate::graph::{Solution, Terminals, check_edge, solution_flow, solution_partition};
use crate::topology::Topology;
use crate::{FlowError, FlowResult, MaxFlowGraph, Partition, bk, graph};

const NO_ARC: usize = usize::MAX;

/// General graph stored as linked adjacency lists.
///
/// Accepts any node pair, so it also serves non-grid graphs such as the
/// alpha-expansion moves.
#[derive(Debug)]
pub struct AdjacencyGraph {
    first: Vec<usize>,
    next: Vec<usize>,
    head: Vec<u32>,
    r_cap: Vec<f64>,
    terminals: Option<Terminals>,
    tr_cap: Vec<f64>,
    edge_count: usize,
    cancel: Option<Arc<AtomicBool>>,
    solution: Option<Solution>,
}

impl AdjacencyGraph {
    /// Creates a graph with `node_count` nodes and no edges.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            first: vec![NO_ARC; node_count],
            next: Vec::new(),
            head: Vec::new(),
            r_cap: Vec::new(),
            terminals: Some(Terminals::new(node_count)),
            tr_cap: Vec::new(),
            edge_count: 0,
            cancel: None,
            solution: None,
        }
    }

    /// Creates a graph with storage reserved for `edge_hint` boundary edges.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Solver`] if the arc storage cannot be allocated.
    pub fn with_capacity(node_count: usize, edge_hint: usize) -> FlowResult<Self> {
        let mut graph = Self::new(node_count);
        let arcs = edge_hint.saturating_mul(2);
        graph
            .next
            .try_reserve_exact(arcs)
            .and_then(|()| graph.head.try_reserve_exact(arcs))
            .and_then(|()| graph.r_cap.try_reserve_exact(arcs))
            .map_err(|e| FlowError::solver(format!("cannot reserve {arcs} arcs: {e}")))?;
        Ok(graph)
    }

    fn push_arc(&mut self, from: usize, to: usize, cap: f64) {
        let id = self.head.len();
        // Node ids were validated against a u32-addressable grid.
        self.head.push(u32::try_from(to).unwrap_or(u32::MAX));
        self.r_cap.push(cap);
        self.next.push(self.first[from]);
        self.first[from] = id;
    }
}

impl Topology for AdjacencyGraph {
    fn node_count(&self) -> usize {
        self.first.len()
    }

    fn arcs(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.first[node];
        std::iter::successors((start != NO_ARC).then_some(start), move |&arc| {
            let next = self.next[arc];
            (next != NO_ARC).then_some(next)
        })
    }

    fn head(&self, arc: usize) -> usize {
        self.head[arc] as usize
    }

    fn sister(&self, arc: usize) -> usize {
        arc ^ 1
    }
}

impl MaxFlowGraph for AdjacencyGraph {
    fn name(&self) -> &'static str {
        "adjacency"
    }

    fn node_count(&self) -> usize {
        self.first.len()
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
        let (ia, ib, cap_ab, cap_ba) = check_edge(a, b, cap_ab, cap_ba, self.first.len())?;
        self.push_arc(ia, ib, cap_ab);
        self.push_arc(ib, ia, cap_ba);
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

        let source_side =
            graph::source_reachable(&*self, |u| self.tr_cap[u], &self.r_cap);
        let flow = graph::saturating_add(base_flow, augmented);
        debug!(
            backend = self.name(),
            nodes = self.first.len(),
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
