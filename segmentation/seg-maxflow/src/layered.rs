//! Breadth-first layered backend (Dinic).
//!
//! Edges are appended to a plain list while building. `solve()` packs them
//! into a forward-star layout (arcs grouped by tail), then alternates two
//! phases until the sink is unreachable: a BFS from the source assigns
//! distance labels, and a depth-first blocking flow saturates every shortest
//! augmenting path in that level graph.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use seg_types::NodeId;
use tracing::debug;

use crate::graph::{
    Solution, Terminals, check_edge, consume, is_cancelled, saturating_add, solution_flow,
    solution_partition,
};
use crate::topology::Topology;
use crate::{FlowError, FlowResult, MaxFlowGraph, Partition, graph};

const UNLEVELED: u32 = u32::MAX;

/// Augmentations between cancel-flag reads.
const CANCEL_CHECK_INTERVAL: u32 = 1024;

#[derive(Debug, Clone, Copy)]
struct EdgeRecord {
    a: u32,
    b: u32,
    cap_ab: f64,
    cap_ba: f64,
}

/// Arc structure packed by tail node. Arc `2k` is edge `k` forward, `2k + 1`
/// the same edge backward.
#[derive(Debug, Default)]
struct ForwardStar {
    start: Vec<usize>,
    arcs: Vec<usize>,
    heads: Vec<u32>,
}

impl ForwardStar {
    fn pack(node_count: usize, edges: &[EdgeRecord]) -> Self {
        let mut start = vec![0usize; node_count + 1];
        for e in edges {
            start[e.a as usize + 1] += 1;
            start[e.b as usize + 1] += 1;
        }
        for i in 0..node_count {
            start[i + 1] += start[i];
        }
        let mut fill = start.clone();
        let mut arcs = vec![0usize; edges.len() * 2];
        let mut heads = vec![0u32; edges.len() * 2];
        for (k, e) in edges.iter().enumerate() {
            arcs[fill[e.a as usize]] = 2 * k;
            fill[e.a as usize] += 1;
            arcs[fill[e.b as usize]] = 2 * k + 1;
            fill[e.b as usize] += 1;
            heads[2 * k] = e.b;
            heads[2 * k + 1] = e.a;
        }
        Self { start, arcs, heads }
    }
}

impl Topology for ForwardStar {
    fn node_count(&self) -> usize {
        self.start.len().saturating_sub(1)
    }

    fn arcs(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.arcs[self.start[node]..self.start[node + 1]].iter().copied()
    }

    fn head(&self, arc: usize) -> usize {
        self.heads[arc] as usize
    }

    fn sister(&self, arc: usize) -> usize {
        arc ^ 1
    }
}

/// Edge-list graph solved by BFS level graphs and blocking flows.
#[derive(Debug)]
pub struct LayeredGraph {
    node_count: usize,
    edges: Vec<EdgeRecord>,
    terminals: Option<Terminals>,
    cancel: Option<Arc<AtomicBool>>,
    solution: Option<Solution>,
}

impl LayeredGraph {
    /// Creates a graph with `node_count` nodes and no edges.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
            terminals: Some(Terminals::new(node_count)),
            cancel: None,
            solution: None,
        }
    }

    /// Creates a graph with storage reserved for `edge_hint` edges.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Solver`] if the edge list cannot be allocated.
    pub fn with_capacity(node_count: usize, edge_hint: usize) -> FlowResult<Self> {
        let mut graph = Self::new(node_count);
        graph
            .edges
            .try_reserve_exact(edge_hint)
            .map_err(|e| FlowError::solver(format!("cannot reserve {edge_hint} edges: {e}")))?;
        Ok(graph)
    }
}

/// Mutable state of one Dinic run.
struct Dinic<'a> {
    star: &'a ForwardStar,
    r_cap: Vec<f64>,
    src_res: Vec<f64>,
    sink_res: Vec<f64>,
    level: Vec<u32>,
    /// Current-arc cursor into `star.arcs` per node.
    cursor: Vec<usize>,
    flow: f64,
    augmentations: u32,
}

impl Dinic<'_> {
    /// Assigns BFS levels from the source. Returns the level of the sink.
    fn build_levels(&mut self) -> Option<u32> {
        self.level.fill(UNLEVELED);
        let mut queue = VecDeque::new();
        for (u, &res) in self.src_res.iter().enumerate() {
            if res > 0.0 {
                self.level[u] = 1;
                queue.push_back(u);
            }
        }
        let mut sink_level: Option<u32> = None;
        while let Some(u) = queue.pop_front() {
            let next = self.level[u] + 1;
            if sink_level.is_some_and(|l| next > l) {
                break;
            }
            if self.sink_res[u] > 0.0 {
                sink_level = Some(sink_level.map_or(next, |l| l.min(next)));
            }
            for arc in self.star.arcs(u) {
                let v = self.star.head(arc);
                if self.level[v] == UNLEVELED && self.r_cap[arc] > 0.0 {
                    self.level[v] = next;
                    queue.push_back(v);
                }
            }
        }
        sink_level
    }

    /// Saturates every shortest path in the current level graph.
    fn blocking_flow(
        &mut self,
        sink_level: u32,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> FlowResult<()> {
        let n = self.level.len();
        self.cursor.copy_from_slice(&self.star.start[..n]);
        let mut path: Vec<usize> = Vec::new();

        for root in 0..self.level.len() {
            if self.level[root] != 1 {
                continue;
            }
            path.clear();
            let mut u = root;
            while self.src_res[root] > 0.0 && self.level[root] != UNLEVELED {
                if self.level[u] + 1 == sink_level && self.sink_res[u] > 0.0 {
                    self.augment(root, u, &path);
                    self.augmentations = self.augmentations.wrapping_add(1);
                    if self.augmentations % CANCEL_CHECK_INTERVAL == 0 && is_cancelled(cancel) {
                        return Err(FlowError::Cancelled);
                    }
                    path.clear();
                    u = root;
                    continue;
                }
                match self.advance(u, sink_level) {
                    Some(arc) => {
                        path.push(arc);
                        u = self.star.head(arc);
                    }
                    None => {
                        // Dead end: drop u from the level graph and retreat.
                        self.level[u] = UNLEVELED;
                        match path.pop() {
                            Some(arc) => u = self.star.head(self.star.sister(arc)),
                            None => break,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Moves the cursor of `u` to the next admissible arc.
    fn advance(&mut self, u: usize, sink_level: u32) -> Option<usize> {
        let end = self.star.start[u + 1];
        let next_level = self.level[u] + 1;
        while self.cursor[u] < end {
            let arc = self.star.arcs[self.cursor[u]];
            let v = self.star.head(arc);
            if self.r_cap[arc] > 0.0 && self.level[v] == next_level && next_level < sink_level {
                return Some(arc);
            }
            self.cursor[u] += 1;
        }
        None
    }

    fn augment(&mut self, root: usize, last: usize, path: &[usize]) {
        let mut bottleneck = self.src_res[root].min(self.sink_res[last]);
        for &arc in path {
            bottleneck = bottleneck.min(self.r_cap[arc]);
        }
        self.src_res[root] = consume(self.src_res[root], bottleneck);
        self.sink_res[last] = consume(self.sink_res[last], bottleneck);
        for &arc in path {
            self.r_cap[arc] = consume(self.r_cap[arc], bottleneck);
            let sister = self.star.sister(arc);
            self.r_cap[sister] += bottleneck;
        }
        self.flow += bottleneck;
    }
}

impl MaxFlowGraph for LayeredGraph {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
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
        let (_, _, cap_ab, cap_ba) = check_edge(a, b, cap_ab, cap_ba, self.node_count)?;
        self.edges.push(EdgeRecord {
            a: a.raw(),
            b: b.raw(),
            cap_ab,
            cap_ba,
        });
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
        if is_cancelled(self.cancel.as_ref()) {
            return Err(FlowError::Cancelled);
        }
        let (signed, base_flow) = terminals.into_signed();

        let star = ForwardStar::pack(self.node_count, &self.edges);
        let r_cap = self
            .edges
            .iter()
            .flat_map(|e| [e.cap_ab, e.cap_ba])
            .collect();
        let mut dinic = Dinic {
            star: &star,
            r_cap,
            src_res: signed.iter().map(|&c| c.max(0.0)).collect(),
            sink_res: signed.iter().map(|&c| (-c).max(0.0)).collect(),
            level: vec![UNLEVELED; self.node_count],
            cursor: vec![0; self.node_count],
            flow: 0.0,
            augmentations: 0,
        };

        let mut phases = 0usize;
        while let Some(sink_level) = dinic.build_levels() {
            if is_cancelled(self.cancel.as_ref()) {
                return Err(FlowError::Cancelled);
            }
            dinic.blocking_flow(sink_level, self.cancel.as_ref())?;
            phases += 1;
        }

        let source_side = graph::source_reachable(&star, |u| dinic.src_res[u], &dinic.r_cap);
        let flow = saturating_add(base_flow, dinic.flow);
        debug!(
            backend = self.name(),
            nodes = self.node_count,
            edges = self.edges.len(),
            phases,
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
