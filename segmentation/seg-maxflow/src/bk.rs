//! Boykov-Kolmogorov augmenting-path engine.
//!
//! Two search trees grow from the terminals. When they touch, the path is
//! augmented; nodes whose tree link saturates become orphans and are either
//! re-adopted inside their tree or freed. The engine is generic over
//! [`Topology`] so the adjacency and grid backends share it.
//!
//! Terminal links are folded into one signed residual per node: positive
//! means residual capacity from the source, negative capacity to the sink.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::graph::{consume, is_cancelled};
use crate::topology::Topology;
use crate::{FlowError, FlowResult};

/// Parent marker: node is in no tree.
const NO_PARENT: usize = usize::MAX;
/// Parent marker: node hangs directly off its terminal.
const TERMINAL: usize = usize::MAX - 1;
/// Parent marker: node lost its tree link and awaits adoption.
const ORPHAN: usize = usize::MAX - 2;

/// Distance assigned when no route to a terminal exists.
const INFINITE_DIST: u32 = u32::MAX;

/// Main-loop iterations between cancel-flag reads.
const CANCEL_CHECK_INTERVAL: u32 = 1024;

struct Engine<'a, T: Topology> {
    topology: &'a T,
    r_cap: &'a mut [f64],
    tr_cap: &'a mut [f64],
    /// Arc from a node to its parent, or one of the markers.
    parent: Vec<usize>,
    in_sink: Vec<bool>,
    active: Vec<bool>,
    /// Time stamp of the last distance update.
    ts: Vec<u64>,
    dist: Vec<u32>,
    queue: VecDeque<usize>,
    orphans: VecDeque<usize>,
    time: u64,
    flow: f64,
}

/// Runs the engine to completion.
///
/// On return `r_cap` and `tr_cap` hold the final residual capacities and the
/// value of the augmented flow is returned. Flow already cancelled out of the
/// terminal links is not included.
pub(crate) fn solve<T: Topology>(
    topology: &T,
    r_cap: &mut [f64],
    tr_cap: &mut [f64],
    cancel: Option<&Arc<AtomicBool>>,
) -> FlowResult<f64> {
    let n = topology.node_count();
    let mut engine = Engine {
        topology,
        r_cap,
        tr_cap,
        parent: vec![NO_PARENT; n],
        in_sink: vec![false; n],
        active: vec![false; n],
        ts: vec![0; n],
        dist: vec![0; n],
        queue: VecDeque::new(),
        orphans: VecDeque::new(),
        time: 0,
        flow: 0.0,
    };
    engine.init();
    engine.run(cancel)?;
    Ok(engine.flow)
}

impl<T: Topology> Engine<'_, T> {
    fn init(&mut self) {
        for i in 0..self.tr_cap.len() {
            let cap = self.tr_cap[i];
            if cap > 0.0 {
                self.in_sink[i] = false;
            } else if cap < 0.0 {
                self.in_sink[i] = true;
            } else {
                continue;
            }
            self.parent[i] = TERMINAL;
            self.ts[i] = 0;
            self.dist[i] = 1;
            self.set_active(i);
        }
    }

    fn set_active(&mut self, i: usize) {
        if !self.active[i] {
            self.active[i] = true;
            self.queue.push_back(i);
        }
    }

    /// Pops the next active node that still belongs to a tree.
    fn next_active(&mut self) -> Option<usize> {
        while let Some(i) = self.queue.pop_front() {
            self.active[i] = false;
            if self.parent[i] != NO_PARENT {
                return Some(i);
            }
        }
        None
    }

    fn run(&mut self, cancel: Option<&Arc<AtomicBool>>) -> FlowResult<()> {
        let mut current: Option<usize> = None;
        let mut iterations: u32 = 0;
        if is_cancelled(cancel) {
            return Err(FlowError::Cancelled);
        }

        loop {
            iterations = iterations.wrapping_add(1);
            if iterations % CANCEL_CHECK_INTERVAL == 0 && is_cancelled(cancel) {
                return Err(FlowError::Cancelled);
            }

            let mut node = current.take().and_then(|i| {
                self.active[i] = false;
                (self.parent[i] != NO_PARENT).then_some(i)
            });
            if node.is_none() {
                node = self.next_active();
            }
            let Some(i) = node else {
                break;
            };

            let meeting_arc = self.grow(i);
            self.time += 1;

            if let Some(arc) = meeting_arc {
                // Keep i out of the queue while its tree is repaired; it is
                // revisited next iteration.
                self.active[i] = true;
                current = Some(i);
                self.augment(arc);
                self.adopt_orphans();
            }
        }
        Ok(())
    }

    /// Expands the tree of `i` by one layer. Returns the arc joining the two
    /// trees, oriented source tree to sink tree, if one was found.
    fn grow(&mut self, i: usize) -> Option<usize> {
        let topology = self.topology;
        if self.in_sink[i] {
            for arc in topology.arcs(i) {
                let sister = topology.sister(arc);
                if self.r_cap[sister] <= 0.0 {
                    continue;
                }
                let j = topology.head(arc);
                if self.parent[j] == NO_PARENT {
                    self.in_sink[j] = true;
                    self.attach(j, sister, i);
                    self.set_active(j);
                } else if !self.in_sink[j] {
                    return Some(sister);
                } else if self.ts[j] <= self.ts[i] && self.dist[j] > self.dist[i] {
                    self.attach(j, sister, i);
                }
            }
        } else {
            for arc in topology.arcs(i) {
                if self.r_cap[arc] <= 0.0 {
                    continue;
                }
                let j = topology.head(arc);
                if self.parent[j] == NO_PARENT {
                    self.in_sink[j] = false;
                    self.attach(j, topology.sister(arc), i);
                    self.set_active(j);
                } else if self.in_sink[j] {
                    return Some(arc);
                } else if self.ts[j] <= self.ts[i] && self.dist[j] > self.dist[i] {
                    self.attach(j, topology.sister(arc), i);
                }
            }
        }
        None
    }

    /// Hangs `j` under `i` through `parent_arc` (which points from `j` to `i`).
    fn attach(&mut self, j: usize, parent_arc: usize, i: usize) {
        self.parent[j] = parent_arc;
        self.ts[j] = self.ts[i];
        self.dist[j] = self.dist[i] + 1;
    }

    fn make_orphan_front(&mut self, i: usize) {
        self.parent[i] = ORPHAN;
        self.orphans.push_front(i);
    }

    fn make_orphan_back(&mut self, i: usize) {
        self.parent[i] = ORPHAN;
        self.orphans.push_back(i);
    }

    /// Pushes the bottleneck amount along the source-sink path through
    /// `middle`.
    fn augment(&mut self, middle: usize) {
        let topology = self.topology;
        let middle_sister = topology.sister(middle);

        // Bottleneck.
        let mut bottleneck = self.r_cap[middle];
        let mut i = topology.head(middle_sister);
        loop {
            let arc = self.parent[i];
            if arc == TERMINAL {
                break;
            }
            bottleneck = bottleneck.min(self.r_cap[topology.sister(arc)]);
            i = topology.head(arc);
        }
        bottleneck = bottleneck.min(self.tr_cap[i]);

        let mut i = topology.head(middle);
        loop {
            let arc = self.parent[i];
            if arc == TERMINAL {
                break;
            }
            bottleneck = bottleneck.min(self.r_cap[arc]);
            i = topology.head(arc);
        }
        bottleneck = bottleneck.min(-self.tr_cap[i]);

        // Push.
        self.r_cap[middle_sister] += bottleneck;
        self.r_cap[middle] = consume(self.r_cap[middle], bottleneck);

        let mut i = topology.head(middle_sister);
        loop {
            let arc = self.parent[i];
            if arc == TERMINAL {
                break;
            }
            let sister = topology.sister(arc);
            self.r_cap[arc] += bottleneck;
            self.r_cap[sister] = consume(self.r_cap[sister], bottleneck);
            let next = topology.head(arc);
            if self.r_cap[sister] == 0.0 {
                self.make_orphan_front(i);
            }
            i = next;
        }
        self.tr_cap[i] = consume(self.tr_cap[i], bottleneck);
        if self.tr_cap[i] == 0.0 {
            self.make_orphan_front(i);
        }

        let mut i = topology.head(middle);
        loop {
            let arc = self.parent[i];
            if arc == TERMINAL {
                break;
            }
            let sister = topology.sister(arc);
            self.r_cap[sister] += bottleneck;
            self.r_cap[arc] = consume(self.r_cap[arc], bottleneck);
            let next = topology.head(arc);
            if self.r_cap[arc] == 0.0 {
                self.make_orphan_front(i);
            }
            i = next;
        }
        self.tr_cap[i] = -consume(-self.tr_cap[i], bottleneck);
        if self.tr_cap[i] == 0.0 {
            self.make_orphan_front(i);
        }

        self.flow += bottleneck;
    }

    fn adopt_orphans(&mut self) {
        while let Some(i) = self.orphans.pop_front() {
            self.process_orphan(i);
        }
    }

    /// Distance from `j` to its terminal following parent links, or `None`
    /// if the chain ends in an orphan. Stamps the terminal-adjacent end.
    fn origin_distance(&mut self, mut j: usize) -> Option<u32> {
        let mut d: u32 = 0;
        loop {
            if self.ts[j] == self.time {
                return Some(d.saturating_add(self.dist[j]));
            }
            let arc = self.parent[j];
            d = d.saturating_add(1);
            if arc == TERMINAL {
                self.ts[j] = self.time;
                self.dist[j] = 1;
                return Some(d);
            }
            if arc == ORPHAN || arc == NO_PARENT {
                return None;
            }
            j = self.topology.head(arc);
        }
    }

    fn process_orphan(&mut self, i: usize) {
        let topology = self.topology;
        let sink_tree = self.in_sink[i];
        let mut best: Option<(usize, u32)> = None;

        for arc in topology.arcs(i) {
            // Residual capacity along which i could stay connected.
            let residual = if sink_tree {
                self.r_cap[arc]
            } else {
                self.r_cap[topology.sister(arc)]
            };
            if residual <= 0.0 {
                continue;
            }
            let j = topology.head(arc);
            if self.in_sink[j] != sink_tree || self.parent[j] == NO_PARENT {
                continue;
            }
            let Some(mut d) = self.origin_distance(j) else {
                continue;
            };
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((arc, d));
            }
            // Stamp the path so later lookups stop early.
            let mut k = j;
            while self.ts[k] != self.time {
                self.ts[k] = self.time;
                self.dist[k] = d;
                d = d.saturating_sub(1);
                k = topology.head(self.parent[k]);
            }
        }

        if let Some((arc, d)) = best {
            self.parent[i] = arc;
            self.ts[i] = self.time;
            self.dist[i] = d.saturating_add(1).min(INFINITE_DIST - 1);
            return;
        }

        // No parent: free i and let its neighbors reclaim the region.
        self.parent[i] = NO_PARENT;
        for arc in topology.arcs(i) {
            let j = topology.head(arc);
            if self.in_sink[j] != sink_tree {
                continue;
            }
            let parent = self.parent[j];
            if parent == NO_PARENT {
                continue;
            }
            let can_regrow = if sink_tree {
                self.r_cap[arc] > 0.0
            } else {
                self.r_cap[topology.sister(arc)] > 0.0
            };
            if can_regrow {
                self.set_active(j);
            }
            if parent != TERMINAL && parent != ORPHAN && topology.head(parent) == i {
                self.make_orphan_back(j);
            }
        }
    }
}
