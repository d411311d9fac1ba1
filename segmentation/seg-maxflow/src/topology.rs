//! Arc structure seen by the shared solver engines.

/// Read-only arc structure of a flow graph.
///
/// Arcs are dense `usize` ids. Every arc has a sister arc running the other
/// way between the same two nodes; residual capacities live outside, indexed
/// by arc id.
pub(crate) trait Topology {
    /// Number of nodes.
    fn node_count(&self) -> usize;

    /// Outgoing arcs of `node`.
    fn arcs(&self, node: usize) -> impl Iterator<Item = usize> + '_;

    /// Node an arc points to.
    fn head(&self, arc: usize) -> usize;

    /// The reverse arc.
    fn sister(&self, arc: usize) -> usize;
}
