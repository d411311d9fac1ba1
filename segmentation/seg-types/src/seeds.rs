//! Seed voxel sets.

use crate::{GridCoord, NodeId, Volume, VolumeResult, VoxelIndexer};

/// Which terminal a seed is tied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeedClass {
    /// Object seeds, tied to the source.
    Foreground,
    /// Background seeds, tied to the sink.
    Background,
}

/// Sorted, duplicate-free set of seed node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeedSet {
    nodes: Vec<NodeId>,
}

impl SeedSet {
    /// Creates an empty seed set.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Builds a seed set from node ids. Duplicates are removed.
    #[must_use]
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut nodes: Vec<NodeId> = nodes.into_iter().collect();
        nodes.sort_unstable();
        nodes.dedup();
        Self { nodes }
    }

    /// Builds a seed set from grid coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VolumeError::OutOfBounds`] for the first coordinate
    /// outside the grid.
    pub fn from_coords(
        indexer: &VoxelIndexer,
        coords: impl IntoIterator<Item = GridCoord>,
    ) -> VolumeResult<Self> {
        let nodes = coords
            .into_iter()
            .map(|c| indexer.try_node_id(c))
            .collect::<VolumeResult<Vec<_>>>()?;
        Ok(Self::from_nodes(nodes))
    }

    /// Seeds every voxel whose mask value is strictly positive.
    #[must_use]
    pub fn from_mask<T: Copy + PartialOrd + Default>(mask: &Volume<T>) -> Self {
        let zero = T::default();
        let nodes = mask
            .as_slice()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > zero)
            .filter_map(|(i, _)| u32::try_from(i).ok().map(NodeId))
            .collect();
        // Already sorted and unique by construction.
        Self { nodes }
    }

    /// Number of seeds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if there are no seeds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true if `node` is a seed.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    /// Seeds in ascending order.
    #[must_use]
    pub fn as_slice(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Iterates over seeds in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Largest seed id, if any.
    #[must_use]
    pub fn max_node(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// First node present in both sets.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> Option<NodeId> {
        let (mut i, mut j) = (0, 0);
        while i < self.nodes.len() && j < other.nodes.len() {
            match self.nodes[i].cmp(&other.nodes[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return Some(self.nodes[i]),
            }
        }
        None
    }
}

impl FromIterator<NodeId> for SeedSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self::from_nodes(iter)
    }
}
