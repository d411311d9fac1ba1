//! Grid shape, coordinates and the voxel indexer.
//!
//! The indexer is the single source of truth for mapping a `(x, y, z)`
//! coordinate to a dense node id. Graph construction, noise estimation and
//! label extraction all go through it so that node `i` always means the same
//! voxel.

use std::fmt;

use crate::{VolumeError, VolumeResult};

/// Extent of a 3D voxel lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridDims {
    /// Number of voxels along x (fastest varying).
    pub nx: usize,
    /// Number of voxels along y.
    pub ny: usize,
    /// Number of voxels along z (slowest varying).
    pub nz: usize,
}

impl GridDims {
    /// Creates grid dimensions.
    #[must_use]
    pub const fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Returns true if any extent is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0 || self.nz == 0
    }

    /// Total voxel count, or `None` on `usize` overflow.
    #[must_use]
    pub const fn checked_voxel_count(&self) -> Option<usize> {
        match self.nx.checked_mul(self.ny) {
            Some(slice) => slice.checked_mul(self.nz),
            None => None,
        }
    }

    /// Total voxel count, saturating at `usize::MAX`.
    #[must_use]
    pub const fn voxel_count(&self) -> usize {
        match self.checked_voxel_count() {
            Some(n) => n,
            None => usize::MAX,
        }
    }

    /// Number of voxels in one z-slice.
    #[must_use]
    pub const fn slice_len(&self) -> usize {
        self.nx.saturating_mul(self.ny)
    }

    /// Returns true if the coordinate lies inside the grid.
    #[must_use]
    pub const fn contains(&self, coord: GridCoord) -> bool {
        coord.x < self.nx && coord.y < self.ny && coord.z < self.nz
    }

    /// Number of undirected 6-connected neighbor pairs in the grid.
    ///
    /// Equals `3n - nx*ny - ny*nz - nx*nz` for a non-empty grid.
    #[must_use]
    pub const fn expected_edge_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let n = self.voxel_count();
        let along_x = n.saturating_sub(self.ny.saturating_mul(self.nz));
        let along_y = n.saturating_sub(self.nx.saturating_mul(self.nz));
        let along_z = n.saturating_sub(self.nx.saturating_mul(self.ny));
        along_x.saturating_add(along_y).saturating_add(along_z)
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.nx, self.ny, self.nz)
    }
}

impl From<(usize, usize, usize)> for GridDims {
    fn from((nx, ny, nz): (usize, usize, usize)) -> Self {
        Self::new(nx, ny, nz)
    }
}

/// Integer position of a voxel in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridCoord {
    /// X index.
    pub x: usize,
    /// Y index.
    pub y: usize,
    /// Z index.
    pub z: usize,
}

impl GridCoord {
    /// Creates a grid coordinate.
    #[must_use]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Steps one voxel in `direction`, staying inside `dims`.
    ///
    /// Returns `None` when the step would leave the grid.
    #[must_use]
    pub fn step(self, direction: Direction, dims: GridDims) -> Option<Self> {
        let Self { x, y, z } = self;
        let next = match direction {
            Direction::PosX => Self::new(x + 1, y, z),
            Direction::NegX => Self::new(x.checked_sub(1)?, y, z),
            Direction::PosY => Self::new(x, y + 1, z),
            Direction::NegY => Self::new(x, y.checked_sub(1)?, z),
            Direction::PosZ => Self::new(x, y, z + 1),
            Direction::NegZ => Self::new(x, y, z.checked_sub(1)?),
        };
        dims.contains(next).then_some(next)
    }
}

impl From<(usize, usize, usize)> for GridCoord {
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Self::new(x, y, z)
    }
}

/// A lattice axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// The x axis (fastest varying in memory).
    X,
    /// The y axis.
    Y,
    /// The z axis (slice axis).
    Z,
}

impl Axis {
    /// All three axes in memory order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// The positive direction along this axis.
    #[must_use]
    pub const fn forward(self) -> Direction {
        match self {
            Self::X => Direction::PosX,
            Self::Y => Direction::PosY,
            Self::Z => Direction::PosZ,
        }
    }
}

/// One of the six 6-connectivity steps.
///
/// The discriminant order pairs each direction with its opposite, so
/// `opposite(d).index() == d.index() ^ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// +x
    PosX = 0,
    /// -x
    NegX = 1,
    /// +y
    PosY = 2,
    /// -y
    NegY = 3,
    /// +z
    PosZ = 4,
    /// -z
    NegZ = 5,
}

impl Direction {
    /// All six directions in index order.
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Dense index in `0..6`.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
            Self::PosZ => Self::NegZ,
            Self::NegZ => Self::PosZ,
        }
    }
}

/// Dense node id of a voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    /// Node id as a `usize` index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw `u32` value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps grid coordinates to dense node ids and back.
///
/// `node = x + nx * (y + ny * z)`. Construction fails for empty grids and for
/// grids whose voxel count does not fit a `u32`.
///
/// # Example
///
/// ```
/// use seg_types::{Direction, GridCoord, GridDims, VoxelIndexer};
///
/// let indexer = VoxelIndexer::new(GridDims::new(3, 3, 3)).unwrap();
/// let center = indexer.node_id(GridCoord::new(1, 1, 1)).unwrap();
/// assert_eq!(center.index(), 13);
///
/// let up = indexer.neighbor(center, Direction::PosZ).unwrap();
/// assert_eq!(indexer.coord(up), GridCoord::new(1, 1, 2));
///
/// let corner = indexer.node_id(GridCoord::new(0, 0, 0)).unwrap();
/// assert!(indexer.neighbor(corner, Direction::NegX).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelIndexer {
    dims: GridDims,
    node_count: usize,
}

impl VoxelIndexer {
    /// Creates an indexer for the given dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::EmptyDimensions`] if any extent is zero and
    /// [`VolumeError::TooLarge`] if the voxel count exceeds `u32::MAX`.
    pub fn new(dims: GridDims) -> VolumeResult<Self> {
        if dims.is_empty() {
            return Err(VolumeError::EmptyDimensions { dims });
        }
        let node_count = dims
            .checked_voxel_count()
            .filter(|&n| u32::try_from(n).is_ok())
            .ok_or(VolumeError::TooLarge { dims })?;
        Ok(Self { dims, node_count })
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Number of nodes (voxels).
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// Node id of a coordinate, or `None` if it lies outside the grid.
    #[must_use]
    pub fn node_id(&self, coord: GridCoord) -> Option<NodeId> {
        if !self.dims.contains(coord) {
            return None;
        }
        let linear = coord.x + self.dims.nx * (coord.y + self.dims.ny * coord.z);
        // In range because linear < node_count <= u32::MAX.
        u32::try_from(linear).ok().map(NodeId)
    }

    /// Node id of a coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::OutOfBounds`] if the coordinate lies outside the grid.
    pub fn try_node_id(&self, coord: GridCoord) -> VolumeResult<NodeId> {
        self.node_id(coord).ok_or(VolumeError::OutOfBounds {
            coord,
            dims: self.dims,
        })
    }

    /// Returns true if the node id addresses a voxel of this grid.
    #[must_use]
    pub const fn contains(&self, node: NodeId) -> bool {
        node.index() < self.node_count
    }

    /// Coordinate of a node.
    ///
    /// The node must belong to this grid; out-of-range ids produce a
    /// coordinate outside the grid.
    #[must_use]
    pub const fn coord(&self, node: NodeId) -> GridCoord {
        let i = node.index();
        let slice = self.dims.nx * self.dims.ny;
        let z = i / slice;
        let rem = i % slice;
        GridCoord::new(rem % self.dims.nx, rem / self.dims.nx, z)
    }

    /// Neighbor of `node` one step in `direction`, or `None` at the border.
    #[must_use]
    pub fn neighbor(&self, node: NodeId, direction: Direction) -> Option<NodeId> {
        if !self.contains(node) {
            return None;
        }
        let next = self.coord(node).step(direction, self.dims)?;
        self.node_id(next)
    }

    /// Neighbor of `node` one step forward along `axis`.
    #[must_use]
    pub fn forward_neighbor(&self, node: NodeId, axis: Axis) -> Option<NodeId> {
        self.neighbor(node, axis.forward())
    }

    /// Iterates over all node ids in index order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = NodeId> + use<> {
        // node_count fits u32 by construction.
        let count = u32::try_from(self.node_count).unwrap_or(u32::MAX);
        (0..count).map(NodeId)
    }

    /// Iterates over all coordinates in index order (x fastest).
    pub fn iter_coords(&self) -> impl Iterator<Item = GridCoord> + use<> {
        let GridDims { nx, ny, nz } = self.dims;
        (0..nz).flat_map(move |z| {
            (0..ny).flat_map(move |y| (0..nx).map(move |x| GridCoord::new(x, y, z)))
        })
    }
}
