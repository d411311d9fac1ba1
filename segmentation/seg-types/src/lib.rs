//! Volume and seed types for graph-cut segmentation.
//!
//! This crate holds the data model shared by the segmentation stack:
//!
//! - [`GridDims`] and [`GridCoord`] - Shape of a 3D voxel lattice and positions in it
//! - [`VoxelIndexer`] - Bijection between grid coordinates and dense [`NodeId`]s
//! - [`Volume`] - Dense scalar volume in x-fastest order, with world geometry
//! - [`SeedSet`] - Sorted set of seed voxels for one class
//!
//! # Layer 0 Crate
//!
//! No solver or pipeline logic lives here. The max-flow backends (`seg-maxflow`)
//! and the segmentation pipeline (`seg-graphcut`) both build on these types.
//!
//! # Indexing
//!
//! Voxels are stored x-fastest, then y, then z:
//!
//! ```text
//! node = x + nx * (y + ny * z)
//! ```
//!
//! Node ids are `u32`. A volume with more than `u32::MAX` voxels is rejected
//! with [`VolumeError::TooLarge`] when the indexer is built.
//!
//! # Example
//!
//! ```
//! use seg_types::{GridCoord, GridDims, SeedSet, Volume, VoxelIndexer};
//!
//! let dims = GridDims::new(4, 4, 4);
//! let indexer = VoxelIndexer::new(dims).unwrap();
//!
//! let node = indexer.node_id(GridCoord::new(1, 2, 3)).unwrap();
//! assert_eq!(node.index(), 1 + 4 * (2 + 4 * 3));
//! assert_eq!(indexer.coord(node), GridCoord::new(1, 2, 3));
//!
//! // A mask seeds every voxel whose value is positive.
//! let mut mask: Volume<u8> = Volume::new_fill(dims, 0).unwrap();
//! mask.set(GridCoord::new(0, 0, 0), 1).unwrap();
//! let seeds = SeedSet::from_mask(&mask);
//! assert_eq!(seeds.len(), 1);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod grid;
mod seeds;
mod volume;

pub use error::{VolumeError, VolumeResult};
pub use grid::{Axis, Direction, GridCoord, GridDims, NodeId, VoxelIndexer};
pub use seeds::{SeedClass, SeedSet};
pub use volume::{Intensity, Label, LabelVolume, Volume, VolumeGeometry};

// Re-export nalgebra types used in the public geometry API
pub use nalgebra::{Matrix3, Point3, Vector3};
