//! Dense scalar volumes.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::{GridCoord, GridDims, NodeId, VolumeError, VolumeResult, VoxelIndexer};

/// Voxel label produced by segmentation.
pub type Label = u8;

/// A volume of labels, same layout as the input volume.
pub type LabelVolume = Volume<Label>;

/// Scalar sample types a volume can hold.
///
/// Every intensity converts to `f64` for weight computation.
pub trait Intensity: Copy + Send + Sync + 'static {
    /// Converts the sample to `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_intensity {
    ($($t:ty),*) => {
        $(
            impl Intensity for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    f64::from(self)
                }
            }
        )*
    };
}

impl_intensity!(u8, u16, u32, i8, i16, i32, f32, f64);

/// Placement of the voxel lattice in world space.
///
/// Segmentation itself runs in index space. Geometry is carried so that a
/// label volume can be written back in the same frame as its source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeGeometry {
    /// Physical size of one voxel along each axis.
    pub spacing: Vector3<f64>,
    /// World position of voxel `(0, 0, 0)`.
    pub origin: Point3<f64>,
    /// Direction cosines, one column per grid axis.
    pub direction: Matrix3<f64>,
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            spacing: Vector3::new(1.0, 1.0, 1.0),
            origin: Point3::origin(),
            direction: Matrix3::identity(),
        }
    }
}

impl VolumeGeometry {
    /// Sets the voxel spacing.
    #[must_use]
    pub const fn with_spacing(mut self, spacing: Vector3<f64>) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the origin.
    #[must_use]
    pub const fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }
}

/// Dense 3D volume stored x-fastest.
///
/// # Example
///
/// ```
/// use seg_types::{GridCoord, GridDims, Volume};
///
/// let vol = Volume::from_fn(GridDims::new(2, 2, 2), |c| (c.x + c.y + c.z) as i16).unwrap();
/// assert_eq!(vol.get(GridCoord::new(1, 1, 1)), Some(3));
/// assert_eq!(vol.as_slice().len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Volume<T> {
    indexer: VoxelIndexer,
    data: Vec<T>,
    geometry: VolumeGeometry,
}

impl<T: Copy> Volume<T> {
    /// Wraps a sample buffer in x-fastest order.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are empty or too large, or if the
    /// buffer length does not equal the voxel count.
    pub fn from_vec(dims: GridDims, data: Vec<T>) -> VolumeResult<Self> {
        let indexer = VoxelIndexer::new(dims)?;
        if data.len() != indexer.node_count() {
            return Err(VolumeError::SizeMismatch {
                expected: indexer.node_count(),
                actual: data.len(),
            });
        }
        Ok(Self {
            indexer,
            data,
            geometry: VolumeGeometry::default(),
        })
    }

    /// Creates a volume with every voxel set to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are empty or too large.
    pub fn new_fill(dims: GridDims, value: T) -> VolumeResult<Self> {
        let indexer = VoxelIndexer::new(dims)?;
        Ok(Self {
            indexer,
            data: vec![value; indexer.node_count()],
            geometry: VolumeGeometry::default(),
        })
    }

    /// Creates a volume by evaluating `f` at every coordinate.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are empty or too large.
    pub fn from_fn(dims: GridDims, mut f: impl FnMut(GridCoord) -> T) -> VolumeResult<Self> {
        let indexer = VoxelIndexer::new(dims)?;
        let data = indexer.iter_coords().map(&mut f).collect();
        Ok(Self {
            indexer,
            data,
            geometry: VolumeGeometry::default(),
        })
    }

    /// Replaces the world geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: VolumeGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.indexer.dims()
    }

    /// The indexer for this volume's grid.
    #[must_use]
    pub const fn indexer(&self) -> &VoxelIndexer {
        &self.indexer
    }

    /// World geometry.
    #[must_use]
    pub const fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    /// Number of voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: volumes have at least one voxel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at a coordinate, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, coord: GridCoord) -> Option<T> {
        let node = self.indexer.node_id(coord)?;
        self.data.get(node.index()).copied()
    }

    /// Sample at a node id, or `None` outside the grid.
    #[must_use]
    pub fn at(&self, node: NodeId) -> Option<T> {
        self.data.get(node.index()).copied()
    }

    /// Writes a sample.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::OutOfBounds`] if the coordinate is outside the grid.
    pub fn set(&mut self, coord: GridCoord, value: T) -> VolumeResult<()> {
        let node = self.indexer.try_node_id(coord)?;
        self.data[node.index()] = value;
        Ok(())
    }

    /// Samples in x-fastest order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable samples in x-fastest order.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the volume and returns its buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Iterates over `(coord, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, T)> + '_ {
        self.indexer.iter_coords().zip(self.data.iter().copied())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_vec_size_mismatch() {
        let err = Volume::from_vec(GridDims::new(2, 2, 2), vec![0u8; 7]).unwrap_err();
        assert_eq!(
            err,
            VolumeError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_layout_is_x_fastest() {
        let vol = Volume::from_vec(GridDims::new(2, 2, 2), (0u8..8).collect()).unwrap();
        assert_eq!(vol.get(GridCoord::new(1, 0, 0)), Some(1));
        assert_eq!(vol.get(GridCoord::new(0, 1, 0)), Some(2));
        assert_eq!(vol.get(GridCoord::new(0, 0, 1)), Some(4));
        assert_eq!(vol.get(GridCoord::new(2, 0, 0)), None);
    }

    #[test]
    fn test_set_and_at() {
        let mut vol = Volume::new_fill(GridDims::new(3, 1, 1), 0i16).unwrap();
        vol.set(GridCoord::new(2, 0, 0), -7).unwrap();
        assert!(vol.set(GridCoord::new(3, 0, 0), 1).is_err());
        assert_eq!(vol.at(NodeId(2)), Some(-7));
        assert_eq!(vol.at(NodeId(3)), None);
        assert_eq!(vol.into_vec(), vec![0, 0, -7]);
    }

    #[test]
    fn test_geometry_is_carried() {
        let geometry = VolumeGeometry::default()
            .with_spacing(Vector3::new(0.5, 2.0, 1.0))
            .with_origin(Point3::new(10.0, 0.0, -1.0));
        let vol = Volume::new_fill(GridDims::new(2, 2, 2), 1u8)
            .unwrap()
            .with_geometry(geometry);
        assert_eq!(vol.geometry(), &geometry);
        assert_relative_eq!(vol.geometry().spacing.y, 2.0);
        assert_eq!(vol.geometry().direction, Matrix3::identity());
    }
}
