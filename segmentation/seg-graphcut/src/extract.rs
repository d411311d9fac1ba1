//! Label volume extraction from a solved graph.

use rayon::prelude::*;
use seg_maxflow::{MaxFlowGraph, Partition};
use seg_types::{GridDims, Label, LabelVolume, NodeId, Volume};

use crate::{SegmentationError, SegmentationResult};

/// Writes one label per voxel from the cut of a solved graph.
///
/// Source-side voxels get the foreground label, everything else the
/// background label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentationExtractor {
    /// Label written for source-side voxels.
    pub foreground: Label,
    /// Label written for sink-side voxels.
    pub background: Label,
}

impl Default for SegmentationExtractor {
    fn default() -> Self {
        Self {
            foreground: 255,
            background: 0,
        }
    }
}

impl SegmentationExtractor {
    /// Creates an extractor with the given label values.
    #[must_use]
    pub const fn new(foreground: Label, background: Label) -> Self {
        Self {
            foreground,
            background,
        }
    }

    /// Reads the partition of every voxel into a label volume.
    ///
    /// Slices are filled in parallel; each voxel is written exactly once, so
    /// the output equals a sequential pass.
    ///
    /// # Errors
    ///
    /// [`SegmentationError::Flow`] if the graph is unsolved,
    /// [`SegmentationError::InvalidParams`] if it has fewer nodes than the
    /// grid, [`SegmentationError::Volume`] for unusable dimensions.
    pub fn extract<G>(&self, graph: &G, dims: GridDims) -> SegmentationResult<LabelVolume>
    where
        G: MaxFlowGraph + ?Sized,
    {
        let mut labels = Volume::new_fill(dims, self.background)?;
        if graph.node_count() < labels.len() {
            return Err(SegmentationError::invalid_params(format!(
                "graph has {} nodes, label volume needs {}",
                graph.node_count(),
                labels.len()
            )));
        }
        let slice = dims.slice_len();
        let (fg, bg) = (self.foreground, self.background);

        labels
            .as_mut_slice()
            .par_chunks_mut(slice)
            .enumerate()
            .try_for_each(|(z, chunk)| -> SegmentationResult<()> {
                let base = z * slice;
                for (offset, label) in chunk.iter_mut().enumerate() {
                    // Voxel count fits u32, checked when the volume was built.
                    #[allow(clippy::cast_possible_truncation)]
                    let node = NodeId((base + offset) as u32);
                    *label = match graph.partition_of(node)? {
                        Partition::Source => fg,
                        Partition::Sink => bg,
                    };
                }
                Ok(())
            })?;
        Ok(labels)
    }

    /// Like [`SegmentationExtractor::extract`], carrying over the geometry of
    /// `like`.
    ///
    /// # Errors
    ///
    /// Same as [`SegmentationExtractor::extract`].
    pub fn extract_like<G, T>(
        &self,
        graph: &G,
        like: &Volume<T>,
    ) -> SegmentationResult<LabelVolume>
    where
        G: MaxFlowGraph + ?Sized,
        T: Copy,
    {
        Ok(self
            .extract(graph, like.dims())?
            .with_geometry(*like.geometry()))
    }
}

/// Extracts a label volume with explicit label values.
///
/// # Errors
///
/// See [`SegmentationExtractor::extract`].
pub fn extract<G>(
    graph: &G,
    dims: GridDims,
    foreground: Label,
    background: Label,
) -> SegmentationResult<LabelVolume>
where
    G: MaxFlowGraph + ?Sized,
{
    SegmentationExtractor::new(foreground, background).extract(graph, dims)
}
