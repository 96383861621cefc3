//! Vertex type and related structures.
//!
//! Vertices are the foreground voxels of the membrane mask. Each vertex has:
//! - A stable identifier (its slot in the underlying graph)
//! - The integer voxel it was created from (the deduplication key)
//! - Its coordinates `xyz` in physical units

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::voxel::Voxel;

/// Stable vertex identifier.
///
/// Vertices are never removed, so the id equals the petgraph node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub u32);

impl VertexId {
    /// Create a new VertexId from a raw u32.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vertex({})", self.0)
    }
}

impl From<u32> for VertexId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<VertexId> for u32 {
    #[inline]
    fn from(id: VertexId) -> Self {
        id.0
    }
}

impl From<NodeIndex> for VertexId {
    #[inline]
    fn from(index: NodeIndex) -> Self {
        Self(index.index() as u32)
    }
}

/// Attributes stored on every vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceVertex {
    /// Voxel this vertex represents.
    pub voxel: Voxel,
    /// Scaled coordinates in physical units.
    pub xyz: [f64; 3],
}

impl SurfaceVertex {
    /// Vertex for `voxel` scaled by `scale_factor`.
    #[inline]
    pub fn new(voxel: Voxel, scale_factor: f64) -> Self {
        Self {
            voxel,
            xyz: voxel.scaled(scale_factor),
        }
    }
}
