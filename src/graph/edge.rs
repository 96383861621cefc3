//! Edge type and related structures.
//!
//! Edges connect 26-adjacent foreground voxels. Each edge has:
//! - The Euclidean distance between its endpoints in physical units
//! - A canonical key (the unordered voxel pair) used for deduplication

use serde::{Deserialize, Serialize};

use crate::voxel::Voxel;

/// Attributes stored on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceEdge {
    /// Distance between the endpoints' `xyz` coordinates.
    pub distance: f64,
}

/// Unordered voxel pair, stored as (smaller, larger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey(Voxel, Voxel);

impl EdgeKey {
    /// Key for the pair `{a, b}`; `new(a, b) == new(b, a)`.
    #[inline]
    pub fn new(a: Voxel, b: Voxel) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// Both endpoints, smaller first.
    #[inline]
    pub fn endpoints(self) -> (Voxel, Voxel) {
        (self.0, self.1)
    }
}

/// Euclidean (L2) distance between two points.
#[inline]
pub fn euclidean_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}
