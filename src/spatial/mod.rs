//! Spatial indexing for particle-to-surface mapping.
//!
//! This module provides an R-tree based index for radius-bounded
//! nearest-neighbor queries of particle coordinates against surface vertices.

mod rtree;

pub use rtree::{nearest_within_radius, IndexedPoint, ProximityIndex, ProximityMatch, NO_MATCH};
