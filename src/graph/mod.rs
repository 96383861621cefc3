//! Surface graph of a membrane mask.
//!
//! The graph uses petgraph's StableGraph so vertex ids stay valid while the
//! graph grows. Vertices are deduplicated by their integer voxel and every
//! unordered pair of vertices carries at most one edge.

mod builder;
mod edge;
mod geodesic;
mod persist;
mod surface;
mod vertex;

pub use builder::{BuildReport, CancelToken, SkippedVoxel, VoxelGraphBuilder};
pub use edge::{euclidean_distance, EdgeKey, SurfaceEdge};
pub use geodesic::DensityMap;
pub use persist::{PersistedEdge, PersistedGraph};
pub use surface::VoxelGraph;
pub use vertex::{SurfaceVertex, VertexId};
