//! VoxelGraph - attributed surface graph.
//!
//! The VoxelGraph stores the membrane topology using petgraph's StableGraph
//! and keeps two lookup tables next to it:
//! - the coordinate index, mapping each voxel to its vertex
//! - the edge membership set, holding every connected voxel pair
//!
//! Both tables make vertex and edge creation idempotent, which is what the
//! expansion in [`VoxelGraphBuilder`](super::VoxelGraphBuilder) relies on.

use ndarray::Array2;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Undirected;
use std::collections::{HashMap, HashSet};

use super::edge::{euclidean_distance, EdgeKey, SurfaceEdge};
use super::vertex::{SurfaceVertex, VertexId};
use crate::error::{Result, VoxelError};
use crate::spatial::ProximityIndex;
use crate::voxel::Voxel;

pub(crate) type SurfaceGraph = StableGraph<SurfaceVertex, SurfaceEdge, Undirected>;

/// Undirected graph of membrane voxels with Euclidean edge distances.
#[derive(Debug, Clone)]
pub struct VoxelGraph {
    /// The underlying graph structure.
    graph: SurfaceGraph,

    /// Map from voxel to its vertex. Not persisted.
    coordinate_index: HashMap<Voxel, VertexId>,

    /// Connected voxel pairs. Not persisted.
    edge_membership: HashSet<EdgeKey>,

    /// Voxel edge length in physical units
    scale_factor: f64,

    /// Shape of the mask the graph is built from
    dims: [usize; 3],
}

impl VoxelGraph {
    /// Create a new empty graph.
    pub fn new(scale_factor: f64, dims: [usize; 3]) -> Self {
        Self {
            graph: SurfaceGraph::default(),
            coordinate_index: HashMap::new(),
            edge_membership: HashSet::new(),
            scale_factor,
            dims,
        }
    }

    /// Create a graph with pre-allocated capacity.
    pub fn with_capacity(
        scale_factor: f64,
        dims: [usize; 3],
        vertex_capacity: usize,
        edge_capacity: usize,
    ) -> Self {
        Self {
            graph: SurfaceGraph::with_capacity(vertex_capacity, edge_capacity),
            coordinate_index: HashMap::with_capacity(vertex_capacity),
            edge_membership: HashSet::with_capacity(edge_capacity),
            scale_factor,
            dims,
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    // =========================================================================
    // Vertex Operations
    // =========================================================================

    /// Look up the vertex for `voxel`, creating it if absent.
    ///
    /// Returns the vertex and whether it was created by this call. Calling
    /// this twice with the same voxel never creates two vertices.
    pub fn ensure_vertex(&mut self, voxel: Voxel) -> (VertexId, bool) {
        if let Some(&id) = self.coordinate_index.get(&voxel) {
            return (id, false);
        }
        let index = self.graph.add_node(SurfaceVertex::new(voxel, self.scale_factor));
        let id = VertexId::from(index);
        self.coordinate_index.insert(voxel, id);
        (id, true)
    }

    /// Vertex of `voxel`, if it is in the coordinate index.
    pub fn vertex_id(&self, voxel: Voxel) -> Option<VertexId> {
        self.coordinate_index.get(&voxel).copied()
    }

    /// Attributes of a vertex.
    pub fn vertex(&self, id: VertexId) -> Option<&SurfaceVertex> {
        self.graph.node_weight(id.index())
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of entries in the coordinate index.
    pub fn indexed_vertex_count(&self) -> usize {
        self.coordinate_index.len()
    }

    /// All vertices with their attributes, in id order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &SurfaceVertex)> + '_ {
        self.graph
            .node_indices()
            .map(move |index| (VertexId::from(index), &self.graph[index]))
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Connect the vertices of `a` and `b` unless they already are.
    ///
    /// Both voxels must already be vertices and must differ. Returns true if
    /// a new edge was created.
    pub fn ensure_edge(&mut self, a: Voxel, b: Voxel) -> Result<bool> {
        if a == b {
            return Err(VoxelError::invalid(format!("refusing a self-loop at voxel {a}")));
        }
        let key = EdgeKey::new(a, b);
        if self.edge_membership.contains(&key) {
            return Ok(false);
        }

        let (va, vb) = match (self.vertex_id(a), self.vertex_id(b)) {
            (Some(va), Some(vb)) => (va, vb),
            _ => {
                return Err(VoxelError::invalid(format!(
                    "cannot connect {a} and {b}: both have to be vertices"
                )));
            }
        };
        let distance = euclidean_distance(self.graph[va.index()].xyz, self.graph[vb.index()].xyz);
        self.graph.add_edge(va.index(), vb.index(), SurfaceEdge { distance });
        self.edge_membership.insert(key);
        Ok(true)
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Distance attribute of the edge between two vertices, if connected.
    pub fn edge_distance(&self, a: VertexId, b: VertexId) -> Option<f64> {
        self.graph
            .find_edge(a.index(), b.index())
            .and_then(|e| self.graph.edge_weight(e))
            .map(|edge| edge.distance)
    }

    /// All edges as (endpoint, endpoint, attributes).
    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId, &SurfaceEdge)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (VertexId::from(e.source()), VertexId::from(e.target()), e.weight()))
    }

    /// Neighbors of a vertex with the connecting edge distance.
    pub fn neighbors(&self, id: VertexId) -> Vec<(VertexId, f64)> {
        let index = id.index();
        if !self.graph.contains_node(index) {
            return Vec::new();
        }
        self.graph
            .edges(index)
            .map(|e| {
                let other = other_endpoint(index, e.source(), e.target());
                (VertexId::from(other), e.weight().distance)
            })
            .collect()
    }

    // =========================================================================
    // Index Maintenance
    // =========================================================================

    /// Fill the coordinate index (and the edge membership set) from the
    /// vertex and edge attributes.
    ///
    /// Needed after loading a persisted graph, since neither table is stored.
    /// Existing entries are kept, so calling it repeatedly is a no-op.
    pub fn rebuild_coordinate_index(&mut self) {
        for index in self.graph.node_indices() {
            let voxel = self.graph[index].voxel;
            self.coordinate_index
                .entry(voxel)
                .or_insert_with(|| VertexId::from(index));
        }
        for e in self.graph.edge_references() {
            let a = self.graph[e.source()].voxel;
            let b = self.graph[e.target()].voxel;
            self.edge_membership.insert(EdgeKey::new(a, b));
        }
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Vertex coordinates as an N×3 table, row `i` belonging to `VertexId(i)`.
    pub fn vertex_coordinates(&self) -> Array2<f64> {
        let points: Vec<[f64; 3]> = self.vertices().map(|(_, v)| v.xyz).collect();
        crate::voxel::point_array_from_points(&points)
    }

    /// For every particle, the nearest vertex within `radius` (same units as
    /// the vertex coordinates).
    pub fn nearest_vertices(&self, particles: &[[f64; 3]], radius: f64) -> Vec<Option<VertexId>> {
        let (ids, points): (Vec<VertexId>, Vec<[f64; 3]>) =
            self.vertices().map(|(id, v)| (id, v.xyz)).unzip();
        let index = ProximityIndex::new(&points);
        particles
            .iter()
            .map(|&p| index.nearest_within(p, radius).map(|m| ids[m.index]))
            .collect()
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Remove all vertices, edges and index entries.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.coordinate_index.clear();
        self.edge_membership.clear();
    }

    pub(crate) fn inner(&self) -> &SurfaceGraph {
        &self.graph
    }

    /// Add a vertex without touching the coordinate index.
    pub(crate) fn push_unindexed_vertex(&mut self, vertex: SurfaceVertex) -> VertexId {
        VertexId::from(self.graph.add_node(vertex))
    }

    /// Add an edge without touching the edge membership set.
    pub(crate) fn push_unindexed_edge(&mut self, a: VertexId, b: VertexId, edge: SurfaceEdge) {
        self.graph.add_edge(a.index(), b.index(), edge);
    }
}

#[inline]
pub(crate) fn other_endpoint(from: NodeIndex, source: NodeIndex, target: NodeIndex) -> NodeIndex {
    if source == from { target } else { source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ensure_vertex_dedup() {
        let mut graph = VoxelGraph::new(1.0, [4, 4, 4]);
        let (a, created_a) = graph.ensure_vertex(Voxel::new(1, 2, 3));
        let (b, created_b) = graph.ensure_vertex(Voxel::new(1, 2, 3));

        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a, b);
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.indexed_vertex_count(), 1);
    }

    #[test]
    fn test_vertex_scaled_coordinates() {
        let mut graph = VoxelGraph::new(2.5, [4, 4, 4]);
        let (id, _) = graph.ensure_vertex(Voxel::new(1, 0, 2));
        assert_eq!(graph.vertex(id).unwrap().xyz, [2.5, 0.0, 5.0]);
    }

    #[test]
    fn test_ensure_edge_dedup_both_orders() {
        let mut graph = VoxelGraph::new(1.0, [4, 4, 4]);
        let a = Voxel::new(0, 0, 0);
        let b = Voxel::new(1, 1, 0);
        graph.ensure_vertex(a);
        graph.ensure_vertex(b);

        assert!(graph.ensure_edge(a, b).unwrap());
        assert!(!graph.ensure_edge(b, a).unwrap());
        assert_eq!(graph.edge_count(), 1);

        let (va, vb) = (graph.vertex_id(a).unwrap(), graph.vertex_id(b).unwrap());
        assert_relative_eq!(graph.edge_distance(va, vb).unwrap(), 2f64.sqrt());
        assert_relative_eq!(graph.edge_distance(vb, va).unwrap(), 2f64.sqrt());
    }

    #[test]
    fn test_ensure_edge_rejects_self_loop_and_missing() {
        let mut graph = VoxelGraph::new(1.0, [4, 4, 4]);
        let a = Voxel::new(0, 0, 0);
        graph.ensure_vertex(a);

        assert!(graph.ensure_edge(a, a).is_err());
        assert!(graph.ensure_edge(a, Voxel::new(0, 0, 1)).is_err());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_neighbors() {
        let mut graph = VoxelGraph::new(1.0, [4, 4, 4]);
        let a = Voxel::new(1, 1, 1);
        let b = Voxel::new(2, 1, 1);
        let c = Voxel::new(1, 2, 2);
        for v in [a, b, c] {
            graph.ensure_vertex(v);
        }
        graph.ensure_edge(a, b).unwrap();
        graph.ensure_edge(c, a).unwrap();

        let neighbors = graph.neighbors(graph.vertex_id(a).unwrap());
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.contains(&(graph.vertex_id(b).unwrap(), 1.0)));
        assert!(neighbors.contains(&(graph.vertex_id(c).unwrap(), 2f64.sqrt())));
        assert!(graph.neighbors(VertexId(99)).is_empty());
    }

    #[test]
    fn test_rebuild_coordinate_index_idempotent() {
        let mut graph = VoxelGraph::new(1.0, [4, 4, 4]);
        let a = graph.push_unindexed_vertex(SurfaceVertex::new(Voxel::new(0, 0, 0), 1.0));
        let b = graph.push_unindexed_vertex(SurfaceVertex::new(Voxel::new(0, 0, 1), 1.0));
        graph.push_unindexed_edge(a, b, SurfaceEdge { distance: 1.0 });
        assert_eq!(graph.vertex_id(Voxel::new(0, 0, 0)), None);

        graph.rebuild_coordinate_index();
        let first: HashMap<_, _> = graph.coordinate_index.clone();
        graph.rebuild_coordinate_index();

        assert_eq!(graph.coordinate_index, first);
        assert_eq!(graph.vertex_id(Voxel::new(0, 0, 1)), Some(b));
        assert!(!graph.ensure_edge(Voxel::new(0, 0, 1), Voxel::new(0, 0, 0)).unwrap());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_vertex_coordinates_table() {
        let mut graph = VoxelGraph::new(0.5, [4, 4, 4]);
        graph.ensure_vertex(Voxel::new(2, 0, 0));
        graph.ensure_vertex(Voxel::new(0, 0, 4));

        let table = graph.vertex_coordinates();
        assert_eq!(table.dim(), (2, 3));
        assert_eq!(table.row(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(table.row(1).to_vec(), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_nearest_vertices() {
        let mut graph = VoxelGraph::new(1.0, [20, 1, 1]);
        let (a, _) = graph.ensure_vertex(Voxel::new(0, 0, 0));
        let (b, _) = graph.ensure_vertex(Voxel::new(10, 0, 0));

        let particles = [[1.0, 0.0, 0.0], [9.0, 0.0, 0.0], [20.0, 0.0, 0.0]];
        let nearest = graph.nearest_vertices(&particles, 5.0);
        assert_eq!(nearest, vec![Some(a), Some(b), None]);
    }

    #[test]
    fn test_clear() {
        let mut graph = VoxelGraph::new(1.0, [2, 2, 2]);
        graph.ensure_vertex(Voxel::new(0, 0, 0));
        graph.ensure_vertex(Voxel::new(1, 0, 0));
        graph.ensure_edge(Voxel::new(0, 0, 0), Voxel::new(1, 0, 0)).unwrap();

        graph.clear();
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.vertex_id(Voxel::new(0, 0, 0)), None);
    }
}
