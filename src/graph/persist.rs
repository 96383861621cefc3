//! Persisted form of a [`VoxelGraph`].
//!
//! Only vertices (voxel and `xyz`) and edges (`distance`) are stored. The
//! coordinate index and edge membership set are not, so a loaded graph has to
//! go through [`VoxelGraph::rebuild_coordinate_index`] before lookups or
//! further expansion.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::edge::{EdgeKey, SurfaceEdge};
use super::surface::VoxelGraph;
use super::vertex::{SurfaceVertex, VertexId};
use crate::config::GraphConfig;
use crate::error::{Result, VoxelError};

/// An edge by the positions of its endpoints in [`PersistedGraph::vertices`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedEdge {
    pub source: u32,
    pub target: u32,
    pub distance: f64,
}

/// Serializable snapshot of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGraph {
    pub scale_factor: f64,
    pub dims: [usize; 3],
    pub vertices: Vec<SurfaceVertex>,
    pub edges: Vec<PersistedEdge>,
}

impl VoxelGraph {
    /// Snapshot of the vertices and edges, vertices in id order.
    pub fn to_persisted(&self) -> PersistedGraph {
        let mut position = HashMap::with_capacity(self.vertex_count());
        let mut vertices = Vec::with_capacity(self.vertex_count());
        for (id, vertex) in self.vertices() {
            position.insert(id, vertices.len() as u32);
            vertices.push(*vertex);
        }
        let edges = self
            .edges()
            .map(|(a, b, edge)| PersistedEdge {
                source: position[&a],
                target: position[&b],
                distance: edge.distance,
            })
            .collect();

        PersistedGraph {
            scale_factor: self.scale_factor(),
            dims: self.dims(),
            vertices,
            edges,
        }
    }

    /// Graph from a snapshot. The lookup tables stay empty until
    /// [`VoxelGraph::rebuild_coordinate_index`] is called.
    ///
    /// Fails with `InvalidInput` on an invalid scale factor or dims, a voxel
    /// listed twice, an edge to a missing vertex, a self-loop, or a vertex
    /// pair connected twice.
    pub fn from_persisted(persisted: PersistedGraph) -> Result<Self> {
        GraphConfig::new(persisted.scale_factor, persisted.dims).validate()?;

        let vertex_count = persisted.vertices.len();
        let mut graph = VoxelGraph::with_capacity(
            persisted.scale_factor,
            persisted.dims,
            vertex_count,
            persisted.edges.len(),
        );
        let mut seen_voxels = HashSet::with_capacity(vertex_count);
        let mut voxels = Vec::with_capacity(vertex_count);
        for vertex in persisted.vertices {
            if !seen_voxels.insert(vertex.voxel) {
                return Err(VoxelError::invalid(format!(
                    "voxel {} is stored as more than one vertex",
                    vertex.voxel
                )));
            }
            voxels.push(vertex.voxel);
            graph.push_unindexed_vertex(vertex);
        }

        let mut seen_edges = HashSet::with_capacity(persisted.edges.len());
        for edge in persisted.edges {
            let (source, target) = (edge.source as usize, edge.target as usize);
            if source >= vertex_count || target >= vertex_count {
                return Err(VoxelError::invalid(format!(
                    "edge ({source}, {target}) refers to a missing vertex, the graph has \
                     {vertex_count}"
                )));
            }
            if source == target {
                return Err(VoxelError::invalid(format!(
                    "edge ({source}, {target}) is a self-loop"
                )));
            }
            if !seen_edges.insert(EdgeKey::new(voxels[source], voxels[target])) {
                return Err(VoxelError::invalid(format!(
                    "vertices {source} and {target} are connected more than once"
                )));
            }
            graph.push_unindexed_edge(
                VertexId(edge.source),
                VertexId(edge.target),
                SurfaceEdge {
                    distance: edge.distance,
                },
            );
        }
        Ok(graph)
    }

    /// Write the graph as JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &self.to_persisted())
            .map_err(|e| VoxelError::Serialization(e.to_string()))
    }

    /// Read a graph written by [`VoxelGraph::save_json`].
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let persisted: PersistedGraph = serde_json::from_reader(reader)
            .map_err(|e| VoxelError::Serialization(e.to_string()))?;
        Self::from_persisted(persisted)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.to_persisted())
            .map_err(|e| VoxelError::Serialization(e.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let persisted: PersistedGraph =
            serde_json::from_str(json).map_err(|e| VoxelError::Serialization(e.to_string()))?;
        Self::from_persisted(persisted)
    }
}
