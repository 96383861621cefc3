//! Geodesic measures on the surface graph.
//!
//! Distances along the membrane are approximated by shortest paths over the
//! graph edges, weighted by their `distance` attribute.

use log::{debug, info};
use ndarray::{Array3, ArrayBase, Data, Ix3};
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{EdgeRef, NodeIndexable};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::surface::{other_endpoint, SurfaceGraph, VoxelGraph};
use super::vertex::VertexId;
use crate::error::{Result, VoxelError};
use crate::voxel::{foreground_voxels, mask_shape, MaskValue, Voxel};

/// Heap entry ordered so that `BinaryHeap` pops the smallest cost first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: NodeIndex,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Dijkstra from `source`, optionally stopping at `max_dist`.
fn shortest_distances(
    graph: &SurfaceGraph,
    source: NodeIndex,
    max_dist: Option<f64>,
) -> HashMap<NodeIndex, f64> {
    let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();
    dist.insert(source, 0.0);
    heap.push(Frontier { cost: 0.0, node: source });

    while let Some(Frontier { cost, node }) = heap.pop() {
        if dist.get(&node).is_some_and(|&best| cost > best) {
            continue;
        }
        for e in graph.edges(node) {
            let next = other_endpoint(node, e.source(), e.target());
            let next_cost = cost + e.weight().distance;
            if max_dist.is_some_and(|max| next_cost > max) {
                continue;
            }
            let improved = dist.get(&next).is_none_or(|&best| next_cost < best);
            if improved {
                dist.insert(next, next_cost);
                heap.push(Frontier { cost: next_cost, node: next });
            }
        }
    }
    dist
}

/// Per-vertex densities and their volume rendering.
#[derive(Debug, Clone)]
pub struct DensityMap {
    /// Density of every vertex, indexed by `VertexId::raw()`.
    pub vertex_density: Vec<f64>,
    /// Array of the graph's dims: `1 + density` at vertex voxels, 0 elsewhere.
    pub volume: Array3<f32>,
}

impl VoxelGraph {
    /// Mean of all edge distances, or `None` for a graph without edges.
    pub fn average_edge_length(&self) -> Option<f64> {
        let count = self.edge_count();
        if count == 0 {
            return None;
        }
        let total: f64 = self.edges().map(|(_, _, e)| e.distance).sum();
        Some(total / count as f64)
    }

    /// Geodesic distance to every vertex reachable within `g_max`, the source
    /// itself excluded.
    pub fn geodesic_neighbors(
        &self,
        source: VertexId,
        g_max: f64,
    ) -> Result<HashMap<VertexId, f64>> {
        if self.vertex(source).is_none() {
            return Err(VoxelError::invalid(format!("{source} is not in the graph")));
        }
        let distances = shortest_distances(self.inner(), source.index(), Some(g_max));
        let neighbors: HashMap<VertexId, f64> = distances
            .into_iter()
            .filter(|&(node, _)| node != source.index())
            .map(|(node, d)| (VertexId::from(node), d))
            .collect();
        debug!("{} geodesic neighbors of {source} within {g_max}", neighbors.len());
        Ok(neighbors)
    }

    /// Particle density from target voxels given as a mask of the graph's
    /// dims. See [`VoxelGraph::density_for_voxels`].
    pub fn density_from_mask<S, T>(&self, mask: &ArrayBase<S, Ix3>) -> Result<DensityMap>
    where
        S: Data<Elem = T>,
        T: MaskValue,
    {
        let shape = mask_shape(mask);
        if shape != self.dims() {
            return Err(VoxelError::invalid(format!(
                "target mask shape {shape:?} differs from the graph dims {:?}",
                self.dims()
            )));
        }
        self.density_for_voxels(&foreground_voxels(mask))
    }

    /// Particle density from target coordinates in physical units. Each
    /// coordinate is snapped to its nearest voxel; a non-finite one is
    /// `InvalidInput`.
    pub fn density_from_coordinates(&self, targets: &[[f64; 3]]) -> Result<DensityMap> {
        let voxels: Vec<Voxel> = targets
            .iter()
            .map(|&xyz| {
                Voxel::from_scaled(xyz, self.scale_factor()).ok_or_else(|| {
                    VoxelError::invalid(format!(
                        "target coordinate {xyz:?} does not map to a voxel"
                    ))
                })
            })
            .collect::<Result<_>>()?;
        self.density_for_voxels(&voxels)
    }

    /// For every vertex, `D = Σ 1 / (d + 1)` over all reachable targets,
    /// with `d` the geodesic distance to the target.
    ///
    /// Every target has to be a vertex of the graph, and there has to be at
    /// least one target.
    pub fn density_for_voxels(&self, targets: &[Voxel]) -> Result<DensityMap> {
        if targets.is_empty() {
            return Err(VoxelError::invalid("no target voxels were given"));
        }
        let target_ids = targets
            .iter()
            .map(|&t| {
                self.vertex_id(t).ok_or_else(|| {
                    VoxelError::invalid(format!("target {t} is not inside the membrane"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!("{} target vertices in graph", target_ids.len());

        let bound = self.inner().node_bound();
        let mut vertex_density = vec![0.0f64; bound];
        // Undirected, so the distance from each target covers every vertex.
        for (n, target) in target_ids.iter().enumerate() {
            for (node, d) in shortest_distances(self.inner(), target.index(), None) {
                vertex_density[node.index()] += 1.0 / (d + 1.0);
            }
            if (n + 1) % 1000 == 0 {
                info!("{} targets processed", n + 1);
            }
        }

        let dims = self.dims();
        let mut volume = Array3::<f32>::zeros((dims[0], dims[1], dims[2]));
        for (id, vertex) in self.vertices() {
            let index = vertex.voxel.to_index(dims).ok_or(VoxelError::OutOfBounds {
                voxel: vertex.voxel,
                shape: dims,
            })?;
            let value = 1.0 + vertex_density[id.raw() as usize] as f32;
            if value > volume[index] {
                volume[index] = value;
            }
        }

        Ok(DensityMap {
            vertex_density,
            volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Vertices (0..n, 0, 0) connected in a line.
    fn line_graph(n: i64, scale_factor: f64) -> VoxelGraph {
        let mut graph = VoxelGraph::new(scale_factor, [n as usize + 2, 1, 1]);
        for x in 0..n {
            graph.ensure_vertex(Voxel::new(x, 0, 0));
        }
        for x in 1..n {
            graph.ensure_edge(Voxel::new(x - 1, 0, 0), Voxel::new(x, 0, 0)).unwrap();
        }
        graph
    }

    #[test]
    fn test_average_edge_length() {
        assert_eq!(VoxelGraph::new(1.0, [1, 1, 1]).average_edge_length(), None);
        assert_relative_eq!(line_graph(4, 2.0).average_edge_length().unwrap(), 2.0);
    }

    #[test]
    fn test_geodesic_neighbors_bounded() {
        let graph = line_graph(5, 1.0);
        let source = graph.vertex_id(Voxel::new(0, 0, 0)).unwrap();

        let neighbors = graph.geodesic_neighbors(source, 2.5).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert!(!neighbors.contains_key(&source));
        let far = graph.vertex_id(Voxel::new(2, 0, 0)).unwrap();
        assert_relative_eq!(neighbors[&far], 2.0);
    }

    #[test]
    fn test_geodesic_prefers_shorter_path() {
        // Two unit edges a-b-c against the direct diagonal a-c of length √2.
        let mut graph = VoxelGraph::new(1.0, [3, 3, 1]);
        let a = Voxel::new(0, 0, 0);
        let b = Voxel::new(1, 0, 0);
        let c = Voxel::new(1, 1, 0);
        for v in [a, b, c] {
            graph.ensure_vertex(v);
        }
        graph.ensure_edge(a, b).unwrap();
        graph.ensure_edge(b, c).unwrap();
        graph.ensure_edge(a, c).unwrap();

        let source = graph.vertex_id(a).unwrap();
        let neighbors = graph.geodesic_neighbors(source, 10.0).unwrap();
        assert_relative_eq!(neighbors[&graph.vertex_id(c).unwrap()], 2f64.sqrt());
    }

    #[test]
    fn test_geodesic_unknown_source() {
        let graph = line_graph(2, 1.0);
        assert!(graph.geodesic_neighbors(VertexId(7), 1.0).is_err());
    }

    #[test]
    fn test_density_single_target() {
        let graph = line_graph(3, 1.0);
        let density = graph.density_for_voxels(&[Voxel::new(0, 0, 0)]).unwrap();

        assert_relative_eq!(density.vertex_density[0], 1.0);
        assert_relative_eq!(density.vertex_density[1], 0.5);
        assert_relative_eq!(density.vertex_density[2], 1.0 / 3.0);

        assert_relative_eq!(density.volume[[0, 0, 0]], 2.0);
        assert_relative_eq!(density.volume[[2, 0, 0]], 1.0 + 1.0 / 3.0f32);
        assert_eq!(density.volume[[3, 0, 0]], 0.0);
    }

    #[test]
    fn test_density_unreachable_target() {
        let mut graph = line_graph(2, 1.0);
        graph.ensure_vertex(Voxel::new(3, 0, 0));
        let density = graph.density_for_voxels(&[Voxel::new(3, 0, 0)]).unwrap();

        assert_eq!(density.vertex_density[0], 0.0);
        assert_eq!(density.volume[[0, 0, 0]], 1.0);
        assert_eq!(density.volume[[3, 0, 0]], 2.0);
    }

    #[test]
    fn test_density_from_mask_and_coordinates_agree() {
        let graph = line_graph(3, 2.0);
        let mut mask = Array3::<u8>::zeros((5, 1, 1));
        mask[[2, 0, 0]] = 1;

        let from_mask = graph.density_from_mask(&mask).unwrap();
        let from_coords = graph.density_from_coordinates(&[[4.0, 0.0, 0.0]]).unwrap();
        assert_eq!(from_mask.vertex_density, from_coords.vertex_density);
    }

    #[test]
    fn test_density_rejects_non_finite_coordinates() {
        let graph = line_graph(3, 1.0);
        for bad in [[f64::NAN; 3], [0.0, f64::INFINITY, 0.0], [f64::NEG_INFINITY, 0.0, 0.0]] {
            assert!(matches!(
                graph.density_from_coordinates(&[[0.0; 3], bad]),
                Err(VoxelError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_density_rejects_bad_targets() {
        let graph = line_graph(3, 1.0);
        assert!(graph.density_for_voxels(&[]).is_err());
        assert!(graph.density_for_voxels(&[Voxel::new(0, 0, 1)]).is_err());
        assert!(graph.density_from_mask(&Array3::<u8>::zeros((2, 2, 2))).is_err());
    }
}
