//! Membrane Graph - WASM Module
//!
//! Turns a binary 3D membrane segmentation into a weighted surface graph:
//! every foreground voxel becomes a vertex and every pair of 26-connected
//! foreground voxels an edge weighted by the scaled Euclidean distance.
//! Particle coordinates can then be mapped onto the graph and geodesic
//! measures computed over it. The crate builds natively and to WebAssembly,
//! where it exposes a JavaScript-friendly API via wasm-bindgen.
//!
//! # Architecture
//!
//! - `voxel`: voxel coordinates, masks, 26-neighborhoods and rescaling
//! - `graph`: the surface graph on petgraph's StableGraph, its builder,
//!   geodesic measures and persistence
//! - `spatial`: R-tree nearest-neighbor mapping of particles onto vertices
//! - `config`, `error`, `logging`: build configuration, the error type and
//!   the browser console logger

use js_sys::{Float32Array, Float64Array};
use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod spatial;
pub mod voxel;

pub use config::GraphConfig;
pub use error::{Result, VoxelError};
pub use graph::{BuildReport, CancelToken, VertexId, VoxelGraph, VoxelGraphBuilder};
pub use voxel::{MaskValue, Voxel};

use spatial::nearest_within_radius;
use voxel::{flatten_points, mask_from_flat, points_from_flat};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // The host page may already have installed a logger.
    let _ = logging::init_console_logging();
}

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Main entry point for building membrane graphs.
///
/// Wraps a [`VoxelGraphBuilder`] for masks of a fixed shape. Masks are passed
/// as flat `Uint8Array`s in x-major order, i.e. index `(x * dim_y + y) * dim_z + z`.
#[wasm_bindgen]
pub struct MembraneGraphWasm {
    builder: VoxelGraphBuilder,
}

#[wasm_bindgen]
impl MembraneGraphWasm {
    /// Create an empty graph for masks of shape `(dim_x, dim_y, dim_z)`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        scale_factor: f64,
        dim_x: usize,
        dim_y: usize,
        dim_z: usize,
    ) -> std::result::Result<MembraneGraphWasm, JsError> {
        Ok(Self {
            builder: VoxelGraphBuilder::new(scale_factor, [dim_x, dim_y, dim_z])?,
        })
    }

    /// Create an empty graph from a config object
    /// (`{ scaleFactor, dims, progressInterval, verbose }`).
    #[wasm_bindgen(js_name = fromConfig)]
    pub fn from_config(config: JsValue) -> std::result::Result<MembraneGraphWasm, JsError> {
        let config: GraphConfig = serde_wasm_bindgen::from_value(config).map_err(js_error)?;
        Ok(Self {
            builder: VoxelGraphBuilder::from_config(&config)?,
        })
    }

    /// Add every foreground voxel of `mask` and its 26-neighborhood to the
    /// graph. Returns the build report as a plain object.
    #[wasm_bindgen(js_name = buildFromMask)]
    pub fn build_from_mask(&mut self, mask: &[u8]) -> std::result::Result<JsValue, JsError> {
        let dims = self.builder.config().dims;
        let verbose = self.builder.config().verbose;
        let mask = mask_from_flat(dims, mask.to_vec())?;
        let report = self.builder.build(&mask, verbose)?;
        serde_wasm_bindgen::to_value(&report).map_err(js_error)
    }

    /// Get the number of vertices in the graph.
    #[wasm_bindgen(js_name = vertexCount)]
    pub fn vertex_count(&self) -> u32 {
        self.builder.graph().vertex_count() as u32
    }

    /// Get the number of edges in the graph.
    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.builder.graph().edge_count() as u32
    }

    /// Mean edge distance, undefined for a graph without edges.
    #[wasm_bindgen(js_name = averageEdgeLength)]
    pub fn average_edge_length(&self) -> Option<f64> {
        self.builder.graph().average_edge_length()
    }

    /// Scaled vertex coordinates as `[x0, y0, z0, x1, ...]` in vertex order.
    #[wasm_bindgen(js_name = vertexCoordinates)]
    pub fn vertex_coordinates(&self) -> Float64Array {
        Float64Array::from(&flatten_points(&self.reference_points())[..])
    }

    /// For each particle in `[x0, y0, z0, ...]`, the coordinates of the
    /// nearest vertex within `radius`, or `[-1, -1, -1]` when there is none.
    #[wasm_bindgen(js_name = nearestVertices)]
    pub fn nearest_vertices(
        &self,
        particles: &[f64],
        radius: f64,
    ) -> std::result::Result<Float64Array, JsError> {
        let queries = points_from_flat(particles)?;
        let matched = nearest_within_radius(&self.reference_points(), &queries, radius);
        Ok(Float64Array::from(&flatten_points(&matched)[..]))
    }

    /// Particle density volume for the target voxels in `targets`, a flat
    /// mask of the graph's dims. Returned flat in x-major order.
    #[wasm_bindgen(js_name = densityFromMask)]
    pub fn density_from_mask(&self, targets: &[u8]) -> std::result::Result<Float32Array, JsError> {
        let graph = self.builder.graph();
        let targets = mask_from_flat(graph.dims(), targets.to_vec())?;
        let density = graph.density_from_mask(&targets)?;
        let volume: Vec<f32> = density.volume.iter().copied().collect();
        Ok(Float32Array::from(&volume[..]))
    }

    /// Serialize the graph to JSON.
    #[wasm_bindgen(js_name = toJson)]
    pub fn to_json(&self) -> std::result::Result<String, JsError> {
        Ok(self.builder.graph().to_json_string()?)
    }

    /// Load a graph written by `toJson`. Lookup tables are rebuilt, so the
    /// graph can be extended with further `buildFromMask` calls.
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> std::result::Result<MembraneGraphWasm, JsError> {
        let graph = VoxelGraph::from_json_str(json)?;
        Ok(Self {
            builder: VoxelGraphBuilder::from_graph(graph)?,
        })
    }

    fn reference_points(&self) -> Vec<[f64; 3]> {
        self.builder.graph().vertices().map(|(_, v)| v.xyz).collect()
    }
}

/// Map the foreground of a flat mask into a mask of shape `(out_x, out_y,
/// out_z)`, multiplying voxel coordinates by `scale_factor` and flooring.
#[wasm_bindgen(js_name = rescaleMask)]
#[allow(clippy::too_many_arguments)]
pub fn rescale_mask(
    mask: &[u8],
    dim_x: usize,
    dim_y: usize,
    dim_z: usize,
    scale_factor: f64,
    out_x: usize,
    out_y: usize,
    out_z: usize,
) -> std::result::Result<Vec<u8>, JsError> {
    let input = mask_from_flat([dim_x, dim_y, dim_z], mask.to_vec())?;
    let output = voxel::rescale(&input, scale_factor, [out_x, out_y, out_z])?;
    Ok(output.iter().copied().collect())
}

/// For each query point, the nearest reference point within `radius`, or
/// `[-1, -1, -1]`. Both buffers are flat `[x0, y0, z0, ...]`.
#[wasm_bindgen(js_name = nearestWithinRadius)]
pub fn nearest_within_radius_flat(
    reference: &[f64],
    queries: &[f64],
    radius: f64,
) -> std::result::Result<Float64Array, JsError> {
    let reference = points_from_flat(reference)?;
    let queries = points_from_flat(queries)?;
    let matched = nearest_within_radius(&reference, &queries, radius);
    Ok(Float64Array::from(&flatten_points(&matched)[..]))
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::spatial::NO_MATCH;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    /// The same pipeline `buildFromMask` + `toJson` + `fromJson` run,
    /// but without wasm_bindgen JS types.
    #[test]
    fn test_flat_mask_build_and_reload() {
        let dims = [3, 3, 3];
        let mut flat = vec![0u8; 27];
        // (1, 1, 0), (1, 1, 1), (1, 1, 2): a line along z.
        for z in 0..3 {
            flat[(3 + 1) * 3 + z] = 1;
        }
        let mask = mask_from_flat(dims, flat).unwrap();

        let mut builder = VoxelGraphBuilder::new(2.0, dims).unwrap();
        let report = builder.build(&mask, false).unwrap();
        assert_eq!(report.foreground, 3);
        assert_eq!(builder.graph().vertex_count(), 3);
        assert_eq!(builder.graph().edge_count(), 2);

        let json = builder.graph().to_json_string().unwrap();
        let graph = VoxelGraph::from_json_str(&json).unwrap();
        let mut reloaded = VoxelGraphBuilder::from_graph(graph).unwrap();
        assert!(reloaded.graph().vertex_id(Voxel::new(1, 1, 2)).is_some());

        // Building the same mask again adds nothing.
        let again = reloaded.build(&mask, false).unwrap();
        assert_eq!(again.vertices_added, 0);
        assert_eq!(again.edges_added, 0);
        assert_eq!(reloaded.graph().edge_count(), 2);
    }

    #[test]
    fn test_particles_onto_vertices() {
        let mut mask = Array3::<u8>::zeros((4, 4, 4));
        mask[[0, 0, 0]] = 1;
        mask[[3, 3, 3]] = 1;
        let mut builder = VoxelGraphBuilder::new(1.5, [4, 4, 4]).unwrap();
        builder.build(&mask, false).unwrap();

        let reference: Vec<[f64; 3]> = builder
            .graph()
            .vertices()
            .map(|(_, v)| v.xyz)
            .collect();
        let particles = points_from_flat(&[0.5, 0.0, 0.0, 4.4, 4.5, 4.5, 2.0, 2.0, 2.0]).unwrap();
        let matched = nearest_within_radius(&reference, &particles, 1.0);

        assert_eq!(matched[0], [0.0, 0.0, 0.0]);
        assert_eq!(matched[1], [4.5, 4.5, 4.5]);
        assert_eq!(matched[2], NO_MATCH);
    }

    #[test]
    fn test_rescale_then_build() {
        let mut mask = Array3::<u8>::zeros((4, 4, 4));
        mask[[2, 2, 2]] = 1;
        mask[[3, 3, 3]] = 1;
        let half = voxel::rescale(&mask, 0.5, [2, 2, 2]).unwrap();
        assert_eq!(half.iter().filter(|&&v| v == 1).count(), 1);

        let mut builder = VoxelGraphBuilder::new(2.0, [2, 2, 2]).unwrap();
        builder.build(&half, false).unwrap();
        assert_eq!(builder.graph().vertex_count(), 1);
        assert_eq!(builder.graph().average_edge_length(), None);
    }

    #[test]
    fn test_density_volume_layout() {
        let mut mask = Array3::<u8>::zeros((3, 1, 1));
        mask.fill(1);
        let mut builder = VoxelGraphBuilder::new(1.0, [3, 1, 1]).unwrap();
        builder.build(&mask, false).unwrap();

        let mut targets = Array3::<u8>::zeros((3, 1, 1));
        targets[[1, 0, 0]] = 1;
        let density = builder.graph().density_from_mask(&targets).unwrap();
        let flat: Vec<f32> = density.volume.iter().copied().collect();
        assert_relative_eq!(flat[0], 1.5);
        assert_relative_eq!(flat[1], 2.0);
        assert_relative_eq!(flat[2], 1.5);
    }
}
