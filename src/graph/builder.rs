//! Expansion of a membrane mask into a [`VoxelGraph`].
//!
//! # Algorithm
//!
//! 1. Collect the foreground voxels of the mask into a worklist.
//! 2. Pop voxels off the end of the worklist (LIFO) until it is empty.
//! 3. For each popped voxel: look up or create its vertex, then for each of
//!    its 26-connected foreground neighbors look up or create the neighbor's
//!    vertex and connect the two unless they already are.
//!
//! Neighbors discovered in step 3 become vertices but are not pushed back on
//! the worklist; only the voxels originally in the worklist are expanded.
//! A failing step (a worklist voxel outside the mask or not foreground) is
//! recorded in the [`BuildReport`] and the loop moves on.

use log::{debug, info, trace, warn};
use ndarray::{ArrayBase, Data, Ix3};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::surface::VoxelGraph;
use crate::config::GraphConfig;
use crate::error::{Result, VoxelError};
use crate::voxel::{foreground_neighbors, foreground_voxels, mask_shape, MaskValue, Voxel};

/// Cooperative cancellation flag, checked once per expansion step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A worklist item whose expansion failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedVoxel {
    pub voxel: Voxel,
    pub reason: String,
}

/// Summary of one expansion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Worklist size at the start.
    pub foreground: usize,
    /// Worklist items expanded successfully.
    pub expanded: usize,
    /// Vertices created during this run.
    pub vertices_added: usize,
    /// Edges created during this run.
    pub edges_added: usize,
    /// Items that failed and were skipped.
    pub skipped: Vec<SkippedVoxel>,
}

#[derive(Debug, Default, Clone, Copy)]
struct StepCounts {
    vertices: usize,
    edges: usize,
}

/// Builds a [`VoxelGraph`] from membrane masks of a fixed shape.
///
/// The builder owns the graph and its indices for the whole build.
pub struct VoxelGraphBuilder {
    graph: VoxelGraph,
    config: GraphConfig,
    cancel: CancelToken,
}

impl VoxelGraphBuilder {
    /// Builder for masks of shape `dims`, scaling voxels by `scale_factor`.
    pub fn new(scale_factor: f64, dims: [usize; 3]) -> Result<Self> {
        Self::from_config(&GraphConfig::new(scale_factor, dims))
    }

    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph: VoxelGraph::new(config.scale_factor, config.dims),
            config: config.clone(),
            cancel: CancelToken::new(),
        })
    }

    /// Continue building on an existing (e.g. loaded) graph.
    ///
    /// Rebuilds the graph's coordinate index first.
    pub fn from_graph(mut graph: VoxelGraph) -> Result<Self> {
        let config = GraphConfig::new(graph.scale_factor(), graph.dims());
        config.validate()?;
        graph.rebuild_coordinate_index();
        Ok(Self {
            graph,
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Use `token` to cancel later builds.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn graph(&self) -> &VoxelGraph {
        &self.graph
    }

    pub fn into_graph(self) -> VoxelGraph {
        self.graph
    }

    /// See [`VoxelGraph::rebuild_coordinate_index`].
    pub fn rebuild_coordinate_index(&mut self) {
        self.graph.rebuild_coordinate_index();
    }

    /// Add every foreground voxel of `mask` and its adjacencies to the graph.
    ///
    /// Fails with `InvalidInput` if the mask shape differs from the configured
    /// dims.
    pub fn build<S, T>(&mut self, mask: &ArrayBase<S, Ix3>, verbose: bool) -> Result<BuildReport>
    where
        S: Data<Elem = T>,
        T: MaskValue,
    {
        self.check_shape(mask)?;
        let foreground = foreground_voxels(mask);
        info!("{} membrane voxels", foreground.len());
        if verbose {
            debug!("membrane voxels: {foreground:?}");
        }
        self.expand_from(mask, foreground, verbose)
    }

    /// Expand the voxels of `worklist`, last one first.
    ///
    /// A worklist item outside the mask or on background is skipped and
    /// reported. Returns
    /// `Cancelled` if the cancel token fires; the graph keeps everything
    /// expanded so far.
    pub fn expand_from<S, T>(
        &mut self,
        mask: &ArrayBase<S, Ix3>,
        mut worklist: Vec<Voxel>,
        verbose: bool,
    ) -> Result<BuildReport>
    where
        S: Data<Elem = T>,
        T: MaskValue,
    {
        self.check_shape(mask)?;
        let mut report = BuildReport {
            foreground: worklist.len(),
            ..BuildReport::default()
        };
        let interval = self.config.progress_interval;

        while let Some(voxel) = worklist.pop() {
            let remaining = worklist.len() + 1;
            if self.cancel.is_cancelled() {
                warn!("expansion cancelled with {remaining} remaining membrane voxels");
                return Err(VoxelError::Cancelled { remaining });
            }
            if verbose {
                debug!("{remaining} remaining membrane voxels, expanding {voxel}");
            } else if interval > 0 && remaining % interval == 0 {
                info!("{remaining} remaining membrane voxels");
            }

            match self.expand_voxel(mask, voxel, verbose) {
                Ok(step) => {
                    report.expanded += 1;
                    report.vertices_added += step.vertices;
                    report.edges_added += step.edges;
                }
                Err(err) => {
                    warn!("skipping voxel {voxel} with {remaining} remaining: {err}");
                    report.skipped.push(SkippedVoxel {
                        voxel,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            "expansion done: {} vertices added, {} edges added, {} skipped",
            report.vertices_added,
            report.edges_added,
            report.skipped.len()
        );
        Ok(report)
    }

    fn expand_voxel<S, T>(
        &mut self,
        mask: &ArrayBase<S, Ix3>,
        voxel: Voxel,
        verbose: bool,
    ) -> Result<StepCounts>
    where
        S: Data<Elem = T>,
        T: MaskValue,
    {
        let shape = self.graph.dims();
        let index = voxel
            .to_index(shape)
            .ok_or(VoxelError::OutOfBounds { voxel, shape })?;
        if !mask[index].is_foreground() {
            return Err(VoxelError::invalid(format!("voxel {voxel} is not foreground")));
        }

        let mut step = StepCounts::default();
        let (_, created) = self.graph.ensure_vertex(voxel);
        if created {
            step.vertices += 1;
            if verbose {
                debug!("voxel {voxel} added as vertex");
            }
        }

        for neighbor in foreground_neighbors(mask, voxel) {
            let (_, created) = self.graph.ensure_vertex(neighbor);
            if created {
                step.vertices += 1;
                if verbose {
                    debug!("neighbor voxel {neighbor} added as vertex");
                }
            }
            if self.graph.ensure_edge(voxel, neighbor)? {
                step.edges += 1;
                if verbose {
                    trace!("connected {voxel} and {neighbor}");
                }
            }
        }
        Ok(step)
    }

    fn check_shape<S, T>(&self, mask: &ArrayBase<S, Ix3>) -> Result<()>
    where
        S: Data<Elem = T>,
    {
        let shape = mask_shape(mask);
        if shape != self.graph.dims() {
            return Err(VoxelError::invalid(format!(
                "mask shape {shape:?} differs from the graph dims {:?}",
                self.graph.dims()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn line_mask() -> Array3<u8> {
        let mut mask = Array3::<u8>::zeros((5, 1, 1));
        for x in 0..3 {
            mask[[x, 0, 0]] = 1;
        }
        mask
    }

    #[test]
    fn test_build_line() {
        let mut builder = VoxelGraphBuilder::new(2.0, [5, 1, 1]).unwrap();
        let report = builder.build(&line_mask(), false).unwrap();

        assert_eq!(report.foreground, 3);
        assert_eq!(report.expanded, 3);
        assert_eq!(report.vertices_added, 3);
        assert_eq!(report.edges_added, 2);
        assert!(report.skipped.is_empty());

        let graph = builder.graph();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        for (_, _, edge) in graph.edges() {
            assert_relative_eq!(edge.distance, 2.0);
        }
    }

    #[test]
    fn test_build_rejects_wrong_shape() {
        let mut builder = VoxelGraphBuilder::new(1.0, [4, 1, 1]).unwrap();
        let err = builder.build(&line_mask(), false).unwrap_err();
        assert!(matches!(err, VoxelError::InvalidInput(_)));
        assert_eq!(builder.graph().vertex_count(), 0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(VoxelGraphBuilder::new(0.0, [1, 1, 1]).is_err());
        assert!(VoxelGraphBuilder::new(1.0, [0, 1, 1]).is_err());
    }

    #[test]
    fn test_rebuild_is_stable() {
        let mut builder = VoxelGraphBuilder::new(1.0, [5, 1, 1]).unwrap();
        builder.build(&line_mask(), false).unwrap();
        let report = builder.build(&line_mask(), true).unwrap();

        assert_eq!(report.vertices_added, 0);
        assert_eq!(report.edges_added, 0);
        assert_eq!(builder.graph().vertex_count(), 3);
        assert_eq!(builder.graph().edge_count(), 2);
    }

    #[test]
    fn test_out_of_bounds_seed_is_skipped() {
        let mut builder = VoxelGraphBuilder::new(1.0, [5, 1, 1]).unwrap();
        let worklist = vec![Voxel::new(0, 0, 0), Voxel::new(9, 0, 0), Voxel::new(1, 0, 0)];
        let report = builder.expand_from(&line_mask(), worklist, false).unwrap();

        assert_eq!(report.expanded, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].voxel, Voxel::new(9, 0, 0));
        assert_eq!(builder.graph().vertex_count(), 3);
        assert_eq!(builder.graph().edge_count(), 2);
    }

    #[test]
    fn test_background_seed_is_skipped() {
        let mut builder = VoxelGraphBuilder::new(1.0, [5, 1, 1]).unwrap();
        let worklist = vec![Voxel::new(4, 0, 0), Voxel::new(3, 0, 0)];
        let report = builder.expand_from(&line_mask(), worklist, false).unwrap();

        assert_eq!(report.expanded, 0);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].voxel, Voxel::new(3, 0, 0));
        assert_eq!(builder.graph().vertex_count(), 0);
        assert_eq!(builder.graph().vertex_id(Voxel::new(3, 0, 0)), None);
    }

    #[test]
    fn test_neighbors_not_reexpanded() {
        // Only (0,0,0) is expanded, so (2,0,0) never becomes a vertex.
        let mut builder = VoxelGraphBuilder::new(1.0, [5, 1, 1]).unwrap();
        let report = builder
            .expand_from(&line_mask(), vec![Voxel::new(0, 0, 0)], false)
            .unwrap();

        assert_eq!(report.vertices_added, 2);
        assert_eq!(report.edges_added, 1);
        assert_eq!(builder.graph().vertex_id(Voxel::new(2, 0, 0)), None);
    }

    #[test]
    fn test_cancelled_build() {
        let token = CancelToken::new();
        let mut builder = VoxelGraphBuilder::new(1.0, [5, 1, 1])
            .unwrap()
            .with_cancel_token(token.clone());
        token.cancel();

        let err = builder.build(&line_mask(), false).unwrap_err();
        assert!(matches!(err, VoxelError::Cancelled { remaining: 3 }));
        assert_eq!(builder.graph().vertex_count(), 0);
    }

    #[test]
    fn test_from_graph_continues_expansion() {
        let mut builder = VoxelGraphBuilder::new(1.0, [5, 1, 1]).unwrap();
        builder
            .expand_from(&line_mask(), vec![Voxel::new(0, 0, 0)], false)
            .unwrap();

        let mut resumed = VoxelGraphBuilder::from_graph(builder.into_graph()).unwrap();
        let report = resumed.build(&line_mask(), false).unwrap();

        assert_eq!(report.vertices_added, 1);
        assert_eq!(report.edges_added, 1);
        assert_eq!(resumed.graph().vertex_count(), 3);
        assert_eq!(resumed.graph().edge_count(), 2);
    }
}
