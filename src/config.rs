//! Configuration for building a surface graph.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxelError};

/// Configuration for [`VoxelGraphBuilder`](crate::graph::VoxelGraphBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// Voxel edge length in physical units, e.g. nanometers (default: 1.0).
    pub scale_factor: f64,
    /// Expected mask shape `[x, y, z]`. Has to be set.
    pub dims: [usize; 3],
    /// Log progress every this many remaining worklist items (default: 1000).
    pub progress_interval: usize,
    /// Log every expansion step at debug level (default: false).
    pub verbose: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            dims: [0, 0, 0],
            progress_interval: 1000,
            verbose: false,
        }
    }
}

impl GraphConfig {
    /// Config with the given scale factor and dims, defaults elsewhere.
    pub fn new(scale_factor: f64, dims: [usize; 3]) -> Self {
        Self {
            scale_factor,
            dims,
            ..Self::default()
        }
    }

    /// Check the scale factor is positive and finite and no axis is empty.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(VoxelError::invalid(format!(
                "scale factor has to be positive and finite, got {}",
                self.scale_factor
            )));
        }
        if self.dims.contains(&0) {
            return Err(VoxelError::invalid(format!(
                "dims have to be non-zero on every axis, got {:?}",
                self.dims
            )));
        }
        Ok(())
    }
}
