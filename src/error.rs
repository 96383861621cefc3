//! Error types for mask handling, graph construction and persistence.

use thiserror::Error;

use crate::voxel::Voxel;

/// Errors produced by the voxel, graph and proximity operations.
#[derive(Error, Debug)]
pub enum VoxelError {
    /// Wrong shape, dimensionality or element layout, or two masks that
    /// should share dimensions do not.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A coordinate does not fit inside the target array.
    #[error("voxel {voxel} is outside of an array with shape {shape:?}")]
    OutOfBounds {
        /// The offending coordinate.
        voxel: Voxel,
        /// Shape of the array it was checked against.
        shape: [usize; 3],
    },

    /// Expansion was stopped through a [`CancelToken`](crate::graph::CancelToken).
    #[error("expansion cancelled with {remaining} voxels left")]
    Cancelled {
        /// Worklist items that were never expanded.
        remaining: usize,
    },

    /// I/O error while reading or writing a persisted graph.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted graph could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VoxelError {
    /// Shorthand for [`VoxelError::InvalidInput`].
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        VoxelError::InvalidInput(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VoxelError>;
