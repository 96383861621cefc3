//! Voxel coordinates and dense 3D masks.
//!
//! A mask is any `ndarray` 3D array whose element type implements
//! [`MaskValue`]. Non-zero cells are foreground (the membrane), zero cells are
//! background. Voxels are addressed as `(x, y, z)` in array index order.

mod neighbors;
mod rescale;
mod set;

pub use neighbors::{foreground_neighbors, NEIGHBOR_OFFSETS};
pub use rescale::rescale;
pub use set::{
    as_mask_3d, flatten_points, foreground_voxels, mask_from_flat, point_array_from_points,
    point_array_from_voxels, points_from_array, points_from_flat, scale_points,
    targets_in_membrane, voxels_from_point_array,
};

pub(crate) use set::mask_shape;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer coordinate of a cell in a dense 3D grid.
///
/// Components are signed so that neighbor offsets can step below zero before
/// the bounds check rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Voxel {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Voxel {
    /// Create a voxel from its three components.
    #[inline]
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Components as an array.
    #[inline]
    pub fn to_array(self) -> [i64; 3] {
        [self.x, self.y, self.z]
    }

    /// The voxel shifted by `offset`, or `None` if a component overflows.
    #[inline]
    pub fn offset(self, offset: [i64; 3]) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(offset[0])?,
            self.y.checked_add(offset[1])?,
            self.z.checked_add(offset[2])?,
        ))
    }

    /// Component-wise multiplication into physical units.
    #[inline]
    pub fn scaled(self, scale_factor: f64) -> [f64; 3] {
        [
            self.x as f64 * scale_factor,
            self.y as f64 * scale_factor,
            self.z as f64 * scale_factor,
        ]
    }

    /// Array index of this voxel, or `None` when it lies outside `shape`.
    #[inline]
    pub fn to_index(self, shape: [usize; 3]) -> Option<[usize; 3]> {
        let axis = |c: i64, len: usize| usize::try_from(c).ok().filter(|&i| i < len);
        Some([
            axis(self.x, shape[0])?,
            axis(self.y, shape[1])?,
            axis(self.z, shape[2])?,
        ])
    }

    /// Nearest voxel to a physical coordinate.
    ///
    /// `None` if a component is not finite or does not fit an `i64` after
    /// scaling.
    #[inline]
    pub fn from_scaled(xyz: [f64; 3], scale_factor: f64) -> Option<Self> {
        let axis = |c: f64| {
            let r = (c / scale_factor).round();
            (r.is_finite() && r >= i64::MIN as f64 && r < i64::MAX as f64).then_some(r as i64)
        };
        Some(Self::new(axis(xyz[0])?, axis(xyz[1])?, axis(xyz[2])?))
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<[i64; 3]> for Voxel {
    #[inline]
    fn from(c: [i64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<Voxel> for [i64; 3] {
    #[inline]
    fn from(v: Voxel) -> Self {
        v.to_array()
    }
}

impl From<(usize, usize, usize)> for Voxel {
    #[inline]
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Self::new(x as i64, y as i64, z as i64)
    }
}

/// Element types that can be read as foreground/background.
pub trait MaskValue: Copy {
    /// True for foreground (non-zero) cells.
    fn is_foreground(&self) -> bool;
}

impl MaskValue for bool {
    #[inline]
    fn is_foreground(&self) -> bool {
        *self
    }
}

macro_rules! impl_mask_value_int {
    ($($t:ty),*) => {
        $(impl MaskValue for $t {
            #[inline]
            fn is_foreground(&self) -> bool {
                *self != 0
            }
        })*
    };
}

macro_rules! impl_mask_value_float {
    ($($t:ty),*) => {
        $(impl MaskValue for $t {
            #[inline]
            fn is_foreground(&self) -> bool {
                *self != 0.0
            }
        })*
    };
}

impl_mask_value_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
impl_mask_value_float!(f32, f64);
