//! 26-connected foreground neighborhood of a voxel.

use ndarray::{ArrayBase, Data, Ix3};

use super::set::mask_shape;
use super::{MaskValue, Voxel};

/// The 26 offsets of the 3×3×3 cube around a voxel, without the zero offset.
///
/// Ordered x-major like the scan order of a mask, so neighbor lists come out
/// in a deterministic order.
pub const NEIGHBOR_OFFSETS: [[i64; 3]; 26] = {
    let mut offsets = [[0i64; 3]; 26];
    let mut n = 0;
    let mut i = 0;
    while i < 27 {
        let offset = [(i / 9) as i64 - 1, ((i / 3) % 3) as i64 - 1, (i % 3) as i64 - 1];
        if !(offset[0] == 0 && offset[1] == 0 && offset[2] == 0) {
            offsets[n] = offset;
            n += 1;
        }
        i += 1;
    }
    offsets
};

/// Foreground voxels among the 26 neighbors of `voxel`.
///
/// Neighbors outside the mask bounds are skipped. `voxel` itself does not
/// have to be inside the mask or foreground.
pub fn foreground_neighbors<S, T>(mask: &ArrayBase<S, Ix3>, voxel: Voxel) -> Vec<Voxel>
where
    S: Data<Elem = T>,
    T: MaskValue,
{
    let shape = mask_shape(mask);
    let mut neighbors = Vec::with_capacity(NEIGHBOR_OFFSETS.len());
    for offset in NEIGHBOR_OFFSETS {
        let Some(candidate) = voxel.offset(offset) else {
            continue;
        };
        if let Some(index) = candidate.to_index(shape) {
            if mask[index].is_foreground() {
                neighbors.push(candidate);
            }
        }
    }
    neighbors
}
