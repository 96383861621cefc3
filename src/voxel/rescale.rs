//! Resampling a mask's foreground into a differently-shaped mask.

use log::info;
use ndarray::{Array3, ArrayBase, Data, Ix3};

use super::set::foreground_voxels;
use super::{MaskValue, Voxel};
use crate::error::{Result, VoxelError};

/// Map every foreground voxel `(x, y, z)` of `input` to
/// `(floor(x * f), floor(y * f), floor(z * f))` in a zeroed mask of
/// `output_shape`.
///
/// Voxels landing on the same output cell merge. A scaled voxel outside
/// `output_shape` fails the whole call with `OutOfBounds`.
pub fn rescale<S, T>(
    input: &ArrayBase<S, Ix3>,
    scale_factor: f64,
    output_shape: [usize; 3],
) -> Result<Array3<u8>>
where
    S: Data<Elem = T>,
    T: MaskValue,
{
    if !(scale_factor.is_finite() && scale_factor > 0.0) {
        return Err(VoxelError::invalid(format!(
            "scale factor has to be positive and finite, got {scale_factor}"
        )));
    }

    let voxels = foreground_voxels(input);
    let mut output = Array3::<u8>::zeros((output_shape[0], output_shape[1], output_shape[2]));
    let scale = |c: i64| (c as f64 * scale_factor).floor() as i64;

    for voxel in &voxels {
        let target = Voxel::new(scale(voxel.x), scale(voxel.y), scale(voxel.z));
        let index = target.to_index(output_shape).ok_or(VoxelError::OutOfBounds {
            voxel: target,
            shape: output_shape,
        })?;
        output[index] = 1;
    }

    info!(
        "rescaled {} foreground voxels by {} into shape {:?}",
        voxels.len(),
        scale_factor,
        output_shape
    );
    Ok(output)
}
