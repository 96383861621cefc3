//! Foreground extraction and conversions between voxel lists and N×3 tables.

use log::{debug, info, warn};
use ndarray::{Array2, Array3, ArrayBase, ArrayView2, ArrayView3, ArrayViewD, Data, Ix2, Ix3};

use super::{MaskValue, Voxel};
use crate::error::{Result, VoxelError};

/// Shape of a 3D mask as an array.
#[inline]
pub(crate) fn mask_shape<S, T>(mask: &ArrayBase<S, Ix3>) -> [usize; 3]
where
    S: Data<Elem = T>,
{
    let (x, y, z) = mask.dim();
    [x, y, z]
}

/// View a dynamically-shaped array as a 3D mask.
///
/// Fails with `InvalidInput` unless the array has exactly three dimensions.
pub fn as_mask_3d<'a, T>(mask: ArrayViewD<'a, T>) -> Result<ArrayView3<'a, T>> {
    let ndim = mask.ndim();
    mask.into_dimensionality::<Ix3>().map_err(|_| {
        VoxelError::invalid(format!("mask has to be a 3D array, got {ndim} dimensions"))
    })
}

/// Build an owned mask from a flat buffer in x-major (row-major) order.
pub fn mask_from_flat<T>(dims: [usize; 3], data: Vec<T>) -> Result<Array3<T>> {
    let len = data.len();
    Array3::from_shape_vec((dims[0], dims[1], dims[2]), data).map_err(|_| {
        VoxelError::invalid(format!(
            "a buffer of {len} values does not fill a mask of shape {dims:?}"
        ))
    })
}

/// All foreground voxels of `mask`, in row-major scan order.
pub fn foreground_voxels<S, T>(mask: &ArrayBase<S, Ix3>) -> Vec<Voxel>
where
    S: Data<Elem = T>,
    T: MaskValue,
{
    mask.indexed_iter()
        .filter(|(_, value)| value.is_foreground())
        .map(|(index, _)| Voxel::from(index))
        .collect()
}

fn as_table<'a, T>(points: ArrayViewD<'a, T>) -> Result<ArrayView2<'a, T>> {
    let shape = points.shape().to_vec();
    let table = points.into_dimensionality::<Ix2>().map_err(|_| {
        VoxelError::invalid(format!("points have to be an N×3 table, got shape {shape:?}"))
    })?;
    if table.ncols() != 3 {
        return Err(VoxelError::invalid(format!(
            "points have to be an N×3 table, got shape {shape:?}"
        )));
    }
    Ok(table)
}

/// Convert an N×3 integer table into voxels.
pub fn voxels_from_point_array(points: ArrayViewD<'_, i64>) -> Result<Vec<Voxel>> {
    let table = as_table(points)?;
    Ok(table
        .rows()
        .into_iter()
        .map(|row| Voxel::new(row[0], row[1], row[2]))
        .collect())
}

/// Convert voxels into an N×3 table. The shape is `(N, 3)` even for N = 0.
pub fn point_array_from_voxels(voxels: &[Voxel]) -> Array2<i64> {
    Array2::from_shape_fn((voxels.len(), 3), |(i, j)| voxels[i].to_array()[j])
}

/// Convert an N×3 real-valued table (e.g. particle centers) into points.
pub fn points_from_array(points: ArrayViewD<'_, f64>) -> Result<Vec<[f64; 3]>> {
    let table = as_table(points)?;
    Ok(table
        .rows()
        .into_iter()
        .map(|row| [row[0], row[1], row[2]])
        .collect())
}

/// Convert points into an N×3 table.
pub fn point_array_from_points(points: &[[f64; 3]]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 3), |(i, j)| points[i][j])
}

/// Read `[x0, y0, z0, x1, ...]` as points.
pub fn points_from_flat(flat: &[f64]) -> Result<Vec<[f64; 3]>> {
    if flat.len() % 3 != 0 {
        return Err(VoxelError::invalid(format!(
            "flat point buffer length {} is not a multiple of 3",
            flat.len()
        )));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Write points as `[x0, y0, z0, x1, ...]`.
pub fn flatten_points(points: &[[f64; 3]]) -> Vec<f64> {
    points.iter().flat_map(|p| p.iter().copied()).collect()
}

/// Multiply every coordinate by `scale_factor`.
pub fn scale_points(points: &[[f64; 3]], scale_factor: f64) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| [p[0] * scale_factor, p[1] * scale_factor, p[2] * scale_factor])
        .collect()
}

/// Foreground voxels of `target_mask` that are also foreground in
/// `membrane_mask`.
///
/// Both masks must have the same shape. Targets outside the membrane are
/// dropped with a warning.
pub fn targets_in_membrane<S1, S2, T, U>(
    target_mask: &ArrayBase<S1, Ix3>,
    membrane_mask: &ArrayBase<S2, Ix3>,
    verbose: bool,
) -> Result<Vec<Voxel>>
where
    S1: Data<Elem = T>,
    S2: Data<Elem = U>,
    T: MaskValue,
    U: MaskValue,
{
    let target_shape = mask_shape(target_mask);
    let membrane_shape = mask_shape(membrane_mask);
    if target_shape != membrane_shape {
        return Err(VoxelError::invalid(format!(
            "target mask shape {target_shape:?} differs from membrane mask shape {membrane_shape:?}"
        )));
    }

    let targets = foreground_voxels(target_mask);
    info!("{} target voxels", targets.len());
    if verbose {
        debug!("target voxels: {targets:?}");
    }

    let mut inside = Vec::with_capacity(targets.len());
    for target in targets {
        let in_membrane = target
            .to_index(membrane_shape)
            .is_some_and(|index| membrane_mask[index].is_foreground());
        if in_membrane {
            inside.push(target);
        } else {
            warn!("target voxel {target} is not inside the membrane");
        }
    }

    info!("{} target voxels in membrane", inside.len());
    if verbose {
        debug!("target voxels in membrane: {inside:?}");
    }
    Ok(inside)
}
