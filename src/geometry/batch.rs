//! Batch-shape bookkeeping for dense `[*S, k...]` arrays.
//!
//! Batched values are stored as a flat row-major list of elements plus the
//! batch shape `S`. Shape manipulation (slicing, broadcasting, concatenation)
//! is done on an array of element ids with `ndarray`, then the ids are used to
//! gather elements. The numeric work stays on nalgebra types.

use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn, SliceInfoElem};

use crate::error::{GeometryError, GeometryResult};

/// Number of elements in a batch of the given shape (1 for the empty shape).
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major linear offset of a multi-index.
fn linear_offset(shape: &[usize], index: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |offset, (&i, &dim)| offset * dim + i)
}

/// Array of shape `shape` holding `0..n` in row-major order.
pub fn element_ids(shape: &[usize]) -> ArrayD<usize> {
    ArrayD::from_shape_fn(IxDyn(shape), |ix| linear_offset(shape, ix.slice()))
}

/// NumPy-style broadcast of two batch shapes.
pub fn broadcast_shapes(
    operation: &'static str,
    a: &[usize],
    b: &[usize],
) -> GeometryResult<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];

    for k in 0..ndim {
        let da = if k + a.len() >= ndim { a[k + a.len() - ndim] } else { 1 };
        let db = if k + b.len() >= ndim { b[k + b.len() - ndim] } else { 1 };
        out[k] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(GeometryError::shape_mismatch(
                    operation,
                    format!("batch shapes {:?} and {:?} do not broadcast", a, b),
                ));
            }
        };
    }
    Ok(out)
}

/// Element ids of `shape` broadcast to `target`, in row-major order of
/// `target`.
pub fn broadcast_ids(
    operation: &'static str,
    shape: &[usize],
    target: &[usize],
) -> GeometryResult<Vec<usize>> {
    let ids = element_ids(shape);
    let view = ids.broadcast(target).ok_or_else(|| {
        GeometryError::shape_mismatch(
            operation,
            format!("cannot broadcast {:?} to {:?}", shape, target),
        )
    })?;
    Ok(view.iter().copied().collect())
}

/// Normalise a possibly negative axis against `len` valid positions.
pub fn normalize_axis(operation: &'static str, axis: isize, len: usize) -> GeometryResult<usize> {
    let resolved = if axis < 0 { axis + len as isize } else { axis };
    if resolved < 0 || resolved as usize >= len {
        return Err(GeometryError::shape_mismatch(
            operation,
            format!("axis {} out of range for {} positions", axis, len),
        ));
    }
    Ok(resolved as usize)
}

/// Check a selector list against a batch shape and pad it with full slices so
/// that it covers every batch axis.
///
/// Slice bounds are clamped into the axis like NumPy does, so `0..100` on a
/// length-10 axis takes all 10 elements and `5..3` selects nothing. Integer
/// indices must be in bounds.
pub fn complete_selection(
    shape: &[usize],
    selection: &[SliceInfoElem],
) -> GeometryResult<Vec<SliceInfoElem>> {
    const OP: &str = "index";

    let consumed = selection
        .iter()
        .filter(|elem| !matches!(elem, SliceInfoElem::NewAxis))
        .count();
    if consumed > shape.len() {
        return Err(GeometryError::shape_mismatch(
            OP,
            format!("{} indices given for batch shape {:?}", consumed, shape),
        ));
    }

    let absolute = |pos: isize, len: usize| if pos < 0 { pos + len as isize } else { pos };
    let clamp = |pos: isize, len: usize| absolute(pos, len).clamp(0, len as isize);

    let mut full = Vec::with_capacity(selection.len() + shape.len() - consumed);
    let mut axis = 0;
    for elem in selection {
        match *elem {
            SliceInfoElem::NewAxis => {
                full.push(SliceInfoElem::NewAxis);
                continue;
            }
            SliceInfoElem::Index(i) => {
                let len = shape[axis];
                let abs = absolute(i, len);
                if abs < 0 || abs as usize >= len {
                    return Err(GeometryError::shape_mismatch(
                        OP,
                        format!("index {} out of bounds for axis {} of size {}", i, axis, len),
                    ));
                }
                full.push(SliceInfoElem::Index(abs));
            }
            SliceInfoElem::Slice { start, end, step } => {
                let len = shape[axis];
                if step == 0 {
                    return Err(GeometryError::shape_mismatch(
                        OP,
                        format!("slice step 0 on axis {}", axis),
                    ));
                }
                let start = clamp(start, len);
                let end = end.map_or(len as isize, |e| clamp(e, len)).max(start);
                full.push(SliceInfoElem::Slice {
                    start,
                    end: Some(end),
                    step,
                });
            }
        }
        axis += 1;
    }

    full.extend((consumed..shape.len()).map(|_| SliceInfoElem::Slice {
        start: 0,
        end: None,
        step: 1,
    }));
    Ok(full)
}

/// Split an array of shape `[*S, *trailing]` into its batch shape and one flat
/// row-major chunk per element.
pub fn split_trailing<const N: usize>(
    operation: &'static str,
    array: &ArrayViewD<'_, f64>,
    trailing: &[usize],
) -> GeometryResult<(Vec<usize>, Vec<[f64; N]>)> {
    let shape = array.shape();
    let batch_ndim = shape.len().checked_sub(trailing.len());
    let batch_ndim = match batch_ndim {
        Some(n) if &shape[n..] == trailing => n,
        _ => {
            return Err(GeometryError::shape_mismatch(
                operation,
                format!("expected trailing dims {:?}, got shape {:?}", trailing, shape),
            ));
        }
    };

    let values: Vec<f64> = array.iter().copied().collect();
    let chunks = values
        .chunks_exact(N)
        .map(|chunk| {
            let mut row = [0.0; N];
            row.copy_from_slice(chunk);
            row
        })
        .collect();

    Ok((shape[..batch_ndim].to_vec(), chunks))
}

/// Inverse of [`split_trailing`]: assemble `[*batch, *trailing]` from one row
/// per batch element. `rows` must yield exactly `element_count(batch)` rows.
pub fn join_trailing<const N: usize>(
    batch: &[usize],
    trailing: &[usize],
    rows: impl IntoIterator<Item = [f64; N]>,
) -> ArrayD<f64> {
    let shape: Vec<usize> = batch.iter().chain(trailing).copied().collect();
    let values: Vec<f64> = rows.into_iter().flatten().collect();
    ArrayD::from_shape_fn(IxDyn(&shape), |ix| values[linear_offset(&shape, ix.slice())])
}
