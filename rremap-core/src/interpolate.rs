//! Axis-wise 1D interpolation
//!
//! [`interp_along_axis`] resamples every 1-d slice of an N-d array along one
//! axis, for example pressure-level profiles of a `(time, lev, ncol)` field
//! onto a new set of levels. Each slice has its own abscissas, so hybrid
//! vertical coordinates that vary in space and time are supported.
//!
//! Within a slice the interpolation is piecewise linear with flat
//! extrapolation: query points below the first abscissa take the first value
//! and points above the last take the last value. Abscissas are expected to be
//! increasing; they are not checked.
//!
//! ```rust
//! use rremap_core::interpolate::interp1d;
//!
//! let y = interp1d(&[-5.0, 0.5, 5.0], &[0.0, 1.0, 2.0], &[0.0, 10.0, 20.0]).unwrap();
//! assert_eq!(y, vec![0.0, 5.0, 20.0]);
//! ```

use crate::errors::ShapeError;
use ndarray::{ArrayD, ArrayView1, ArrayViewD, Axis, IxDyn, Zip};
use std::borrow::Cow;

/// Linearly interpolate `fp(xp)` at each point of `x`.
///
/// # Errors
///
/// * [`ShapeError::ShapeMismatch`] if `xp` and `fp` differ in length
/// * [`ShapeError::EmptyAxis`] if `xp` is empty
pub fn interp1d(x: &[f64], xp: &[f64], fp: &[f64]) -> Result<Vec<f64>, ShapeError> {
    if xp.len() != fp.len() {
        return Err(ShapeError::ShapeMismatch {
            left: vec![xp.len()],
            right: vec![fp.len()],
        });
    }
    if xp.is_empty() {
        return Err(ShapeError::EmptyAxis { axis: 0 });
    }
    Ok(x.iter().map(|&v| interp_point(v, xp, fp)).collect())
}

/// Evaluate at a single point; `xp` must be non-empty and as long as `fp`.
fn interp_point(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }

    // Number of abscissas <= x; at least 1 and at most `last` here
    let upper = xp.partition_point(|&v| v <= x);
    let lo = upper - 1;
    if x == xp[lo] {
        return fp[lo];
    }
    let slope = (fp[upper] - fp[lo]) / (xp[upper] - xp[lo]);
    let value = slope * (x - xp[lo]) + fp[lo];
    if value.is_nan() {
        // Infinite slope between equal abscissas, or infinite values
        let value = slope * (x - xp[upper]) + fp[upper];
        if value.is_nan() && fp[lo] == fp[upper] {
            return fp[lo];
        }
        return value;
    }
    value
}

/// Convert a possibly negative axis index into a position.
pub fn normalize_axis(axis: isize, ndim: usize) -> Result<usize, ShapeError> {
    let resolved = if axis < 0 {
        axis + ndim as isize
    } else {
        axis
    };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(ShapeError::InvalidAxis { axis, ndim });
    }
    Ok(resolved as usize)
}

/// Interpolate `y_in(x_in)` at `x_out` independently along `axis`.
///
/// `x_in` and `y_in` must have the same shape. The result has that shape
/// except that `axis` has length `x_out.len()`.
///
/// # Errors
///
/// * [`ShapeError::ShapeMismatch`] if `x_in` and `y_in` differ in shape
/// * [`ShapeError::InvalidAxis`] if `axis` is not an axis of the inputs
/// * [`ShapeError::EmptyAxis`] if the inputs have no samples along `axis`
///
/// # Examples
///
/// ```rust
/// use ndarray::{array, Array1};
/// use rremap_core::interpolate::interp_along_axis;
///
/// // Two profiles, one per row, on different levels
/// let x_in = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]].into_dyn();
/// let y_in = array![[10.0, 20.0, 30.0], [10.0, 20.0, 30.0]].into_dyn();
/// let x_out = Array1::from_vec(vec![2.0, 3.0]);
///
/// let y = interp_along_axis(x_out.view(), x_in.view(), y_in.view(), 1).unwrap();
/// assert_eq!(y, array![[20.0, 30.0], [10.0, 15.0]].into_dyn());
/// ```
pub fn interp_along_axis(
    x_out: ArrayView1<f64>,
    x_in: ArrayViewD<f64>,
    y_in: ArrayViewD<f64>,
    axis: usize,
) -> Result<ArrayD<f64>, ShapeError> {
    if x_in.shape() != y_in.shape() {
        return Err(ShapeError::ShapeMismatch {
            left: x_in.shape().to_vec(),
            right: y_in.shape().to_vec(),
        });
    }
    let ndim = x_in.ndim();
    if axis >= ndim {
        return Err(ShapeError::InvalidAxis {
            axis: axis as isize,
            ndim,
        });
    }
    if x_in.len_of(Axis(axis)) == 0 {
        return Err(ShapeError::EmptyAxis { axis });
    }

    let mut shape = x_in.shape().to_vec();
    shape[axis] = x_out.len();
    let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));
    if out.is_empty() {
        return Ok(out);
    }

    let x_out = contiguous(x_out);
    Zip::from(out.lanes_mut(Axis(axis)))
        .and(x_in.lanes(Axis(axis)))
        .and(y_in.lanes(Axis(axis)))
        .for_each(|mut out_lane, xp, fp| {
            let xp = contiguous(xp);
            let fp = contiguous(fp);
            for (o, &x) in out_lane.iter_mut().zip(x_out.iter()) {
                *o = interp_point(x, &xp, &fp);
            }
        });
    Ok(out)
}

fn contiguous<'a>(lane: ArrayView1<'a, f64>) -> Cow<'a, [f64]> {
    match lane.to_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(lane.to_vec()),
    }
}
