//! Spatial reductions for remapped fields
//!
//! Helpers that are typically applied right after a remap:
//!
//! - [`area_average`]: area-weighted mean over one or more named dimensions,
//!   skipping missing (NaN) values
//! - [`latitude_weights`]: `cos(lat)` weights for a regular lat-lon field,
//!   used when no cell areas are available
//! - [`normalize_longitudes`]: wrap longitudes into `[-180, 180)`
//!
//! # Examples
//!
//! ```rust
//! use rremap_core::field::Field;
//! use rremap_core::spatial::area_average;
//!
//! let temperature = Field::from_vec("ncol", vec![300.0, 280.0, f64::NAN]);
//! let area = Field::from_vec("ncol", vec![1.0, 3.0, 2.0]);
//!
//! // The missing cell does not contribute to either sum
//! let mean = area_average(&temperature, &area, &["ncol"]).unwrap();
//! assert_eq!(mean.data().iter().copied().collect::<Vec<_>>(), vec![285.0]);
//! ```

use crate::errors::{RemapError, RemapResult, ShapeError};
use crate::field::Field;
use crate::grid::{LAT_DIM, LON_DIM};
use ndarray::{ArrayD, Axis, IxDyn};

/// Area-weighted mean of `field` over the dimensions `dims`.
///
/// `area` must be defined over exactly `dims` (in any order) with lengths
/// matching `field`. Cells where `field` is NaN are excluded from both the
/// weighted sum and the total weight; a slice with no valid cells averages to
/// NaN. The result keeps the remaining dimensions, their coordinates and the
/// attributes of `field`.
pub fn area_average(field: &Field, area: &Field, dims: &[&str]) -> RemapResult<Field> {
    if area.ndim() != dims.len() {
        return Err(ShapeError::ShapeMismatch {
            left: area.shape().to_vec(),
            right: dims
                .iter()
                .map(|d| field.axis_of(d).map(|a| field.shape()[a]))
                .collect::<Result<Vec<_>, _>>()?,
        }
        .into());
    }

    // Axis order that moves the reduced dimensions to the back of `field`
    let mut reduced = Vec::with_capacity(dims.len());
    let mut area_order = Vec::with_capacity(dims.len());
    for dim in dims {
        let axis = field.axis_of(dim)?;
        let area_axis = area.axis_of(dim)?;
        if field.shape()[axis] != area.shape()[area_axis] {
            return Err(ShapeError::CoordinateLength {
                dim: dim.to_string(),
                expected: field.shape()[axis],
                actual: area.shape()[area_axis],
            }
            .into());
        }
        reduced.push(axis);
        area_order.push(area_axis);
    }
    let kept: Vec<usize> = (0..field.ndim()).filter(|a| !reduced.contains(a)).collect();
    let mut order = kept.clone();
    order.extend_from_slice(&reduced);

    let values = field.data().view().permuted_axes(IxDyn(&order));
    let weights: Vec<f64> = area
        .data()
        .view()
        .permuted_axes(IxDyn(&area_order))
        .iter()
        .copied()
        .collect();

    let kept_shape: Vec<usize> = kept.iter().map(|&a| field.shape()[a]).collect();
    let n_kept: usize = kept_shape.iter().product();
    let n_reduced = weights.len();
    // Iterating the permuted view walks each reduced block contiguously
    let flat: Vec<f64> = values.iter().copied().collect();

    let mut means = Vec::with_capacity(n_kept);
    for block in 0..n_kept {
        let start = block * n_reduced;
        let mut total = 0.0;
        let mut weight = 0.0;
        for (v, w) in flat[start..start + n_reduced].iter().zip(weights.iter()) {
            if !v.is_nan() {
                total += v * w;
                weight += w;
            }
        }
        means.push(if weight == 0.0 { f64::NAN } else { total / weight });
    }

    let kept_dims: Vec<String> = kept.iter().map(|&a| field.dims()[a].clone()).collect();
    let data = ArrayD::from_shape_vec(IxDyn(&kept_shape), means).map_err(|_| {
        ShapeError::DestinationLength {
            expected: n_kept,
            actual: flat.len() / n_reduced.max(1),
        }
    })?;
    let mut out = Field::new(data, kept_dims)?.with_attrs(field.attrs().clone());
    for (name, coord) in field.coords() {
        if !dims.contains(&coord.dim.as_str()) {
            out = out.with_aux_coord(name, &coord.dim, coord.values.clone())?;
        }
    }
    Ok(out)
}

/// `cos(lat)` area weights over the `(lat, lon)` dimensions of `field`.
///
/// The field must carry a `lat` coordinate. The weights are broadcast along
/// `lon` and laid out in the field's own `lat`/`lon` order.
pub fn latitude_weights(field: &Field) -> RemapResult<Field> {
    let lat = field
        .coord(LAT_DIM)
        .ok_or_else(|| RemapError::MissingCoordinate(LAT_DIM.to_string()))?;
    let lat_axis = field.axis_of(LAT_DIM)?;
    let lon_axis = field.axis_of(LON_DIM)?;
    let n_lon = field.shape()[lon_axis];

    let column = lat.mapv(|v| v.to_radians().cos());
    let mut weights = column
        .insert_axis(Axis(1))
        .broadcast((lat.len(), n_lon))
        .map(|view| view.to_owned())
        .ok_or_else(|| ShapeError::CoordinateLength {
            dim: LAT_DIM.to_string(),
            expected: field.shape()[lat_axis],
            actual: lat.len(),
        })?
        .into_dyn();
    let mut dims = vec![LAT_DIM.to_string(), LON_DIM.to_string()];
    if lon_axis < lat_axis {
        weights = weights.reversed_axes();
        dims.reverse();
    }
    Ok(Field::new(weights, dims)?)
}

/// Wrap a longitude in degrees into `[-180, 180)`.
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Wrap every longitude in degrees into `[-180, 180)`.
pub fn normalize_longitudes(lons: &[f64]) -> Vec<f64> {
    lons.iter().map(|&lon| wrap_longitude(lon)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::UNITS;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn time_ncol() -> Field {
        Field::new(
            array![[1.0, 2.0, 3.0], [4.0, f64::NAN, 6.0]].into_dyn(),
            vec!["time".into(), "ncol".into()],
        )
        .unwrap()
        .with_coord("time", array![0.5, 1.5])
        .unwrap()
        .with_attr(UNITS, "K")
    }

    #[test]
    fn weighted_mean_over_ncol() {
        let area = Field::from_vec("ncol", vec![1.0, 1.0, 2.0]);
        let mean = area_average(&time_ncol(), &area, &["ncol"]).unwrap();

        assert_eq!(mean.dims(), &["time".to_string()]);
        assert_relative_eq!(mean.data()[[0]], (1.0 + 2.0 + 6.0) / 4.0);
        // NaN cell skipped: (4 + 12) / 3
        assert_relative_eq!(mean.data()[[1]], 16.0 / 3.0);
        assert_eq!(mean.units(), Some("K"));
        assert_eq!(mean.coord("time"), Some(&array![0.5, 1.5]));
    }

    #[test]
    fn reduces_leading_dimension() {
        let area = Field::from_vec("time", vec![3.0, 1.0]);
        let mean = area_average(&time_ncol(), &area, &["time"]).unwrap();
        assert_eq!(mean.dims(), &["ncol".to_string()]);
        assert_relative_eq!(mean.data()[[0]], 1.75);
        assert_relative_eq!(mean.data()[[1]], 2.0);
        assert_relative_eq!(mean.data()[[2]], 3.75);
        assert!(mean.coords().is_empty());
    }

    #[test]
    fn all_missing_gives_nan() {
        let field = Field::from_vec("ncol", vec![f64::NAN, f64::NAN]);
        let area = Field::from_vec("ncol", vec![1.0, 1.0]);
        let mean = area_average(&field, &area, &["ncol"]).unwrap();
        assert!(mean.data()[IxDyn(&[])].is_nan());
    }

    #[test]
    fn area_length_must_match() {
        let area = Field::from_vec("ncol", vec![1.0, 1.0]);
        let err = area_average(&time_ncol(), &area, &["ncol"]).unwrap_err();
        assert!(matches!(
            err,
            RemapError::Shape(ShapeError::CoordinateLength { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn unknown_dimension() {
        let area = Field::from_vec("lev", vec![1.0, 1.0, 1.0]);
        let err = area_average(&time_ncol(), &area, &["lev"]).unwrap_err();
        assert!(matches!(
            err,
            RemapError::Shape(ShapeError::UnknownDimension(name)) if name == "lev"
        ));
    }

    #[test]
    fn global_mean_of_lat_lon_grid() {
        let field = Field::new(
            array![[1.0, 1.0], [3.0, 3.0]].into_dyn(),
            vec!["lat".into(), "lon".into()],
        )
        .unwrap()
        .with_coord("lat", array![0.0, 60.0])
        .unwrap();

        let weights = latitude_weights(&field).unwrap();
        assert_eq!(weights.shape(), &[2, 2]);
        assert_relative_eq!(weights.data()[[1, 0]], 0.5, epsilon = 1e-12);

        let mean = area_average(&field, &weights, &["lat", "lon"]).unwrap();
        assert_eq!(mean.ndim(), 0);
        // (1 * 1 + 3 * 0.5) / 1.5
        assert_relative_eq!(mean.data()[IxDyn(&[])], 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn latitude_weights_follow_field_order() {
        let field = Field::new(
            ArrayD::zeros(IxDyn(&[3, 2])),
            vec!["lon".into(), "lat".into()],
        )
        .unwrap()
        .with_coord("lat", array![0.0, 90.0])
        .unwrap();
        let weights = latitude_weights(&field).unwrap();
        assert_eq!(weights.dims(), &["lon".to_string(), "lat".to_string()]);
        assert_eq!(weights.shape(), &[3, 2]);
        assert_relative_eq!(weights.data()[[2, 0]], 1.0);
    }

    #[test]
    fn longitudes_wrap() {
        assert_eq!(
            normalize_longitudes(&[0.0, 180.0, 270.0, -190.0, 359.5, 540.0]),
            vec![0.0, -180.0, -90.0, 170.0, -0.5, -180.0]
        );
    }
}
