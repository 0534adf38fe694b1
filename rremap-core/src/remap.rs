//! Remap engine
//!
//! Applies a [`SparseWeightMatrix`] to a [`Field`] and lays the result out on
//! the destination:
//!
//! 1. flatten the source field row-major (rank 1 or 2 only)
//! 2. compute `W · x` with the weights exactly as loaded
//! 3. reshape and relabel according to a [`Destination`]
//!
//! Every shape check happens before the multiply, so a failed call never
//! does numerical work and never returns a partial result. The physical
//! attributes (`long_name`, `units`, ...) of the source field are carried onto
//! the result; dimension names and coordinates come from the destination.
//!
//! # Examples
//!
//! ```rust
//! use rremap_core::field::Field;
//! use rremap_core::grid::{Destination, DestinationGrid};
//! use rremap_core::remap::remap;
//! use rremap_core::weights::{IndexBase, SparseWeightMatrix};
//!
//! // Four unstructured source cells onto a 1 x 2 lat-lon grid
//! let weights = SparseWeightMatrix::from_triplets(
//!     &[0.5, 0.5, 0.5, 0.5],
//!     &[1, 1, 2, 2],
//!     &[1, 2, 3, 4],
//!     IndexBase::One,
//!     None,
//! )
//! .unwrap();
//! let grid = DestinationGrid::new(1, 2, vec![90.0, 270.0], vec![0.0, 0.0]).unwrap();
//! let field = Field::from_vec("ncol", vec![280.0, 290.0, 300.0, 310.0]).with_attr("units", "K");
//!
//! let out = remap(&field, &weights, &Destination::Grid(grid)).unwrap();
//! assert_eq!(out.field.shape(), &[1, 2]);
//! assert_eq!(out.field.units(), Some("K"));
//! assert_eq!(out.x.to_vec(), vec![90.0, 270.0]);
//! ```

use crate::cache::WeightCache;
use crate::dataset::{Dataset, DatasetSource};
use crate::errors::{RemapError, RemapResult, ShapeError};
use crate::field::Field;
use crate::grid::{Destination, DestinationGrid, LAT_DIM, LON_DIM};
use crate::weights::SparseWeightMatrix;
use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Dimension name of an unstructured destination
pub const UNSTRUCTURED_DIM: &str = "n_b";

/// Absolute tolerance (degrees) used when checking that an explicit
/// destination grid is rectilinear
pub const RECTILINEAR_TOLERANCE: f64 = 1e-6;

/// Result of a remap: the field on the destination plus its x and y coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemapOutput {
    pub field: Field,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
}

/// Remap `field` with `weights` onto `destination`.
///
/// # Errors
///
/// * [`ShapeError::UnsupportedRank`] if `field` is not rank 1 or 2
/// * [`ShapeError::SourceLength`] if the flattened field does not have `n_src` elements
/// * [`ShapeError::DestinationLength`] if the destination layout does not hold `n_dst` elements
/// * [`RemapError::MissingCoordinate`] if a template lacks `lon`/`lat` coordinates
pub fn remap(
    field: &Field,
    weights: &SparseWeightMatrix,
    destination: &Destination,
) -> RemapResult<RemapOutput> {
    debug!(shape = ?field.shape(), "Flatten data array");
    let flat = field.flatten()?;
    if flat.len() != weights.n_src() {
        return Err(ShapeError::SourceLength {
            expected: weights.n_src(),
            actual: flat.len(),
        }
        .into());
    }
    check_destination(destination, weights.n_dst())?;

    debug!(n_dst = weights.n_dst(), nnz = weights.nnz(), "Apply weights via matrix multiply");
    let remapped = weights.apply(&flat)?;

    debug!("Reshape output");
    layout(field, remapped, destination)
}

/// Remap every slice of a rank-2 field taken along `dim`.
///
/// Typically `dim` is `time` on a `(time, ncol)` field. Each slice is
/// remapped independently and the results are stacked with `dim` as the
/// leading dimension, keeping its coordinate if present.
pub fn remap_along(
    field: &Field,
    weights: &SparseWeightMatrix,
    dim: &str,
    destination: &Destination,
) -> RemapResult<RemapOutput> {
    if field.ndim() != 2 {
        return Err(ShapeError::UnsupportedRank(field.ndim()).into());
    }
    let axis = field.axis_of(dim)?;
    let steps = field.shape()[axis];
    let slice_len = field.len() / steps.max(1);
    if slice_len != weights.n_src() {
        return Err(ShapeError::SourceLength {
            expected: weights.n_src(),
            actual: slice_len,
        }
        .into());
    }
    check_destination(destination, weights.n_dst())?;

    let mut slices = Vec::with_capacity(steps);
    for step in 0..steps {
        slices.push(remap(&field.index_along(dim, step)?, weights, destination)?);
    }

    let (x, y, inner_dims, inner_shape, inner_coords) = match slices.first() {
        Some(first) => (
            first.x.clone(),
            first.y.clone(),
            first.field.dims().to_vec(),
            first.field.shape().to_vec(),
            first.field.coords().clone(),
        ),
        None => {
            // No steps: produce an empty stack with the destination's layout
            let empty = layout(field, vec![0.0; weights.n_dst()], destination)?;
            (
                empty.x,
                empty.y,
                empty.field.dims().to_vec(),
                empty.field.shape().to_vec(),
                empty.field.coords().clone(),
            )
        }
    };

    let mut shape = vec![steps];
    shape.extend_from_slice(&inner_shape);
    let mut values = Vec::with_capacity(shape.iter().product());
    for slice in &slices {
        values.extend(slice.field.data().iter().copied());
    }
    let data = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| {
        ShapeError::DestinationLength {
            expected: shape.iter().product(),
            actual: steps * weights.n_dst(),
        }
    })?;

    let mut dims = vec![dim.to_string()];
    dims.extend(inner_dims);
    let mut stacked = Field::new(data, dims)?.with_attrs(field.attrs().clone());
    if let Some(values) = field.coord(dim) {
        stacked = stacked.with_coord(dim, values.clone())?;
    }
    for (name, coord) in inner_coords {
        stacked = stacked.with_aux_coord(&name, &coord.dim, coord.values)?;
    }

    Ok(RemapOutput {
        field: stacked,
        x,
        y,
    })
}

/// Load weights and remap in one call.
///
/// `source` is either an already-open weight dataset or a path to one. With a
/// `template` the result takes the template's layout; otherwise the weight
/// file's destination grid metadata decides (see [`Destination::from_weights`]).
pub fn apply_map<'a>(
    field: &Field,
    source: impl Into<DatasetSource<'a>>,
    template: Option<&Field>,
) -> RemapResult<RemapOutput> {
    debug!("Open map file");
    let ds = DatasetSource::resolve(source.into())?;
    debug!("Create weights as a COO matrix");
    let weights = SparseWeightMatrix::from_dataset(&ds)?;
    apply_with(field, &weights, &ds, template)
}

/// [`apply_map`] reusing weight matrices held in a caller-owned cache.
pub fn apply_map_cached<'a>(
    field: &Field,
    source: impl Into<DatasetSource<'a>>,
    template: Option<&Field>,
    cache: &mut WeightCache,
) -> RemapResult<RemapOutput> {
    let ds = DatasetSource::resolve(source.into())?;
    let weights = cache.load(&*ds)?;
    apply_with(field, &weights, &ds, template)
}

fn apply_with(
    field: &Field,
    weights: &SparseWeightMatrix,
    ds: &Dataset,
    template: Option<&Field>,
) -> RemapResult<RemapOutput> {
    match template {
        Some(template) => remap(field, weights, &Destination::Template(template)),
        None => remap(field, weights, &Destination::from_weights(ds)?),
    }
}

fn check_destination(destination: &Destination, n_dst: usize) -> Result<(), ShapeError> {
    let actual = match destination {
        Destination::Template(template) => template.len(),
        Destination::Grid(grid) => grid.len(),
        Destination::Unstructured { .. } => n_dst,
    };
    if actual != n_dst {
        return Err(ShapeError::DestinationLength {
            expected: n_dst,
            actual,
        });
    }
    Ok(())
}

fn layout(source: &Field, values: Vec<f64>, destination: &Destination) -> RemapResult<RemapOutput> {
    match destination {
        Destination::Template(template) => layout_template(source, values, template),
        Destination::Grid(grid) => layout_grid(source, values, grid),
        Destination::Unstructured { x, y } => Ok(RemapOutput {
            field: Field::from_vec(UNSTRUCTURED_DIM, values).with_attrs(source.attrs().clone()),
            x: x.clone(),
            y: y.clone(),
        }),
    }
}

fn layout_template(source: &Field, values: Vec<f64>, template: &Field) -> RemapResult<RemapOutput> {
    let mut field = Field::from_shape_vec(template.shape(), values, template.dims().to_vec())?
        .with_attrs(source.attrs().clone());
    for (name, coord) in template.coords() {
        field = field.with_aux_coord(name, &coord.dim, coord.values.clone())?;
    }

    let x = field
        .coord(LON_DIM)
        .cloned()
        .ok_or_else(|| RemapError::MissingCoordinate(LON_DIM.to_string()))?;
    let y = field
        .coord(LAT_DIM)
        .cloned()
        .ok_or_else(|| RemapError::MissingCoordinate(LAT_DIM.to_string()))?;
    Ok(RemapOutput { field, x, y })
}

fn layout_grid(source: &Field, values: Vec<f64>, grid: &DestinationGrid) -> RemapResult<RemapOutput> {
    if !grid.is_rectilinear(RECTILINEAR_TOLERANCE) {
        warn!(
            shape = ?grid.shape(),
            "Destination grid is not rectilinear; lon/lat taken from the first row and column"
        );
    }
    let (ny, nx) = grid.shape();
    let x = grid.x();
    let y = grid.y();
    let field = Field::from_shape_vec(
        &[ny, nx],
        values,
        vec![LAT_DIM.to_string(), LON_DIM.to_string()],
    )?
    .with_coord(LAT_DIM, y.clone())?
    .with_coord(LON_DIM, x.clone())?
    .with_attrs(source.attrs().clone());
    Ok(RemapOutput { field, x, y })
}
