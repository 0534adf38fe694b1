//! Bindings exposed as `rremap._lib`.
//!
//! - `interp_along_axis(x_out, x_in, y_in, axis=0)`
//! - `apply_map(data, map_file)` returning `(values, x, y)`
//! - `WeightMatrix` for repeated remaps with one set of weights

use numpy::{IntoPyArray, PyArray1, PyArrayDyn, PyReadonlyArray1, PyReadonlyArrayDyn};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rremap_core::field::Field;
use rremap_core::grid::Destination;
use rremap_core::interpolate::{self, normalize_axis};
use rremap_core::remap::{self, RemapOutput};
use rremap_core::weights::SparseWeightMatrix;
use rremap_core::{Dataset, RemapError};
use std::path::PathBuf;
use std::sync::Arc;

type RemapTuple<'py> = (
    Bound<'py, PyArrayDyn<f64>>,
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray1<f64>>,
);

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Label a bare numpy array with positional dimension names
fn unlabelled_field(data: PyReadonlyArrayDyn<'_, f64>) -> Result<Field, RemapError> {
    let data = data.as_array().to_owned();
    let dims = (0..data.ndim()).map(|i| format!("dim_{}", i)).collect();
    Ok(Field::new(data, dims)?)
}

fn into_python(py: Python<'_>, out: RemapOutput) -> RemapTuple<'_> {
    (
        out.field.into_data().into_pyarray_bound(py),
        out.x.into_pyarray_bound(py),
        out.y.into_pyarray_bound(py),
    )
}

/// Axis `interp_along_axis` works along when the caller gives none
const DEFAULT_INTERP_AXIS: isize = 0;

/// Interpolate `y_in(x_in)` at `x_out` independently along `axis`.
#[pyfunction]
#[pyo3(signature = (x_out, x_in, y_in, axis = DEFAULT_INTERP_AXIS))]
fn interp_along_axis<'py>(
    py: Python<'py>,
    x_out: PyReadonlyArray1<'py, f64>,
    x_in: PyReadonlyArrayDyn<'py, f64>,
    y_in: PyReadonlyArrayDyn<'py, f64>,
    axis: isize,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let x_in = x_in.as_array();
    let axis = normalize_axis(axis, x_in.ndim()).map_err(value_error)?;
    let out = interpolate::interp_along_axis(x_out.as_array(), x_in, y_in.as_array(), axis)
        .map_err(value_error)?;
    Ok(out.into_pyarray_bound(py))
}

/// Remap `data` with the weights in `map_file`.
///
/// Returns the remapped values with the x and y coordinates of the
/// destination. The layout follows the map file's destination grid.
#[pyfunction]
fn apply_map<'py>(
    py: Python<'py>,
    data: PyReadonlyArrayDyn<'py, f64>,
    map_file: PathBuf,
) -> PyResult<RemapTuple<'py>> {
    let field = unlabelled_field(data).map_err(value_error)?;
    let out = remap::apply_map(&field, map_file, None).map_err(value_error)?;
    Ok(into_python(py, out))
}

/// A loaded sparse weight matrix together with its destination layout.
#[pyclass(name = "WeightMatrix", module = "rremap._lib")]
#[derive(Clone)]
pub struct PyWeightMatrix {
    weights: Arc<SparseWeightMatrix>,
    destination: Destination<'static>,
}

#[pymethods]
impl PyWeightMatrix {
    /// Load the weights and destination grid from a map file.
    #[staticmethod]
    pub fn load(path: PathBuf) -> PyResult<Self> {
        let ds = Dataset::open(&path).map_err(value_error)?;
        let weights = SparseWeightMatrix::from_dataset(&ds).map_err(value_error)?;
        let destination = Destination::from_weights(&ds).map_err(value_error)?;
        Ok(Self {
            weights: Arc::new(weights),
            destination,
        })
    }

    /// `(n_dst, n_src)`
    #[getter]
    pub fn shape(&self) -> (usize, usize) {
        self.weights.shape()
    }

    #[getter]
    pub fn nnz(&self) -> usize {
        self.weights.nnz()
    }

    /// Sum of the weights of each destination cell.
    pub fn row_sums<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.weights.row_sums().into_pyarray_bound(py)
    }

    /// Flat matrix-vector product without any reshaping.
    pub fn apply<'py>(
        &self,
        py: Python<'py>,
        values: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let values = values.as_array().to_vec();
        let out = self.weights.apply(&values).map_err(value_error)?;
        Ok(out.into_pyarray_bound(py))
    }

    /// Remap a 1-d or 2-d array onto the destination grid.
    pub fn remap<'py>(
        &self,
        py: Python<'py>,
        data: PyReadonlyArrayDyn<'py, f64>,
    ) -> PyResult<RemapTuple<'py>> {
        let field = unlabelled_field(data).map_err(value_error)?;
        let out = remap::remap(&field, &self.weights, &self.destination).map_err(value_error)?;
        Ok(into_python(py, out))
    }

    fn __repr__(&self) -> String {
        let (n_dst, n_src) = self.weights.shape();
        format!(
            "<WeightMatrix n_dst={} n_src={} nnz={}>",
            n_dst,
            n_src,
            self.weights.nnz()
        )
    }
}

#[pymodule]
#[pyo3(name = "_lib")]
fn rremap(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(interp_along_axis, m)?)?;
    m.add_function(wrap_pyfunction!(apply_map, m)?)?;
    m.add_class::<PyWeightMatrix>()?;
    Ok(())
}
