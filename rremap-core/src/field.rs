//! Labelled scalar fields
//!
//! A [`Field`] couples an N-d array with an ordered list of dimension names,
//! optional 1-d coordinate vectors for those dimensions, and string attributes
//! (`long_name`, `units`, ...). Attributes describe the physical quantity and
//! travel with the data through a remap; dimension names and coordinates
//! describe the spatial layout and are replaced by the destination's.
//!
//! Flattening and reshaping always use row-major order: the last dimension
//! varies fastest, the first slowest.

use crate::dataset::Variable;
use crate::errors::ShapeError;
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute key for the descriptive name of a field
pub const LONG_NAME: &str = "long_name";
/// Attribute key for the unit string of a field
pub const UNITS: &str = "units";

/// A 1-d coordinate vector laid along one dimension of a field.
///
/// Dimension coordinates share their dimension's name (`lat` along `lat`);
/// auxiliary coordinates do not (`lon` along `ncol` on an unstructured mesh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub dim: String,
    pub values: Array1<f64>,
}

/// An N-d array with dimension labels, coordinates and attribute metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    data: ArrayD<f64>,
    dims: Vec<String>,
    #[serde(default)]
    coords: BTreeMap<String, Coordinate>,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

impl Field {
    /// Create a field, checking that one dimension name is given per axis.
    pub fn new(data: ArrayD<f64>, dims: Vec<String>) -> Result<Self, ShapeError> {
        if dims.len() != data.ndim() {
            return Err(ShapeError::DimensionLabels {
                ndim: data.ndim(),
                labels: dims,
            });
        }
        Ok(Self {
            data,
            dims,
            coords: BTreeMap::new(),
            attrs: BTreeMap::new(),
        })
    }

    /// Create a 1-d field along `dim`, e.g. an unstructured `ncol` field.
    pub fn from_vec(dim: &str, values: Vec<f64>) -> Self {
        Self {
            data: Array1::from_vec(values).into_dyn(),
            dims: vec![dim.to_string()],
            coords: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Create a field from row-major values and an explicit shape.
    pub fn from_shape_vec(
        shape: &[usize],
        values: Vec<f64>,
        dims: Vec<String>,
    ) -> Result<Self, ShapeError> {
        let expected: usize = shape.iter().product();
        let actual = values.len();
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| ShapeError::DestinationLength { expected, actual })?;
        Self::new(data, dims)
    }

    /// Attach a dimension coordinate, named after the dimension it labels.
    pub fn with_coord(self, dim: &str, values: Array1<f64>) -> Result<Self, ShapeError> {
        self.with_aux_coord(dim, dim, values)
    }

    /// Attach a coordinate called `name` laid along dimension `dim`.
    pub fn with_aux_coord(
        mut self,
        name: &str,
        dim: &str,
        values: Array1<f64>,
    ) -> Result<Self, ShapeError> {
        let axis = self.axis_of(dim)?;
        let expected = self.data.len_of(Axis(axis));
        if values.len() != expected {
            return Err(ShapeError::CoordinateLength {
                dim: dim.to_string(),
                expected,
                actual: values.len(),
            });
        }
        self.coords.insert(
            name.to_string(),
            Coordinate {
                dim: dim.to_string(),
                values,
            },
        );
        Ok(self)
    }

    /// Builder method to set a single attribute.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    /// Builder method to replace all attributes.
    pub fn with_attrs(mut self, attrs: BTreeMap<String, String>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn coords(&self) -> &BTreeMap<String, Coordinate> {
        &self.coords
    }

    /// Values of a coordinate by name
    pub fn coord(&self, name: &str) -> Option<&Array1<f64>> {
        self.coords.get(name).map(|c| &c.values)
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn long_name(&self) -> Option<&str> {
        self.attrs.get(LONG_NAME).map(|s| s.as_str())
    }

    pub fn units(&self) -> Option<&str> {
        self.attrs.get(UNITS).map(|s| s.as_str())
    }

    /// Position of a named dimension.
    pub fn axis_of(&self, dim: &str) -> Result<usize, ShapeError> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| ShapeError::UnknownDimension(dim.to_string()))
    }

    /// Flatten to a 1-d vector for a matrix-vector product.
    ///
    /// Rank-1 fields are used as-is; rank-2 fields are flattened row-major so
    /// the first dimension varies slowest. Any other rank is rejected.
    pub fn flatten(&self) -> Result<Vec<f64>, ShapeError> {
        match self.ndim() {
            1 | 2 => Ok(self.data.iter().copied().collect()),
            rank => Err(ShapeError::UnsupportedRank(rank)),
        }
    }

    /// Arithmetic mean over a named dimension, dropping it.
    ///
    /// Attributes and the coordinates of the remaining dimensions are kept.
    pub fn mean_over(&self, dim: &str) -> Result<Field, ShapeError> {
        let axis = self.axis_of(dim)?;
        let data = self
            .data
            .mean_axis(Axis(axis))
            .ok_or_else(|| ShapeError::EmptyAxis { axis })?;
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Field {
            data,
            coords: self.coords_without(dim),
            dims,
            attrs: self.attrs.clone(),
        })
    }

    /// Select one index along a named dimension, dropping it.
    pub fn index_along(&self, dim: &str, index: usize) -> Result<Field, ShapeError> {
        let axis = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(axis));
        if index >= len {
            return Err(ShapeError::CoordinateLength {
                dim: dim.to_string(),
                expected: len,
                actual: index + 1,
            });
        }
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Field {
            data: self.data.index_axis(Axis(axis), index).to_owned(),
            dims,
            coords: self.coords_without(dim),
            attrs: self.attrs.clone(),
        })
    }

    fn coords_without(&self, dim: &str) -> BTreeMap<String, Coordinate> {
        self.coords
            .iter()
            .filter(|(_, c)| c.dim != dim)
            .map(|(name, c)| (name.clone(), c.clone()))
            .collect()
    }

    /// Convert into a dataset variable, dropping coordinates.
    pub fn to_variable(&self) -> Variable {
        Variable {
            dims: self.dims.clone(),
            data: self.data.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl From<&Variable> for Field {
    fn from(var: &Variable) -> Self {
        Field {
            data: var.data.clone(),
            dims: var.dims.clone(),
            coords: BTreeMap::new(),
            attrs: var.attrs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn lat_lon() -> Field {
        Field::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn(),
            vec!["lat".into(), "lon".into()],
        )
        .unwrap()
        .with_attr(LONG_NAME, "Surface temperature")
        .with_attr(UNITS, "K")
    }

    #[test]
    fn flatten_rank_two_is_row_major() {
        assert_eq!(
            lat_lon().flatten().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn flatten_rank_one_is_identity() {
        let field = Field::from_vec("ncol", vec![3.0, 1.0, 2.0]);
        assert_eq!(field.flatten().unwrap(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn flatten_rejects_rank_three() {
        let field = Field::new(
            ArrayD::zeros(IxDyn(&[2, 2, 2])),
            vec!["time".into(), "lev".into(), "ncol".into()],
        )
        .unwrap();
        assert_eq!(field.flatten(), Err(ShapeError::UnsupportedRank(3)));
    }

    #[test]
    fn coordinate_length_is_checked() {
        let err = lat_lon()
            .with_coord("lon", array![0.0, 120.0])
            .unwrap_err();
        assert_eq!(
            err,
            ShapeError::CoordinateLength {
                dim: "lon".into(),
                expected: 3,
                actual: 2
            }
        );
        assert!(lat_lon().with_coord("lon", array![0.0, 120.0, 240.0]).is_ok());
    }

    #[test]
    fn auxiliary_coordinates_follow_their_dimension() {
        let field = Field::from_vec("ncol", vec![1.0, 2.0])
            .with_aux_coord("lon", "ncol", array![10.0, 20.0])
            .unwrap()
            .with_aux_coord("lat", "ncol", array![-5.0, 5.0])
            .unwrap();
        assert_eq!(field.coord("lon"), Some(&array![10.0, 20.0]));
        assert_eq!(field.coords()["lat"].dim, "ncol");
        assert!(field.mean_over("ncol").unwrap().coords().is_empty());
    }

    #[test]
    fn unknown_coordinate_dimension() {
        let err = lat_lon().with_coord("lev", array![1.0]).unwrap_err();
        assert_eq!(err, ShapeError::UnknownDimension("lev".into()));
    }

    #[test]
    fn attribute_accessors() {
        let field = lat_lon();
        assert_eq!(field.long_name(), Some("Surface temperature"));
        assert_eq!(field.units(), Some("K"));
        assert_eq!(Field::from_vec("ncol", vec![]).units(), None);
    }

    #[test]
    fn mean_over_keeps_attrs_and_remaining_coords() {
        let field = lat_lon()
            .with_coord("lat", array![-45.0, 45.0])
            .unwrap()
            .with_coord("lon", array![0.0, 120.0, 240.0])
            .unwrap();
        let mean = field.mean_over("lat").unwrap();
        assert_eq!(mean.dims(), &["lon".to_string()]);
        assert_eq!(mean.data(), &array![2.5, 3.5, 4.5].into_dyn());
        assert_eq!(mean.units(), Some("K"));
        assert!(mean.coord("lat").is_none());
        assert_eq!(mean.coord("lon"), Some(&array![0.0, 120.0, 240.0]));
    }

    #[test]
    fn index_along_drops_dimension() {
        let step = lat_lon().index_along("lat", 1).unwrap();
        assert_eq!(step.dims(), &["lon".to_string()]);
        assert_eq!(step.flatten().unwrap(), vec![4.0, 5.0, 6.0]);
        assert!(lat_lon().index_along("lat", 2).is_err());
    }

    #[test]
    fn variable_conversion_keeps_labels() {
        let field = lat_lon();
        let var = field.to_variable();
        assert_eq!(var.dims, vec!["lat".to_string(), "lon".to_string()]);
        let back = Field::from(&var);
        assert_eq!(back, field);
    }
}
