//! Labelled in-memory datasets
//!
//! A [`Dataset`] is a flat collection of named [`Variable`]s, each an N-d `f64`
//! array with ordered dimension names and string attributes. Weight files,
//! SCRIP grid files and serialised fields are all read into this one form
//! before anything else touches them.
//!
//! Callers that hold either an already-open dataset or a path to one pass a
//! [`DatasetSource`]. It is resolved exactly once, at the entry point.
//!
//! # Examples
//!
//! ```rust
//! use rremap_core::dataset::{Dataset, DatasetSource, Variable};
//!
//! let ds = Dataset::new()
//!     .with_variable("S", Variable::from_vec("n_s", vec![1.0, 0.5, 0.5]))
//!     .with_variable("row", Variable::from_vec("n_s", vec![1.0, 2.0, 2.0]))
//!     .with_variable("col", Variable::from_vec("n_s", vec![1.0, 1.0, 2.0]));
//!
//! let resolved = DatasetSource::from(&ds).resolve().unwrap();
//! assert_eq!(resolved.variable("S").unwrap().len(), 3);
//! ```

use crate::errors::{LoadError, RemapError, RemapResult, ShapeError};
use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A named N-d array with dimension labels and string attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Dimension names, outermost first
    pub dims: Vec<String>,
    /// Values in row-major order
    pub data: ArrayD<f64>,
    /// Attribute metadata such as `long_name` and `units`
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl Variable {
    /// Create a variable, checking that one dimension name is given per axis.
    pub fn new(dims: Vec<String>, data: ArrayD<f64>) -> Result<Self, ShapeError> {
        if dims.len() != data.ndim() {
            return Err(ShapeError::DimensionLabels {
                ndim: data.ndim(),
                labels: dims,
            });
        }
        Ok(Self {
            dims,
            data,
            attrs: BTreeMap::new(),
        })
    }

    /// Create a 1-d variable along `dim`.
    pub fn from_vec(dim: &str, values: Vec<f64>) -> Self {
        Self {
            dims: vec![dim.to_string()],
            data: Array1::from_vec(values).into_dyn(),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder method to attach an attribute.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Values flattened in row-major order (last axis varies fastest).
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Values flattened in row-major order and cast to integers.
    ///
    /// Index variables are stored as floating point in memory; values are
    /// rounded to the nearest integer.
    pub fn to_indices(&self) -> Vec<i64> {
        self.data.iter().map(|v| v.round() as i64).collect()
    }
}

/// A collection of named variables plus global attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a variable.
    pub fn with_variable(mut self, name: &str, variable: Variable) -> Self {
        self.insert(name, variable);
        self
    }

    /// Add or replace a variable.
    pub fn insert(&mut self, name: &str, variable: Variable) {
        self.variables.insert(name.to_string(), variable);
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Get a variable or fail with [`LoadError::MissingVariable`].
    pub fn variable(&self, name: &str) -> Result<&Variable, LoadError> {
        self.variables
            .get(name)
            .ok_or_else(|| LoadError::MissingVariable(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|k| k.as_str())
    }

    /// Open a dataset from disk.
    ///
    /// The format is chosen from the file extension: `.json`, `.toml`, or
    /// `.nc` (the latter only with the `netcdf` feature).
    pub fn open(path: impl AsRef<Path>) -> RemapResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening dataset");
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => {
                let text = read_to_string(path)?;
                Self::from_json_str(&text).map_err(|message| {
                    RemapError::from(LoadError::Parse {
                        path: path.to_path_buf(),
                        message,
                    })
                })
            }
            Some("toml") => {
                let text = read_to_string(path)?;
                toml::from_str(&text).map_err(|e| {
                    RemapError::from(LoadError::Parse {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })
                })
            }
            Some("nc") | Some("nc4") => read_netcdf(path),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf()).into()),
        }
    }

    /// Parse a dataset from its JSON form.
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Serialise the dataset to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

fn read_to_string(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "netcdf")]
fn read_netcdf(path: &Path) -> RemapResult<Dataset> {
    let parse_error = |e: netcdf::error::Error| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let file = netcdf::open(path).map_err(parse_error)?;
    let mut dataset = Dataset::new();
    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let data = match var.values::<f64>(None, None) {
            Ok(data) => data,
            Err(e) => {
                // Character and string variables carry no numeric payload
                debug!(variable = %name, error = %e, "Skipping non-numeric variable");
                continue;
            }
        };
        let mut variable = Variable::new(dims, data)?;
        for attr in var.attributes() {
            if let Ok(netcdf::AttrValue::Str(value)) = attr.value() {
                variable.attrs.insert(attr.name().to_string(), value);
            }
        }
        dataset.insert(&name, variable);
    }
    for attr in file.attributes() {
        if let Ok(netcdf::AttrValue::Str(value)) = attr.value() {
            dataset.attrs.insert(attr.name().to_string(), value);
        }
    }
    Ok(dataset)
}

#[cfg(not(feature = "netcdf"))]
fn read_netcdf(_path: &Path) -> RemapResult<Dataset> {
    Err(LoadError::FeatureDisabled("netcdf").into())
}

/// Either an already-open dataset or a path to one.
#[derive(Debug, Clone)]
pub enum DatasetSource<'a> {
    Open(&'a Dataset),
    Path(PathBuf),
}

impl<'a> DatasetSource<'a> {
    /// Resolve to an in-memory dataset, opening the file if needed.
    pub fn resolve(self) -> RemapResult<Cow<'a, Dataset>> {
        match self {
            DatasetSource::Open(ds) => Ok(Cow::Borrowed(ds)),
            DatasetSource::Path(path) => Dataset::open(&path).map(Cow::Owned),
        }
    }
}

impl<'a> From<&'a Dataset> for DatasetSource<'a> {
    fn from(ds: &'a Dataset) -> Self {
        DatasetSource::Open(ds)
    }
}

impl From<PathBuf> for DatasetSource<'_> {
    fn from(path: PathBuf) -> Self {
        DatasetSource::Path(path)
    }
}

impl From<&Path> for DatasetSource<'_> {
    fn from(path: &Path) -> Self {
        DatasetSource::Path(path.to_path_buf())
    }
}

impl From<&str> for DatasetSource<'_> {
    fn from(path: &str) -> Self {
        DatasetSource::Path(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use std::io::Write;

    fn sample() -> Dataset {
        Dataset::new()
            .with_variable("S", Variable::from_vec("n_s", vec![0.25, 0.75]))
            .with_variable(
                "xc_b",
                Variable::from_vec("n_b", vec![0.0, 90.0]).with_attr("units", "degrees"),
            )
    }

    #[test]
    fn variable_rejects_wrong_label_count() {
        let data = ArrayD::zeros(IxDyn(&[2, 3]));
        let err = Variable::new(vec!["ncol".to_string()], data).unwrap_err();
        assert_eq!(
            err,
            ShapeError::DimensionLabels {
                ndim: 2,
                labels: vec!["ncol".to_string()]
            }
        );
    }

    #[test]
    fn to_vec_is_row_major() {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let var = Variable::new(vec!["y".into(), "x".into()], data).unwrap();
        assert_eq!(var.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);

        // A transposed view still flattens in logical row-major order
        let transposed = Variable::new(vec!["x".into(), "y".into()], var.data.t().to_owned())
            .unwrap();
        assert_eq!(transposed.to_vec(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn to_indices_rounds() {
        let var = Variable::from_vec("n_s", vec![1.0, 2.0000001, 2.9999999]);
        assert_eq!(var.to_indices(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_variable() {
        let ds = sample();
        assert!(matches!(
            ds.variable("row"),
            Err(LoadError::MissingVariable(name)) if name == "row"
        ));
    }

    #[test]
    fn json_file_round_trip() {
        let ds = sample();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(ds.to_json_string().unwrap().as_bytes())
            .unwrap();

        let opened = Dataset::open(file.path()).unwrap();
        assert_eq!(opened, ds);
        assert_eq!(opened.variable("xc_b").unwrap().attrs["units"], "degrees");
    }

    #[test]
    fn toml_file_is_readable() {
        let ds = sample();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml::to_string(&ds).unwrap().as_bytes())
            .unwrap();

        let opened = Dataset::open(file.path()).unwrap();
        assert_eq!(opened.variable("S").unwrap().to_vec(), vec![0.25, 0.75]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = Dataset::open("weights.grib").unwrap_err();
        assert!(matches!(
            err,
            RemapError::Load(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Dataset::open("/definitely/not/here/map.json").unwrap_err();
        assert!(matches!(err, RemapError::Load(LoadError::Io { .. })));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = Dataset::open(file.path()).unwrap_err();
        assert!(matches!(err, RemapError::Load(LoadError::Parse { .. })));
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn netcdf_requires_feature() {
        let err = Dataset::open("map_ne30pg2_to_721x1440_fv2fv.nc").unwrap_err();
        assert!(matches!(
            err,
            RemapError::Load(LoadError::FeatureDisabled("netcdf"))
        ));
    }

    #[test]
    fn open_source_borrows() {
        let ds = sample();
        let resolved = DatasetSource::from(&ds).resolve().unwrap();
        assert!(matches!(resolved, Cow::Borrowed(_)));
    }
}
