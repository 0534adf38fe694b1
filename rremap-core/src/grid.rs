//! Destination grid descriptions
//!
//! After the matrix-vector product the remapped values are a flat vector of
//! destination cells. A [`Destination`] says how to lay them out again:
//!
//! - [`Destination::Template`]: copy the shape, dimension names and
//!   coordinates of an existing field
//! - [`Destination::Grid`]: a logically rectangular `(ny, nx)` grid labelled
//!   `(lat, lon)`, described by a [`DestinationGrid`]
//! - [`Destination::Unstructured`]: no reshape; the destination cell
//!   coordinates are handed back as-is
//!
//! Weight files describe the destination with `dst_grid_dims` (stored as
//! `[nx, ny]`, the reverse of the reshape order) and cell centre coordinates
//! `xc_b`/`yc_b` flattened row-major over `(ny, nx)`.

use crate::dataset::{Dataset, Variable};
use crate::errors::{LoadError, RemapError, RemapResult, ShapeError};
use crate::field::Field;
use crate::weights::DST_X_VAR;
use ndarray::{Array1, Array2};

/// Destination grid dimensions in a weight file, stored as `[nx, ny]`
pub const DST_GRID_DIMS_VAR: &str = "dst_grid_dims";
/// Destination cell centre latitudes in a weight file
pub const DST_Y_VAR: &str = "yc_b";
/// Dimension name given to the slow (y) axis of an explicit grid
pub const LAT_DIM: &str = "lat";
/// Dimension name given to the fast (x) axis of an explicit grid
pub const LON_DIM: &str = "lon";

/// How a flat remapped vector is laid out on the destination.
#[derive(Debug, Clone)]
pub enum Destination<'a> {
    /// Impose the shape, dimension names and coordinates of this field
    Template(&'a Field),
    /// Reshape to `(ny, nx)` and label `(lat, lon)`
    Grid(DestinationGrid),
    /// Leave flat and return these cell coordinates unchanged
    Unstructured { x: Array1<f64>, y: Array1<f64> },
}

impl Destination<'static> {
    /// Describe the destination using the grid metadata of a weight dataset.
    ///
    /// A two-element `dst_grid_dims` gives [`Destination::Grid`]; anything
    /// else gives [`Destination::Unstructured`] with the raw `xc_b`/`yc_b`.
    pub fn from_weights(ds: &Dataset) -> RemapResult<Self> {
        if let Some(grid) = DestinationGrid::from_dataset(ds)? {
            return Ok(Destination::Grid(grid));
        }
        Ok(Destination::Unstructured {
            x: Array1::from_vec(ds.variable(DST_X_VAR)?.to_vec()),
            y: Array1::from_vec(ds.variable(DST_Y_VAR)?.to_vec()),
        })
    }
}

/// A logically rectangular destination grid.
///
/// Cell centre coordinates are held as `(ny, nx)` arrays. The 1-d axis
/// coordinates are read off the first row (x) and first column (y), which is
/// only meaningful when x is constant down columns and y constant along rows.
/// [`DestinationGrid::is_rectilinear`] tests that assumption.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationGrid {
    xc: Array2<f64>,
    yc: Array2<f64>,
}

impl DestinationGrid {
    /// Build from row-major cell centre coordinates of length `ny * nx`.
    pub fn new(ny: usize, nx: usize, xc: Vec<f64>, yc: Vec<f64>) -> Result<Self, ShapeError> {
        let expected = ny * nx;
        let reshape = |values: Vec<f64>| {
            let actual = values.len();
            Array2::from_shape_vec((ny, nx), values)
                .map_err(|_| ShapeError::DestinationLength { expected, actual })
        };
        Ok(Self {
            xc: reshape(xc)?,
            yc: reshape(yc)?,
        })
    }

    /// Read `dst_grid_dims`, `xc_b` and `yc_b` from a weight dataset.
    ///
    /// Returns `Ok(None)` when the dataset does not describe a 2-d grid.
    pub fn from_dataset(ds: &Dataset) -> RemapResult<Option<Self>> {
        let dims = match ds.get(DST_GRID_DIMS_VAR) {
            Some(var) if var.len() == 2 => var.to_indices(),
            _ => return Ok(None),
        };
        // Stored as [nx, ny]
        let (nx, ny) = match (usize::try_from(dims[0]), usize::try_from(dims[1])) {
            (Ok(nx), Ok(ny)) if nx > 0 && ny > 0 => (nx, ny),
            _ => return Err(LoadError::InvalidGridDims(dims).into()),
        };
        let xc = ds.variable(DST_X_VAR)?.to_vec();
        let yc = ds.variable(DST_Y_VAR)?.to_vec();
        Ok(Some(Self::new(ny, nx, xc, yc)?))
    }

    /// `(ny, nx)`, the row-major reshape target
    pub fn shape(&self) -> (usize, usize) {
        self.xc.dim()
    }

    pub fn len(&self) -> usize {
        self.xc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xc.is_empty()
    }

    /// Longitudes of the first grid row
    pub fn x(&self) -> Array1<f64> {
        match self.xc.rows().into_iter().next() {
            Some(row) => row.to_owned(),
            None => Array1::zeros(self.xc.ncols()),
        }
    }

    /// Latitudes of the first grid column
    pub fn y(&self) -> Array1<f64> {
        match self.yc.columns().into_iter().next() {
            Some(col) => col.to_owned(),
            None => Array1::zeros(self.yc.nrows()),
        }
    }

    /// Full `(ny, nx)` cell centre longitudes
    pub fn xc(&self) -> &Array2<f64> {
        &self.xc
    }

    /// Full `(ny, nx)` cell centre latitudes
    pub fn yc(&self) -> &Array2<f64> {
        &self.yc
    }

    /// Whether x is constant down every column and y constant along every
    /// row, to within `tolerance`.
    pub fn is_rectilinear(&self, tolerance: f64) -> bool {
        let x = self.x();
        let y = self.y();
        let x_ok = self
            .xc
            .rows()
            .into_iter()
            .all(|row| row.iter().zip(x.iter()).all(|(a, b)| (a - b).abs() <= tolerance));
        let y_ok = self
            .yc
            .columns()
            .into_iter()
            .all(|col| col.iter().zip(y.iter()).all(|(a, b)| (a - b).abs() <= tolerance));
        x_ok && y_ok
    }
}

/// Which convention a grid file used for its coordinates
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoordinateKind {
    /// `lon`/`lat` variables
    LonLat,
    /// SCRIP `grid_corner_lon`/`grid_corner_lat` (cell vertices)
    Corners,
    /// SCRIP `grid_center_lon`/`grid_center_lat`
    Centers,
}

/// Horizontal coordinates selected from a data or SCRIP grid file.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCoordinates {
    pub x: Variable,
    pub y: Variable,
    pub kind: CoordinateKind,
}

impl GridCoordinates {
    /// Pick the coordinates of a dataset.
    ///
    /// Preference order: `lon`/`lat`, then cell corners, then cell centres.
    pub fn from_dataset(ds: &Dataset) -> RemapResult<Self> {
        let candidates = [
            ("lon", "lat", CoordinateKind::LonLat),
            ("grid_corner_lon", "grid_corner_lat", CoordinateKind::Corners),
            ("grid_center_lon", "grid_center_lat", CoordinateKind::Centers),
        ];
        for (x_name, y_name, kind) in candidates {
            if let (Some(x), Some(y)) = (ds.get(x_name), ds.get(y_name)) {
                return Ok(Self {
                    x: x.clone(),
                    y: y.clone(),
                    kind,
                });
            }
        }
        Err(RemapError::MissingCoordinate(
            "lon/lat, grid_corner_lon/lat or grid_center_lon/lat".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// 4 x 3 regular grid: nx = 4, ny = 3
    fn regular(ds: Dataset) -> Dataset {
        let mut xc = Vec::new();
        let mut yc = Vec::new();
        for lat in [-60.0, 0.0, 60.0] {
            for lon in [0.0, 90.0, 180.0, 270.0] {
                xc.push(lon);
                yc.push(lat);
            }
        }
        ds.with_variable(DST_GRID_DIMS_VAR, Variable::from_vec("dst_grid_rank", vec![4.0, 3.0]))
            .with_variable(DST_X_VAR, Variable::from_vec("n_b", xc))
            .with_variable(DST_Y_VAR, Variable::from_vec("n_b", yc))
    }

    #[test]
    fn grid_dims_are_reversed() {
        let grid = DestinationGrid::from_dataset(&regular(Dataset::new()))
            .unwrap()
            .unwrap();
        assert_eq!(grid.shape(), (3, 4));
        assert_eq!(grid.x(), array![0.0, 90.0, 180.0, 270.0]);
        assert_eq!(grid.y(), array![-60.0, 0.0, 60.0]);
        assert!(grid.is_rectilinear(1e-9));
    }

    #[test]
    fn skewed_grid_is_not_rectilinear() {
        let grid = DestinationGrid::new(
            2,
            2,
            vec![0.0, 10.0, 1.0, 11.0],
            vec![-5.0, -5.0, 5.0, 5.0],
        )
        .unwrap();
        assert!(!grid.is_rectilinear(1e-6));
        assert!(grid.is_rectilinear(1.5));
    }

    #[test]
    fn coordinate_length_must_match_dims() {
        let err = DestinationGrid::new(2, 3, vec![0.0; 5], vec![0.0; 6]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::DestinationLength {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn non_positive_dims_are_rejected() {
        let ds = regular(Dataset::new()).with_variable(
            DST_GRID_DIMS_VAR,
            Variable::from_vec("dst_grid_rank", vec![0.0, 3.0]),
        );
        let err = DestinationGrid::from_dataset(&ds).unwrap_err();
        assert!(matches!(err, RemapError::Load(LoadError::InvalidGridDims(_))));
    }

    #[test]
    fn single_dim_means_unstructured() {
        let ds = Dataset::new()
            .with_variable(DST_GRID_DIMS_VAR, Variable::from_vec("dst_grid_rank", vec![5.0]))
            .with_variable(DST_X_VAR, Variable::from_vec("n_b", vec![1.0, 2.0]))
            .with_variable(DST_Y_VAR, Variable::from_vec("n_b", vec![3.0, 4.0]));
        match Destination::from_weights(&ds).unwrap() {
            Destination::Unstructured { x, y } => {
                assert_eq!(x, array![1.0, 2.0]);
                assert_eq!(y, array![3.0, 4.0]);
            }
            other => panic!("expected unstructured destination, got {:?}", other),
        }
    }

    #[test]
    fn unstructured_needs_coordinates() {
        let err = Destination::from_weights(&Dataset::new()).unwrap_err();
        assert!(matches!(
            err,
            RemapError::Load(LoadError::MissingVariable(name)) if name == "xc_b"
        ));
    }

    #[test]
    fn coordinate_selection_order() {
        let centers = Dataset::new()
            .with_variable("grid_center_lon", Variable::from_vec("grid_size", vec![0.0]))
            .with_variable("grid_center_lat", Variable::from_vec("grid_size", vec![0.0]));
        assert_eq!(
            GridCoordinates::from_dataset(&centers).unwrap().kind,
            CoordinateKind::Centers
        );

        let both = centers
            .clone()
            .with_variable("grid_corner_lon", Variable::from_vec("grid_size", vec![1.0]))
            .with_variable("grid_corner_lat", Variable::from_vec("grid_size", vec![1.0]));
        assert_eq!(
            GridCoordinates::from_dataset(&both).unwrap().kind,
            CoordinateKind::Corners
        );

        let lonlat = both
            .with_variable("lon", Variable::from_vec("ncol", vec![2.0]))
            .with_variable("lat", Variable::from_vec("ncol", vec![2.0]));
        let coords = GridCoordinates::from_dataset(&lonlat).unwrap();
        assert_eq!(coords.kind, CoordinateKind::LonLat);
        assert_eq!(coords.x.to_vec(), vec![2.0]);
    }

    #[test]
    fn missing_coordinates() {
        assert!(matches!(
            GridCoordinates::from_dataset(&Dataset::new()),
            Err(RemapError::MissingCoordinate(_))
        ));
    }
}
