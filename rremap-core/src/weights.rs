//! Sparse weight matrices
//!
//! Remapping weights are stored on disk as three parallel variables: `S` holds
//! the weights, `row` the destination cell and `col` the source cell of each
//! entry. Persisted indices are **1-based**; in memory every index is
//! **0-based**. The conversion happens once, in
//! [`SparseWeightMatrix::from_triplets`], and is controlled by an explicit
//! [`IndexBase`] so neither side of the boundary relies on convention.
//!
//! Entries that share a `(row, col)` pair are summed (coordinate-format
//! semantics). No renormalisation is applied: whether a remap conserves
//! anything is entirely a property of the supplied weights. Use
//! [`SparseWeightMatrix::row_sums`] to assert it where it matters.
//!
//! # Examples
//!
//! ```rust
//! use rremap_core::weights::{IndexBase, SparseWeightMatrix};
//!
//! // Two destination cells, each the mean of two source cells
//! let matrix = SparseWeightMatrix::from_triplets(
//!     &[0.5, 0.5, 0.5, 0.5],
//!     &[1, 1, 2, 2],
//!     &[1, 2, 3, 4],
//!     IndexBase::One,
//!     None,
//! )
//! .unwrap();
//! assert_eq!(matrix.shape(), (2, 4));
//!
//! let remapped = matrix.apply(&[1.0, 3.0, 10.0, 20.0]).unwrap();
//! assert_eq!(remapped, vec![2.0, 15.0]);
//! ```

use crate::dataset::{Dataset, DatasetSource};
use crate::errors::{LoadError, RemapResult, ShapeError};
use ndarray::Array2;
use rsparse::data::{Sprs, Trpl};
use std::fmt;
use tracing::debug;

/// Name of the weight variable in a persisted weight file
pub const WEIGHTS_VAR: &str = "S";
/// Name of the destination index variable in a persisted weight file
pub const ROW_VAR: &str = "row";
/// Name of the source index variable in a persisted weight file
pub const COL_VAR: &str = "col";
/// Destination cell centre longitudes; its length declares the destination size
pub const DST_X_VAR: &str = "xc_b";
/// Source cell centre longitudes; its length declares the source size
pub const SRC_X_VAR: &str = "xc_a";

/// Origin of the row/column indices in a triplet list
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexBase {
    /// Indices start at 0 (in-memory convention)
    Zero,
    /// Indices start at 1 (persisted SCRIP/ESMF weight files)
    One,
}

impl IndexBase {
    fn offset(self) -> i64 {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }
}

/// Immutable linear operator mapping a flattened source field of length
/// `n_src` onto a flattened destination field of length `n_dst`.
pub struct SparseWeightMatrix {
    n_dst: usize,
    n_src: usize,
    /// 0-based destination indices
    rows: Vec<usize>,
    /// 0-based source indices
    cols: Vec<usize>,
    weights: Vec<f64>,
    operator: Sprs,
}

impl fmt::Debug for SparseWeightMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseWeightMatrix")
            .field("shape", &self.shape())
            .field("nnz", &self.nnz())
            .finish()
    }
}

impl SparseWeightMatrix {
    /// Build the operator from parallel triplet slices.
    ///
    /// `base` states how `rows` and `cols` are numbered. When `shape` is
    /// `None` it is inferred as one past the largest 0-based index along each
    /// axis; when given as `(n_dst, n_src)` every index must fall inside it.
    ///
    /// # Errors
    ///
    /// * [`LoadError::TripletLengthMismatch`] if the slices differ in length
    /// * [`LoadError::IndexOutOfRange`] if an index is below `base` or beyond `shape`
    pub fn from_triplets(
        weights: &[f64],
        rows: &[i64],
        cols: &[i64],
        base: IndexBase,
        shape: Option<(usize, usize)>,
    ) -> Result<Self, LoadError> {
        if weights.len() != rows.len() || weights.len() != cols.len() {
            return Err(LoadError::TripletLengthMismatch {
                weights: weights.len(),
                rows: rows.len(),
                cols: cols.len(),
            });
        }

        let rows = rebase(rows, base, shape.map(|s| s.0), "row")?;
        let cols = rebase(cols, base, shape.map(|s| s.1), "col")?;
        let (n_dst, n_src) = shape.unwrap_or_else(|| {
            (
                rows.iter().max().map_or(0, |r| r + 1),
                cols.iter().max().map_or(0, |c| c + 1),
            )
        });

        let mut operator = Sprs::new();
        operator.from_trpl(&Trpl {
            m: n_dst,
            n: n_src,
            p: cols.iter().map(|&c| c as isize).collect(),
            i: rows.clone(),
            x: weights.to_vec(),
        });

        debug!(n_dst, n_src, nnz = weights.len(), "Built COO weight matrix");
        Ok(Self {
            n_dst,
            n_src,
            rows,
            cols,
            weights: weights.to_vec(),
            operator,
        })
    }

    /// Build the operator from a persisted weight dataset.
    ///
    /// Reads `S`, `row` and `col` (1-based). The shape is
    /// `(max(row), max(col))`.
    pub fn from_dataset(ds: &Dataset) -> Result<Self, LoadError> {
        let (weights, rows, cols) = read_triplets(ds)?;
        Self::from_triplets(&weights, &rows, &cols, IndexBase::One, None)
    }

    /// Like [`Self::from_dataset`], but sized by the destination (`xc_b`) and
    /// source (`xc_a`) coordinate lengths where the dataset carries them.
    ///
    /// Trailing cells that no triplet touches then still count towards the
    /// shape. Indices beyond a declared length are rejected.
    pub fn from_dataset_with_declared_shape(ds: &Dataset) -> Result<Self, LoadError> {
        let (weights, rows, cols) = read_triplets(ds)?;
        let shape = match (ds.get(DST_X_VAR), ds.get(SRC_X_VAR)) {
            (Some(dst), Some(src)) => Some((dst.len(), src.len())),
            (Some(dst), None) => Some((dst.len(), max_index(&cols, IndexBase::One))),
            (None, Some(src)) => Some((max_index(&rows, IndexBase::One), src.len())),
            (None, None) => None,
        };

        Self::from_triplets(&weights, &rows, &cols, IndexBase::One, shape)
    }

    /// Open (if needed) and load a weight dataset.
    pub fn load<'a>(source: impl Into<DatasetSource<'a>>) -> RemapResult<Self> {
        let ds = DatasetSource::resolve(source.into())?;
        Ok(Self::from_dataset(&ds)?)
    }

    /// `(n_dst, n_src)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_dst, self.n_src)
    }

    /// Length of the flattened destination field
    pub fn n_dst(&self) -> usize {
        self.n_dst
    }

    /// Length of the flattened source field
    pub fn n_src(&self) -> usize {
        self.n_src
    }

    /// Number of stored entries, counting duplicates separately
    pub fn nnz(&self) -> usize {
        self.weights.len()
    }

    /// Iterate over `(row, col, weight)` with 0-based indices.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.weights.iter())
            .map(|((&r, &c), &w)| (r, c, w))
    }

    /// Sum of weights per destination cell.
    ///
    /// For a conservative or bilinear map every covered destination row sums
    /// to 1.
    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_dst];
        for (r, _, w) in self.triplets() {
            sums[r] += w;
        }
        sums
    }

    /// Dense copy of the operator. Intended for inspecting small maps.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_dst, self.n_src));
        for (r, c, w) in self.triplets() {
            dense[[r, c]] += w;
        }
        dense
    }

    /// Matrix-vector product `W · x`.
    ///
    /// # Errors
    ///
    /// [`ShapeError::SourceLength`] if `x.len() != n_src`. The check happens
    /// before any arithmetic.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>, ShapeError> {
        if x.len() != self.n_src {
            return Err(ShapeError::SourceLength {
                expected: self.n_src,
                actual: x.len(),
            });
        }
        // Nothing to multiply when either side has no structural entries
        if self.n_dst == 0 || self.weights.is_empty() || x.iter().all(|&v| v == 0.0) {
            return Ok(vec![0.0; self.n_dst]);
        }

        let mut column = Sprs::new();
        column.from_vec(&vec![x.to_vec()]);
        // transpose to column vector
        let column = rsparse::transpose(&column);

        let product = rsparse::multiply(&self.operator, &column).to_dense();
        Ok(product
            .iter()
            .map(|row| row.first().copied().unwrap_or(0.0))
            .collect())
    }
}

fn rebase(
    indices: &[i64],
    base: IndexBase,
    bound: Option<usize>,
    axis: &'static str,
) -> Result<Vec<usize>, LoadError> {
    let offset = base.offset();
    indices
        .iter()
        .map(|&index| {
            let shifted = index - offset;
            let in_bounds = shifted >= 0 && bound.map_or(true, |b| (shifted as usize) < b);
            if in_bounds {
                Ok(shifted as usize)
            } else {
                Err(LoadError::IndexOutOfRange {
                    axis,
                    index: shifted,
                    bound: bound.unwrap_or(0),
                })
            }
        })
        .collect()
}

fn read_triplets(ds: &Dataset) -> Result<(Vec<f64>, Vec<i64>, Vec<i64>), LoadError> {
    Ok((
        ds.variable(WEIGHTS_VAR)?.to_vec(),
        ds.variable(ROW_VAR)?.to_indices(),
        ds.variable(COL_VAR)?.to_indices(),
    ))
}

fn max_index(indices: &[i64], base: IndexBase) -> usize {
    indices
        .iter()
        .max()
        .map_or(0, |&m| (m - base.offset() + 1).max(0) as usize)
}
