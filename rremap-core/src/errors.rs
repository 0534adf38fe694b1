use std::path::PathBuf;
use thiserror::Error;

/// Failures while opening a weight dataset or building the sparse operator from it.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Unsupported dataset format for {}. Expected .json, .toml or .nc", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("Reading this dataset requires the `{0}` feature")]
    FeatureDisabled(&'static str),
    #[error("Variable `{0}` not found in dataset")]
    MissingVariable(String),
    #[error("Triplet lengths disagree: S={weights}, row={rows}, col={cols}")]
    TripletLengthMismatch {
        weights: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{axis} index {index} is outside the valid range 0..{bound}")]
    IndexOutOfRange {
        axis: &'static str,
        index: i64,
        bound: usize,
    },
    #[error("Invalid destination grid dimensions {0:?}")]
    InvalidGridDims(Vec<i64>),
}

/// Shape and rank violations detected before any numerical work is done.
#[derive(Error, Debug, PartialEq)]
pub enum ShapeError {
    #[error("Fields of rank {0} are not supported. Expected rank 1 or 2")]
    UnsupportedRank(usize),
    #[error("Source field has {actual} elements but the weight matrix expects {expected}")]
    SourceLength { expected: usize, actual: usize },
    #[error("Destination layout holds {actual} elements but the weight matrix produces {expected}")]
    DestinationLength { expected: usize, actual: usize },
    #[error("Array shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
    #[error("Axis {axis} is out of bounds for an array of rank {ndim}")]
    InvalidAxis { axis: isize, ndim: usize },
    #[error("Cannot interpolate from an empty axis {axis}")]
    EmptyAxis { axis: usize },
    #[error("Array of rank {ndim} cannot be labelled with dimensions {labels:?}")]
    DimensionLabels { ndim: usize, labels: Vec<String> },
    #[error("Coordinate for `{dim}` has {actual} values but the dimension has length {expected}")]
    CoordinateLength {
        dim: String,
        expected: usize,
        actual: usize,
    },
    #[error("Dimension `{0}` not present")]
    UnknownDimension(String),
}

/// Error type for remapping operations.
#[derive(Error, Debug)]
pub enum RemapError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Grid `{0}` not found in the registry of known grid files")]
    UnknownGrid(String),
    #[error("Coordinate `{0}` not available")]
    MissingCoordinate(String),
}

/// Convenience type for `Result<T, RemapError>`.
pub type RemapResult<T> = Result<T, RemapError>;
