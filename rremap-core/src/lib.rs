//! Sparse-weight remapping of gridded climate fields
//!
//! The workflow is:
//!
//! 1. load a weight file (`S`, `row`, `col` triplets) into a [`SparseWeightMatrix`]
//! 2. apply it to a [`Field`] with [`remap`] or [`apply_map`]
//! 3. lay the result out on the destination, described by a [`Destination`]
//!
//! [`interpolate::interp_along_axis`] is an independent helper for resampling
//! vertical profiles or time series along one axis of an N-d array.

pub mod cache;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod field;
pub mod grid;
pub mod interpolate;
pub mod remap;
pub mod spatial;
pub mod weights;

pub use dataset::{Dataset, DatasetSource, Variable};
pub use errors::{LoadError, RemapError, RemapResult, ShapeError};
pub use field::Field;
pub use grid::{Destination, DestinationGrid};
pub use remap::{apply_map, remap, RemapOutput};
pub use weights::{IndexBase, SparseWeightMatrix};
