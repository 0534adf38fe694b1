//! Python extension module for `rremap`.
//!
//! The numerical work lives in [`rremap_core`]; this crate only converts
//! between numpy arrays and the core types. Build with the `python` feature
//! (e.g. through maturin) to produce the extension module.

pub use rremap_core::*;

#[cfg(feature = "python")]
mod python;
