//! # geochange core
//!
//! Core types and I/O shared by the geochange change-detection crates.
//!
//! This crate provides:
//! - `Raster<T>`: single-band georeferenced grid (change masks, probability maps)
//! - `ImageStack`: multi-band normalized image used as model input
//! - `GeoTransform` and `BBox`: pixel ↔ map coordinate mapping
//! - `CRS` and `CrsTransformer`: coordinate reference systems and reprojection
//! - `GeoPolygon` and GeoJSON export for vectorized change regions
//! - GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CrsTransformer, CRS};
pub use error::{Error, Result};
pub use raster::{BBox, GeoTransform, ImageStack, Raster, RasterElement};
pub use vector::GeoPolygon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CrsTransformer, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BBox, GeoTransform, ImageStack, Raster, RasterElement};
    pub use crate::vector::GeoPolygon;
}
