//! Error types for geochange

use thiserror::Error;

/// Main error type for geochange operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster dimension mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    DimensionMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Tile generation produced no tiles for a {rows}x{cols} raster")]
    EmptyTileSet { rows: usize, cols: usize },

    #[error("Inference failed on tile {tile}: {reason}")]
    InferenceFailure { tile: usize, reason: String },

    #[error("Polygons requested without a bounding box or affine transform")]
    MissingGeoContext,

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Unsupported reprojection: {from} -> {to}")]
    UnsupportedCrs { from: String, to: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for geochange operations
pub type Result<T> = std::result::Result<T, Error>;
