//! # geochange parallel
//!
//! Tile generation and tile dispatch for the change-detection pipeline.
//!
//! This crate provides:
//! - `TileGrid`/`TileSpec`: evenly overlapping crops that reach the raster edge
//! - `ProcessingMode`: sequential or rayon-backed dispatch of per-tile work

pub mod strategy;
pub mod tiled;

pub use strategy::{ParallelStrategy, ProcessingMode};
pub use tiled::{generate_tiles, TileGrid, TileSpec};
