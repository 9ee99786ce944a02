//! # geochange algorithms
//!
//! Tiled change detection between two co-registered images.
//!
//! ## Stages
//!
//! - **inference**: model trait, flip test-time augmentation, baseline model
//! - **stitch**: overlap-averaged reassembly of tile predictions
//! - **vectorize**: marching-squares polygons, affine mapping, reprojection
//! - **pipeline**: `predict_change`, tying the stages together

pub mod inference;
pub mod pipeline;
pub mod stitch;
pub mod vectorize;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::inference::{
        run_tile, ChangeModel, DifferenceModelParams, ModelOutput, SpectralDifferenceModel,
    };
    pub use crate::pipeline::{predict_change, ChangeDetectionParams, ChangeResult, GeoContext};
    pub use crate::stitch::{stitch, stitch_grid, Accumulator, TilePrediction};
    pub use crate::vectorize::{mask_to_polygons, VectorizeParams};
    pub use geochange_core::prelude::*;
    pub use geochange_parallel::{generate_tiles, ProcessingMode, TileGrid, TileSpec};
}
