//! End-to-end change detection over a co-registered image pair
//!
//! Validates inputs, decides between a single whole-raster pass and tiled
//! inference, stitches tile predictions with overlap averaging and
//! optionally vectorizes the resulting mask.

use crate::inference::{run_tile, ChangeModel};
use crate::stitch::{Accumulator, TilePrediction, CHANGE_THRESHOLD};
use crate::vectorize::{mask_to_polygons, VectorizeParams};
use geochange_core::vector::FeatureCollection;
use geochange_core::{
    BBox, Error, GeoPolygon, GeoTransform, ImageStack, Raster, Result, CRS,
};
use geochange_parallel::{ParallelStrategy, ProcessingMode, TileGrid, TileSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Parameters for [`predict_change`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionParams {
    /// Model input height
    pub tile_rows: usize,
    /// Model input width
    pub tile_cols: usize,
    /// Average identity and three flipped passes per tile
    pub use_tta: bool,
    /// Threshold each tile to {0, 1} before stitching
    pub binarize_tiles: bool,
    /// Decision threshold for tiles and the stitched average (strict `>`)
    pub threshold: f32,
    pub want_polygons: bool,
    /// Minimum polygon area in output units
    pub min_area: f64,
    pub target_crs: Option<CRS>,
    pub simplify_tolerance: Option<f64>,
    /// Tile dispatch; every mode produces the same mask
    pub mode: ProcessingMode,
}

impl Default for ChangeDetectionParams {
    fn default() -> Self {
        Self {
            tile_rows: 1024,
            tile_cols: 1024,
            use_tta: true,
            binarize_tiles: true,
            threshold: CHANGE_THRESHOLD,
            want_polygons: false,
            min_area: 10.0,
            target_crs: None,
            simplify_tolerance: None,
            mode: ProcessingMode::Sequential,
        }
    }
}

impl ChangeDetectionParams {
    /// Square tiles of `size` pixels
    pub fn with_tile_size(mut self, size: usize) -> Self {
        self.tile_rows = size;
        self.tile_cols = size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.tile_rows == 0 || self.tile_cols == 0 {
            return Err(Error::InvalidParameter {
                name: "tile_size",
                value: format!("{}x{}", self.tile_rows, self.tile_cols),
                reason: "tile dimensions must be positive".into(),
            });
        }
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: self.threshold.to_string(),
                reason: "expected a value in [0, 1)".into(),
            });
        }
        Ok(())
    }
}

/// Where the rasters sit on the ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeoContext {
    /// Extent of the raster; pixel size follows from the raster shape
    BoundingBox { bbox: BBox, crs: CRS },
    /// Explicit affine transform
    Transform {
        transform: GeoTransform,
        crs: Option<CRS>,
    },
}

impl GeoContext {
    /// Bounding box in the default projected CRS (EPSG:25832)
    pub fn from_bbox(bbox: BBox) -> Self {
        GeoContext::BoundingBox {
            bbox,
            crs: CRS::default(),
        }
    }

    /// Georeferencing carried by an image, if it has a CRS
    pub fn from_stack(stack: &ImageStack) -> Option<Self> {
        stack.crs().map(|crs| GeoContext::Transform {
            transform: *stack.transform(),
            crs: Some(crs.clone()),
        })
    }

    pub fn crs(&self) -> Option<&CRS> {
        match self {
            GeoContext::BoundingBox { crs, .. } => Some(crs),
            GeoContext::Transform { crs, .. } => crs.as_ref(),
        }
    }

    /// Affine transform for a `rows x cols` raster
    pub fn transform_for(&self, rows: usize, cols: usize) -> Result<GeoTransform> {
        match self {
            GeoContext::BoundingBox { bbox, .. } => GeoTransform::from_bounds(bbox, cols, rows),
            GeoContext::Transform { transform, .. } => Ok(*transform),
        }
    }
}

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct ChangeResult {
    /// {0, 255} change mask at full resolution
    pub mask: Raster<u8>,
    /// Averaged per-pixel tile values (`sum / count`)
    pub probability: Raster<f32>,
    /// Empty unless polygons were requested
    pub polygons: Vec<GeoPolygon>,
    /// Number of inference units (tiles) processed
    pub tiles: usize,
}

impl ChangeResult {
    pub fn changed_pixels(&self) -> usize {
        self.mask.count_nonzero()
    }

    /// Polygons as features with `id` and `area` properties
    pub fn feature_collection(&self) -> FeatureCollection {
        FeatureCollection::from_polygons(&self.polygons)
    }
}

/// Tiles for a raster: one whole-raster unit when it fits the model input,
/// otherwise the overlapping grid.
fn plan_tiles(rows: usize, cols: usize, params: &ChangeDetectionParams) -> Result<Vec<TileSpec>> {
    if rows <= params.tile_rows && cols <= params.tile_cols {
        debug!(rows, cols, "raster fits one tile, running direct pass");
        return Ok(vec![TileSpec::full(rows, cols)]);
    }

    let grid = TileGrid::new(rows, cols, params.tile_rows, params.tile_cols)?;
    if grid.is_single() {
        warn!(
            rows,
            cols,
            tile_rows = params.tile_rows,
            tile_cols = params.tile_cols,
            "raster is smaller than the tile in one dimension, using a single whole-raster tile"
        );
    }
    let tiles = grid.tiles();
    if tiles.is_empty() {
        return Err(Error::EmptyTileSet { rows, cols });
    }
    Ok(tiles)
}

/// Detect change between `before` and `after`.
///
/// Structural problems (missing geo context, shape mismatch, bad
/// parameters, unsupported reprojection) are reported before the model is
/// called. A model failure on any tile aborts the run with
/// [`Error::InferenceFailure`].
pub fn predict_change<M: ChangeModel + ?Sized>(
    model: &M,
    before: &ImageStack,
    after: &ImageStack,
    params: &ChangeDetectionParams,
    geo: Option<&GeoContext>,
) -> Result<ChangeResult> {
    if params.want_polygons && geo.is_none() {
        return Err(Error::MissingGeoContext);
    }

    let (rows, cols) = before.shape();
    if after.shape() != (rows, cols) {
        return Err(Error::DimensionMismatch {
            er: rows,
            ec: cols,
            ar: after.rows(),
            ac: after.cols(),
        });
    }
    if after.bands() != before.bands() {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: after.bands().to_string(),
            reason: format!("before image has {} bands", before.bands()),
        });
    }
    params.validate()?;

    let (transform, crs) = match geo {
        Some(g) => (g.transform_for(rows, cols)?, g.crs().cloned()),
        None => (*before.transform(), before.crs().cloned()),
    };

    let vectorize = match geo {
        Some(_) if params.want_polygons => {
            let v = VectorizeParams {
                transform: Some(transform),
                source_crs: crs.clone(),
                target_crs: params.target_crs.clone(),
                min_area: params.min_area,
                simplify_tolerance: params.simplify_tolerance,
            };
            v.validate()?;
            Some(v)
        }
        _ => None,
    };

    let tiles: Vec<(usize, TileSpec)> = plan_tiles(rows, cols, params)?
        .into_iter()
        .enumerate()
        .collect();
    info!(
        model = model.name(),
        rows,
        cols,
        bands = before.bands(),
        tiles = tiles.len(),
        tta = params.use_tta,
        mode = ?params.mode,
        "starting change detection"
    );

    let predictions = params.mode.try_par_map(&tiles, |&(index, spec)| {
        let b = before.window(spec.start_row, spec.start_col, spec.height, spec.width)?;
        let a = after.window(spec.start_row, spec.start_col, spec.height, spec.width)?;
        let values = run_tile(model, b, a, params.use_tta).map_err(|e| Error::InferenceFailure {
            tile: index,
            reason: e.to_string(),
        })?;
        debug!(
            tile = index,
            row = spec.row_index,
            col = spec.col_index,
            start_row = spec.start_row,
            start_col = spec.start_col,
            "tile inferred"
        );

        let prediction = TilePrediction::new(spec, values);
        Ok(if params.binarize_tiles {
            prediction.binarized(params.threshold)
        } else {
            prediction
        })
    })?;

    let mut acc = Accumulator::new(rows, cols);
    for prediction in &predictions {
        acc.add(prediction)?;
    }
    let (mask, probability) = acc.finalize(params.threshold);
    let mask = mask.with_georef(transform, crs.clone());
    let probability = probability.with_georef(transform, crs);

    let polygons = match &vectorize {
        Some(v) => mask_to_polygons(&mask, v)?,
        None => Vec::new(),
    };

    let result = ChangeResult {
        mask,
        probability,
        polygons,
        tiles: tiles.len(),
    };
    info!(
        changed_pixels = result.changed_pixels(),
        polygons = result.polygons.len(),
        "change detection finished"
    );
    Ok(result)
}
