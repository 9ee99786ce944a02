//! Overlap-averaged reassembly of tile predictions
//!
//! Every tile adds its values into a `sum` buffer and 1 into a `count`
//! buffer over its window. The stitched probability is `sum / count`, so
//! overlapping tiles are averaged rather than overwritten.

use geochange_core::{Error, Raster, Result};
use geochange_parallel::{TileGrid, TileSpec};
use ndarray::{s, Array2, Zip};

/// Default decision threshold on the averaged probability
pub const CHANGE_THRESHOLD: f32 = 0.5;

/// Mask value for changed pixels
pub const CHANGE_VALUE: u8 = 255;

/// One tile's prediction, tagged with the window it came from
#[derive(Debug, Clone)]
pub struct TilePrediction {
    pub spec: TileSpec,
    /// `(spec.height, spec.width)` values, probabilities or {0, 1}
    pub values: Array2<f32>,
}

impl TilePrediction {
    pub fn new(spec: TileSpec, values: Array2<f32>) -> Self {
        Self { spec, values }
    }

    /// Threshold values to {0, 1} (strictly greater than `threshold`).
    pub fn binarized(mut self, threshold: f32) -> Self {
        self.values
            .mapv_inplace(|v| if v > threshold { 1.0 } else { 0.0 });
        self
    }
}

/// Running `sum`/`count` buffers for one full-size raster
#[derive(Debug, Clone)]
pub struct Accumulator {
    sum: Array2<f32>,
    count: Array2<f32>,
}

impl Accumulator {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            sum: Array2::zeros((rows, cols)),
            count: Array2::zeros((rows, cols)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.sum.dim()
    }

    /// Add one tile's values over its window.
    pub fn add(&mut self, prediction: &TilePrediction) -> Result<()> {
        let TileSpec {
            start_row,
            start_col,
            height,
            width,
            ..
        } = prediction.spec;
        let (rows, cols) = self.shape();

        if prediction.spec.end_row() > rows || prediction.spec.end_col() > cols {
            return Err(Error::IndexOutOfBounds {
                row: prediction.spec.end_row(),
                col: prediction.spec.end_col(),
                rows,
                cols,
            });
        }
        if prediction.values.dim() != (height, width) {
            return Err(Error::DimensionMismatch {
                er: height,
                ec: width,
                ar: prediction.values.nrows(),
                ac: prediction.values.ncols(),
            });
        }

        let row_range = start_row..start_row + height;
        let col_range = start_col..start_col + width;
        let mut sum = self.sum.slice_mut(s![row_range.clone(), col_range.clone()]);
        sum += &prediction.values;
        self.count
            .slice_mut(s![row_range, col_range])
            .mapv_inplace(|c| c + 1.0);
        Ok(())
    }

    /// Number of pixels no tile has covered
    pub fn uncovered(&self) -> usize {
        self.count.iter().filter(|&&c| c == 0.0).count()
    }

    /// Averaged probability map; 0 where nothing was accumulated.
    pub fn probability(&self) -> Array2<f32> {
        let mut prob = Array2::zeros(self.shape());
        Zip::from(&mut prob)
            .and(&self.sum)
            .and(&self.count)
            .for_each(|p, &s, &c| {
                *p = if c > 0.0 { s / c.max(1.0) } else { 0.0 };
            });
        prob
    }

    /// Consume the buffers into a {0, 255} mask and the averaged probability.
    pub fn finalize(self, threshold: f32) -> (Raster<u8>, Raster<f32>) {
        let prob = self.probability();
        let mask = prob.mapv(|p| if p > threshold { CHANGE_VALUE } else { 0 });
        (Raster::from_array(mask), Raster::from_array(prob))
    }
}

/// Stitch predictions into a full-resolution {0, 255} mask.
///
/// Each prediction is placed by its own [`TileSpec`]. An empty input yields
/// an all-zero mask.
pub fn stitch(predictions: &[TilePrediction], rows: usize, cols: usize) -> Result<Raster<u8>> {
    let mut acc = Accumulator::new(rows, cols);
    for prediction in predictions {
        acc.add(prediction)?;
    }
    Ok(acc.finalize(CHANGE_THRESHOLD).0)
}

/// Stitch untagged row-major tile values, re-deriving placement from the
/// first tile's shape with the same layout rules as tile generation.
pub fn stitch_grid(values: &[Array2<f32>], rows: usize, cols: usize) -> Result<Raster<u8>> {
    let Some(first) = values.first() else {
        return Ok(Raster::new(rows, cols));
    };

    let (tile_rows, tile_cols) = first.dim();
    let tiles = TileGrid::new(rows, cols, tile_rows, tile_cols)?.tiles();
    if tiles.len() != values.len() {
        return Err(Error::InvalidParameter {
            name: "values",
            value: values.len().to_string(),
            reason: format!("grid for {rows}x{cols} has {} tiles", tiles.len()),
        });
    }

    let predictions: Vec<TilePrediction> = tiles
        .into_iter()
        .zip(values)
        .map(|(spec, v)| TilePrediction::new(spec, v.clone()))
        .collect();
    stitch(&predictions, rows, cols)
}
