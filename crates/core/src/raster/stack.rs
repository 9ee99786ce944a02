//! Multi-band image stack used as model input

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use ndarray::{s, Array3, ArrayView2, ArrayView3, Axis};

/// A georeferenced `(rows, cols, bands)` image with `f32` samples.
///
/// Samples are expected to be normalized before inference; the integer
/// constructors scale to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ImageStack {
    data: Array3<f32>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl ImageStack {
    /// Wrap an existing array, rejecting empty dimensions.
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        let (rows, cols, bands) = data.dim();
        if rows == 0 || cols == 0 || bands == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
        })
    }

    /// Build from interleaved (chunky) samples, dividing each by `scale`.
    pub fn from_interleaved<T>(
        samples: &[T],
        rows: usize,
        cols: usize,
        bands: usize,
        scale: f32,
    ) -> Result<Self>
    where
        T: Copy + Into<f64>,
    {
        if samples.len() != rows * cols * bands {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let values: Vec<f32> = samples
            .iter()
            .map(|&v| (v.into() / scale as f64) as f32)
            .collect();
        let data = Array3::from_shape_vec((rows, cols, bands), values)
            .map_err(|e| Error::Other(e.to_string()))?;
        Self::from_array(data)
    }

    /// 8-bit samples scaled to `[0, 1]`
    pub fn from_u8(samples: &[u8], rows: usize, cols: usize, bands: usize) -> Result<Self> {
        Self::from_interleaved(samples, rows, cols, bands, u8::MAX as f32)
    }

    /// 16-bit samples scaled to `[0, 1]`
    pub fn from_u16(samples: &[u16], rows: usize, cols: usize, bands: usize) -> Result<Self> {
        Self::from_interleaved(samples, rows, cols, bands, u16::MAX as f32)
    }

    /// Attach georeferencing, builder style
    pub fn with_georef(mut self, transform: GeoTransform, crs: Option<CRS>) -> Self {
        self.transform = transform;
        self.crs = crs;
        self
    }

    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    pub fn bands(&self) -> usize {
        self.data.dim().2
    }

    /// Spatial dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// One band as a 2D view, `None` when out of range
    pub fn band(&self, band: usize) -> Option<ArrayView2<'_, f32>> {
        (band < self.bands()).then(|| self.data.index_axis(Axis(2), band))
    }

    /// Borrow the `rows x cols` window starting at (`row`, `col`), all bands.
    pub fn window(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<ArrayView3<'_, f32>> {
        if row + rows > self.rows() || col + cols > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row + rows,
                col: col + cols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.slice(s![row..row + rows, col..col + cols, ..]))
    }

    /// Per-band standardisation `(v - mean) / std`.
    pub fn standardize(&mut self, mean: &[f32], std: &[f32]) -> Result<()> {
        let bands = self.bands();
        if mean.len() != bands || std.len() != bands {
            return Err(Error::InvalidParameter {
                name: "mean/std",
                value: format!("{}/{}", mean.len(), std.len()),
                reason: format!("expected one value per band ({bands})"),
            });
        }
        if let Some(bad) = std.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(Error::InvalidParameter {
                name: "std",
                value: bad.to_string(),
                reason: "standard deviation must be positive".into(),
            });
        }
        for (band, mut lane) in self.data.axis_iter_mut(Axis(2)).enumerate() {
            let (m, s) = (mean[band], std[band]);
            lane.mapv_inplace(|v| (v - m) / s);
        }
        Ok(())
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }
}
