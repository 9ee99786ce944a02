//! Single-band raster grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// A georeferenced 2D grid, indexed `(row, col)`.
///
/// Change masks are `Raster<u8>` holding {0, 255}; averaged probability maps
/// are `Raster<f32>`.
///
/// # Example
///
/// ```
/// use geochange_core::Raster;
///
/// let mut mask: Raster<u8> = Raster::new(4, 6);
/// mask.set(1, 2, 255)?;
/// assert_eq!(mask.count_nonzero(), 1);
/// # Ok::<(), geochange_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl<T: RasterElement> Raster<T> {
    /// All-zero raster without georeferencing
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Row-major samples; the length must be `rows * cols`.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|e| Error::Other(e.to_string()))
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Attach georeferencing, builder style
    pub fn with_georef(mut self, transform: GeoTransform, crs: Option<CRS>) -> Self {
        self.transform = transform;
        self.crs = crs;
        self
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        let (rows, cols) = self.shape();
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self
            .data
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = value;
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Cells holding a nonzero value (changed pixels for a mask)
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| !v.is_zero()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mask_is_blank() {
        let mask: Raster<u8> = Raster::new(100, 200);
        assert_eq!(mask.shape(), (100, 200));
        assert_eq!(mask.len(), 20_000);
        assert_eq!(mask.count_nonzero(), 0);
        assert!(mask.crs().is_none());
    }

    #[test]
    fn get_and_set_are_bounds_checked() {
        let mut mask: Raster<u8> = Raster::new(10, 10);
        mask.set(5, 5, 255).unwrap();
        assert_eq!(mask.get(5, 5).unwrap(), 255);
        assert!(mask.set(10, 0, 1).is_err());
        assert!(matches!(
            mask.get(0, 11),
            Err(Error::IndexOutOfBounds { row: 0, col: 11, .. })
        ));
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Raster::<u8>::from_vec(vec![0; 5], 2, 3).is_err());
        let r = Raster::<u8>::from_vec(vec![0, 255, 0, 255, 255, 0], 2, 3).unwrap();
        assert_eq!(r.count_nonzero(), 3);
        assert_eq!(r.get(1, 0).unwrap(), 255);
    }

    #[test]
    fn georef_is_carried() {
        let prob = Raster::<f32>::new(2, 2)
            .with_georef(GeoTransform::new(10.0, 20.0, 0.5, -0.5), Some(CRS::wgs84()));
        assert_eq!(prob.transform().origin_x, 10.0);
        assert_eq!(prob.crs(), Some(&CRS::wgs84()));
    }
}
