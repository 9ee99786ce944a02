//! Affine geotransformation for rasters

use crate::error::{Error, Result};
use crate::raster::BBox;
use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the outer corner of the upper-left pixel. For
/// north-up images the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Identity mapping: map coordinates equal pixel coordinates.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// North-up transform stretching `cols x rows` pixels over `bbox`.
    pub fn from_bounds(bbox: &BBox, cols: usize, rows: usize) -> Result<Self> {
        bbox.validate()?;
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self::new(
            bbox.min_x,
            bbox.max_y,
            bbox.width() / cols as f64,
            -bbox.height() / rows as f64,
        ))
    }

    /// Apply the affine map to fractional pixel coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, cols: usize, rows: usize) -> BBox {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(cols as f64, 0.0),
            self.apply(0.0, rows as f64),
            self.apply(cols as f64, rows as f64),
        ];

        let mut bbox = BBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for (x, y) in corners {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_at_pixel_centre() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.apply(5.5, 10.5);

        assert_relative_eq!(x, 155.0, epsilon = 1e-10);
        assert_relative_eq!(y, 95.0, epsilon = 1e-10);
    }

    #[test]
    fn test_from_bounds_matches_corners() {
        let bbox = BBox::new(565_000.0, 5_932_000.0, 566_024.0, 5_933_024.0);
        let gt = GeoTransform::from_bounds(&bbox, 512, 256).unwrap();

        assert_relative_eq!(gt.pixel_width, 2.0);
        assert_relative_eq!(gt.pixel_height, -4.0);
        assert_eq!((gt.row_rotation, gt.col_rotation), (0.0, 0.0));

        let (x0, y0) = gt.apply(0.0, 0.0);
        assert_relative_eq!(x0, bbox.min_x);
        assert_relative_eq!(y0, bbox.max_y);
        let (x1, y1) = gt.apply(512.0, 256.0);
        assert_relative_eq!(x1, bbox.max_x);
        assert_relative_eq!(y1, bbox.min_y);
    }

    #[test]
    fn test_from_bounds_rejects_empty() {
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(GeoTransform::from_bounds(&bbox, 0, 10).is_err());
        assert!(GeoTransform::from_bounds(&BBox::new(1.0, 0.0, 0.0, 1.0), 10, 10).is_err());
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let bbox = gt.bounds(100, 100);

        assert_relative_eq!(bbox.min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(bbox.min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(bbox.max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(bbox.max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_identity() {
        let gt = GeoTransform::identity();
        assert_eq!(gt.apply(3.5, 7.25), (3.5, 7.25));
        assert_eq!(gt.apply(0.0, 0.0), (0.0, 0.0));
    }
}
