//! Axis-aligned bounding boxes in map coordinates

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A bounding box in the coordinate space of some CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Build from the latitude-first ordering `[min_lat, min_lon, max_lat, max_lon]`
    /// used by the analysis request payloads.
    pub fn from_lat_lon(coords: [f64; 4]) -> Self {
        Self::new(coords[1], coords[0], coords[3], coords[2])
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Reject inverted, empty or non-finite boxes.
    pub fn validate(&self) -> Result<()> {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "bbox",
                value: format!(
                    "[{}, {}, {}, {}]",
                    self.min_x, self.min_y, self.max_x, self.max_y
                ),
                reason: "expected finite min < max on both axes".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lat_lon_ordering() {
        let bbox = BBox::from_lat_lon([55.0, 9.0, 56.0, 10.5]);
        assert_eq!(bbox, BBox::new(9.0, 55.0, 10.5, 56.0));
        assert_eq!(bbox.width(), 1.5);
    }

    #[test]
    fn validate_rejects_inverted() {
        assert!(BBox::new(0.0, 0.0, 10.0, 10.0).validate().is_ok());
        assert!(BBox::new(10.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(BBox::new(0.0, 0.0, f64::NAN, 10.0).validate().is_err());
    }
}
