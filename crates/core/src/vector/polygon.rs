//! Geo-referenced polygons produced from change masks

use crate::crs::CRS;
use geo_types::{Coord, LineString, Polygon};

/// An immutable polygon ring with its declared CRS and planar area.
///
/// The area is in squared units of whatever space the vertices live in:
/// pixels without a transform, CRS units otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPolygon {
    polygon: Polygon<f64>,
    crs: Option<CRS>,
    area: f64,
}

impl GeoPolygon {
    /// Wrap a polygon whose area has already been measured.
    pub fn new(polygon: Polygon<f64>, crs: Option<CRS>, area: f64) -> Self {
        Self { polygon, crs, area }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Planar (unsigned) area
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Closed exterior ring
    pub fn exterior(&self) -> &LineString<f64> {
        self.polygon.exterior()
    }

    /// Exterior vertices without the closing duplicate
    pub fn vertices(&self) -> &[Coord<f64>] {
        let coords = &self.polygon.exterior().0;
        &coords[..coords.len().saturating_sub(1)]
    }
}
