//! Raster-to-vector conversion of change masks
//!
//! Traces mask boundaries, maps pixel coordinates through the affine
//! transform, optionally reprojects, then keeps valid rings whose area
//! reaches `min_area`. A contour that cannot become a valid polygon is
//! skipped; it never fails the whole call.

mod contour;

pub use contour::trace_contours;

use geo::sweep::{Cross, Intersections, LineOrPoint};
use geo::{Area, Coord, Line, LineIntersection, LineString, Polygon, Simplify};
use geochange_core::{CrsTransformer, Error, GeoPolygon, GeoTransform, Raster, Result, CRS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters for [`mask_to_polygons`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeParams {
    /// Pixel to map transform; `None` keeps polygons in pixel space
    pub transform: Option<GeoTransform>,
    /// CRS of the transform's map coordinates
    pub source_crs: Option<CRS>,
    /// Reproject vertices into this CRS when it differs from the source
    pub target_crs: Option<CRS>,
    /// Minimum planar area, in the units of the output space
    pub min_area: f64,
    /// Douglas-Peucker tolerance applied before validity checks
    pub simplify_tolerance: Option<f64>,
}

impl VectorizeParams {
    /// Check tolerance and CRS settings without touching any raster.
    pub fn validate(&self) -> Result<()> {
        if let Some(tol) = self.simplify_tolerance {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(Error::InvalidParameter {
                    name: "simplify_tolerance",
                    value: tol.to_string(),
                    reason: "must be a non-negative number".into(),
                });
            }
        }
        VertexMapper::new(self).map(|_| ())
    }
}

/// Vertex mapping from pixel-centre coordinates to output coordinates
struct VertexMapper {
    transform: Option<GeoTransform>,
    reprojector: Option<CrsTransformer>,
    crs: Option<CRS>,
}

impl VertexMapper {
    fn new(params: &VectorizeParams) -> Result<Self> {
        let Some(transform) = params.transform else {
            if let Some(target) = &params.target_crs {
                return Err(Error::InvalidParameter {
                    name: "target_crs",
                    value: target.identifier(),
                    reason: "reprojection needs an affine transform".into(),
                });
            }
            return Ok(Self {
                transform: None,
                reprojector: None,
                crs: None,
            });
        };

        let reprojector = match (&params.source_crs, &params.target_crs) {
            (_, None) => None,
            (None, Some(target)) => {
                return Err(Error::InvalidParameter {
                    name: "target_crs",
                    value: target.identifier(),
                    reason: "source CRS is unknown".into(),
                })
            }
            (Some(source), Some(target)) => {
                let t = CrsTransformer::new(source, target)?;
                (!t.is_identity()).then_some(t)
            }
        };

        Ok(Self {
            transform: Some(transform),
            reprojector,
            crs: params.target_crs.clone().or_else(|| params.source_crs.clone()),
        })
    }

    fn map(&self, c: Coord<f64>) -> Coord<f64> {
        let Some(transform) = &self.transform else {
            return c;
        };
        let (x, y) = transform.apply(c.x + 0.5, c.y + 0.5);
        let (x, y) = match &self.reprojector {
            Some(r) => r.transform(x, y),
            None => (x, y),
        };
        Coord { x, y }
    }
}

/// Ring segment tagged with its position, for the sweep-line check
#[derive(Debug, Clone)]
struct RingSegment {
    index: usize,
    line: Line<f64>,
}

impl Cross for RingSegment {
    type Scalar = f64;

    fn line(&self) -> LineOrPoint<f64> {
        self.line.into()
    }
}

/// Check that a ring is closed, finite, non-degenerate and simple.
///
/// Self-intersections are found with a Bentley-Ottmann sweep, so large
/// rings stay near `O(n log n)`.
pub fn validate_ring(ring: &LineString<f64>) -> Result<()> {
    if !ring.is_closed() || ring.0.len() < 4 {
        return Err(Error::InvalidPolygon(format!(
            "ring with {} coordinates is not closed",
            ring.0.len()
        )));
    }
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(Error::InvalidPolygon("non-finite coordinate".into()));
    }

    let n = ring.0.len() - 1;
    let adjacent = |i: usize, j: usize| i.abs_diff(j) == 1 || i.abs_diff(j) == n - 1;
    let segments = ring
        .lines()
        .enumerate()
        .map(|(index, line)| RingSegment { index, line });

    for (a, b, hit) in Intersections::<RingSegment>::from_iter(segments) {
        // neighbours always share their common vertex
        let shared_vertex = matches!(hit, LineIntersection::SinglePoint { .. });
        if adjacent(a.index, b.index) && shared_vertex {
            continue;
        }
        return Err(Error::InvalidPolygon(format!(
            "self-intersection between segments {} and {}",
            a.index.min(b.index),
            a.index.max(b.index)
        )));
    }
    Ok(())
}

fn build_polygon(
    vertices: &[Coord<f64>],
    mapper: &VertexMapper,
    simplify_tolerance: Option<f64>,
) -> Result<Polygon<f64>> {
    if vertices.len() < 3 {
        return Err(Error::InvalidPolygon(format!(
            "{} vertices cannot form a ring",
            vertices.len()
        )));
    }

    let mut coords: Vec<Coord<f64>> = vertices.iter().map(|&c| mapper.map(c)).collect();
    coords.push(coords[0]);
    let mut polygon = Polygon::new(LineString::new(coords), vec![]);

    if let Some(tolerance) = simplify_tolerance {
        polygon = polygon.simplify(&tolerance);
    }

    validate_ring(polygon.exterior())?;
    if polygon.unsigned_area() <= 0.0 {
        return Err(Error::InvalidPolygon("zero area".into()));
    }
    Ok(polygon)
}

/// Vectorize the nonzero region of `mask` into polygons.
///
/// Output order follows contour discovery order (row-major scan). Each
/// contour becomes its own polygon; holes are not nested into their
/// enclosing ring.
///
/// Contour vertices are in pixel-centre coordinates and go through the
/// transform at `(col + 0.5, row + 0.5)`. Output is therefore shifted half
/// a pixel right and down (in pixel terms) from a mapping that feeds centre
/// coordinates straight into a corner-anchored transform.
pub fn mask_to_polygons(mask: &Raster<u8>, params: &VectorizeParams) -> Result<Vec<GeoPolygon>> {
    params.validate()?;
    let mapper = VertexMapper::new(params)?;

    let contours = trace_contours(mask.view());
    let mut polygons = Vec::new();
    let mut too_small = 0usize;

    for (index, vertices) in contours.iter().enumerate() {
        let polygon = match build_polygon(vertices, &mapper, params.simplify_tolerance) {
            Ok(p) => p,
            Err(e) => {
                debug!(contour = index, error = %e, "skipping contour");
                continue;
            }
        };

        let area = polygon.unsigned_area();
        if area < params.min_area {
            too_small += 1;
            continue;
        }
        polygons.push(GeoPolygon::new(polygon, mapper.crs.clone(), area));
    }

    info!(
        contours = contours.len(),
        kept = polygons.len(),
        below_min_area = too_small,
        "vectorized change mask"
    );
    Ok(polygons)
}
