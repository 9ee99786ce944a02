//! GeoJSON (RFC 7946) serialization of feature collections

use super::{Feature, FeatureCollection};
use crate::error::{Error, Result};
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn polygon_rings(p: &Polygon<f64>) -> Value {
    let mut rings = vec![ring(p.exterior())];
    rings.extend(p.interiors().iter().map(ring));
    Value::Array(rings)
}

fn geometry_to_json(geom: &Geometry<f64>) -> Result<Value> {
    let value = match geom {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": position(&p.0) }),
        Geometry::LineString(ls) => json!({ "type": "LineString", "coordinates": ring(ls) }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_rings(p) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_rings).collect::<Vec<_>>(),
        }),
        _ => {
            return Err(Error::UnsupportedDataType(
                "GeoJSON export supports Point, LineString, Polygon and MultiPolygon".into(),
            ))
        }
    };
    Ok(value)
}

fn feature_to_json(feature: &Feature) -> Result<Value> {
    let geometry = match &feature.geometry {
        Some(g) => geometry_to_json(g)?,
        None => Value::Null,
    };
    let properties =
        serde_json::to_value(&feature.properties).map_err(|e| Error::Other(e.to_string()))?;

    let mut obj = Map::new();
    obj.insert("type".into(), json!("Feature"));
    if let Some(id) = &feature.id {
        obj.insert("id".into(), json!(id));
    }
    obj.insert("geometry".into(), geometry);
    obj.insert("properties".into(), properties);
    Ok(Value::Object(obj))
}

/// Build a GeoJSON `FeatureCollection` object.
///
/// A known EPSG code is recorded with the legacy named-CRS member, since
/// projected output (e.g. EPSG:25832) is not WGS84 as RFC 7946 assumes.
pub fn feature_collection_to_geojson(collection: &FeatureCollection) -> Result<Value> {
    let features = collection
        .iter()
        .map(feature_to_json)
        .collect::<Result<Vec<_>>>()?;

    let mut obj = Map::new();
    obj.insert("type".into(), json!("FeatureCollection"));
    if let Some(code) = collection.crs.as_ref().and_then(|c| c.epsg()) {
        obj.insert(
            "crs".into(),
            json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{code}") },
            }),
        );
    }
    obj.insert("features".into(), Value::Array(features));
    Ok(Value::Object(obj))
}

/// Write a feature collection as pretty-printed GeoJSON.
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let value = feature_collection_to_geojson(collection)?;
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, &value).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::vector::GeoPolygon;

    fn square(x0: f64, size: f64) -> GeoPolygon {
        let ring = LineString::from(vec![
            (x0, 0.0),
            (x0 + size, 0.0),
            (x0 + size, size),
            (x0, size),
            (x0, 0.0),
        ]);
        GeoPolygon::new(
            Polygon::new(ring, vec![]),
            Some(CRS::etrs89_utm32n()),
            size * size,
        )
    }

    #[test]
    fn polygons_become_features() {
        let collection = FeatureCollection::from_polygons(&[square(0.0, 2.0), square(10.0, 3.0)]);
        let json = feature_collection_to_geojson(&collection).unwrap();

        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(
            json["crs"]["properties"]["name"],
            "urn:ogc:def:crs:EPSG::25832"
        );
        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1]["id"], "1");
        assert_eq!(features[1]["properties"]["area"], 9.0);
        assert_eq!(features[1]["geometry"]["type"], "Polygon");
        assert_eq!(features[0]["geometry"]["coordinates"][0][1], json!([2.0, 0.0]));
    }

    #[test]
    fn empty_collection_has_no_crs() {
        let json = feature_collection_to_geojson(&FeatureCollection::new()).unwrap();
        assert!(json.get("crs").is_none());
        assert_eq!(json["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.geojson");
        write_geojson(&FeatureCollection::from_polygons(&[square(0.0, 1.0)]), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["features"][0]["properties"]["id"], 0);
    }
}
