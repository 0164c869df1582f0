//! GeoJSON import and export of [`DataSet`]s.
//!
//! Features are `LineString`s, closed features `Polygon`s (outer ring only)
//! and group spots `MultiPoint`s. Random spots are written as one
//! `MultiPoint` with `feature_type` set to `"spots"`. Properties carry
//! `feature_type`, `user_tag`, `feature_id` and `guid`.

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue, Value};
use uuid::Uuid;

use crate::dataset::{DataFeature, DataSet};
use crate::error::{Result, TinError};
use crate::geometry::Point3;
use crate::store::FeatureType;

use super::{read_to_string, write_string};

const SPOTS: &str = "spots";

pub fn read_geojson_dataset(path: &str) -> Result<DataSet> {
    parse_geojson_dataset(&read_to_string(path)?)
}

pub fn parse_geojson_dataset(text: &str) -> Result<DataSet> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| TinError::Parse(e.to_string()))?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => FeatureCollection {
            bbox: None,
            features: vec![f],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(TinError::Parse("expected a Feature or FeatureCollection".into()))
        }
    };
    let mut data = DataSet::new();
    for (i, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let kind = feature.property("feature_type").and_then(JsonValue::as_str);
        let points = match &geometry.value {
            Value::Point(p) => vec![position(p)?],
            Value::MultiPoint(ps) | Value::LineString(ps) => positions(ps)?,
            Value::Polygon(rings) => match rings.first() {
                Some(outer) => positions(outer)?,
                None => continue,
            },
            _ => {
                return Err(TinError::Parse(format!(
                    "feature {i}: unsupported geometry type"
                )))
            }
        };
        if kind == Some(SPOTS) {
            data.points.extend(points);
            continue;
        }
        let feature_type = match kind {
            Some(name) => name
                .parse::<FeatureType>()
                .map_err(|e| TinError::Parse(format!("feature {i}: {e}")))?,
            None => match &geometry.value {
                Value::Polygon(_) => FeatureType::Polygon,
                Value::Point(_) | Value::MultiPoint(_) => FeatureType::GroupSpots,
                _ => FeatureType::Breakline,
            },
        };
        let mut out = DataFeature::new(feature_type, points);
        out.user_tag = feature.property("user_tag").and_then(JsonValue::as_i64);
        out.feature_id = feature.property("feature_id").and_then(JsonValue::as_i64);
        if let Some(guid) = feature
            .property("guid")
            .and_then(JsonValue::as_str)
            .and_then(|g| Uuid::parse_str(g).ok())
        {
            out.guid = guid;
        }
        data.add_feature(out);
    }
    Ok(data)
}

fn position(p: &[f64]) -> Result<Point3> {
    match p {
        [x, y] => Ok(Point3::new(*x, *y, 0.0)),
        [x, y, z, ..] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(TinError::Parse("position needs at least two values".into())),
    }
}

fn positions(ps: &[Vec<f64>]) -> Result<Vec<Point3>> {
    ps.iter().map(|p| position(p)).collect()
}

fn coords(points: &[Point3]) -> Vec<Vec<f64>> {
    points.iter().map(|p| vec![p.x, p.y, p.z]).collect()
}

pub fn write_geojson_dataset(path: &str, data: &DataSet) -> Result<()> {
    write_string(path, &geojson_dataset_string(data))?;
    Ok(())
}

pub fn geojson_dataset_string(data: &DataSet) -> String {
    let mut features = Vec::new();
    if !data.points.is_empty() {
        let mut properties = JsonObject::new();
        properties.insert("feature_type".into(), JsonValue::from(SPOTS));
        features.push(feature(Value::MultiPoint(coords(&data.points)), properties));
    }
    for f in &data.features {
        let value = if f.feature_type == FeatureType::GroupSpots {
            Value::MultiPoint(coords(&f.points))
        } else if f.is_closed() {
            Value::Polygon(vec![coords(&f.points)])
        } else {
            Value::LineString(coords(&f.points))
        };
        let mut properties = JsonObject::new();
        properties.insert("feature_type".into(), JsonValue::from(f.feature_type.name()));
        if let Some(tag) = f.user_tag {
            properties.insert("user_tag".into(), JsonValue::from(tag));
        }
        if let Some(id) = f.feature_id {
            properties.insert("feature_id".into(), JsonValue::from(id));
        }
        properties.insert("guid".into(), JsonValue::from(f.guid.to_string()));
        features.push(feature(value, properties));
    }
    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
    .to_string()
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
