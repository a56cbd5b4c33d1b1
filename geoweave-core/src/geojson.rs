//! GeoJSON reading and writing.
//!
//! Wire types mirror RFC 7946 and are converted into `geo` geometries at the
//! boundary so the rest of the engine never sees raw JSON.

use std::io::Write;

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::Tags;

/// A geometry with identity and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature identifier; exporters use the primitive id.
    pub id: Option<String>,
    /// Geometry, absent for features without spatial extent.
    pub geometry: Option<Geometry<f64>>,
    /// Flat string properties.
    pub properties: Tags,
}

impl Feature {
    /// Build a feature without an id.
    #[must_use]
    pub fn new(geometry: Geometry<f64>, properties: Tags) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties,
        }
    }

    /// Attach an identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// An ordered set of features plus an optional changeset identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    /// Features in document order.
    pub features: Vec<Feature>,
    /// Changeset that imported primitives are recorded under.
    pub changeset: Option<String>,
}

impl FeatureCollection {
    /// Wrap a list of features.
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            changeset: None,
        }
    }
}

/// Errors raised while decoding or encoding GeoJSON.
#[derive(Debug, Error)]
pub enum GeoJsonError {
    /// The text was not valid JSON or did not match the GeoJSON shape.
    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The top-level object was not a `FeatureCollection`.
    #[error("expected a FeatureCollection, found `{found}`")]
    NotFeatureCollection {
        /// The `type` member that was found instead.
        found: String,
    },
    /// The collection had no `features` array.
    #[error("FeatureCollection has no features array")]
    MissingFeatures,
    /// A position held fewer than two numbers.
    #[error("position must hold at least two numbers, found {found}")]
    InvalidPosition {
        /// Number of values the position held.
        found: usize,
    },
    /// Writing the encoded output failed.
    #[error("failed to write GeoJSON: {0}")]
    Io(#[from] std::io::Error),
}

type Position = Vec<f64>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireGeometry {
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<WireGeometry>,
    },
}

#[derive(Debug, Deserialize)]
struct WireFeatureIn {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<WireGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WireCollectionIn {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Option<Vec<WireFeatureIn>>,
    #[serde(default)]
    changeset: Option<Value>,
}

#[derive(Debug, Serialize)]
struct WireFeatureOut<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    geometry: Option<WireGeometry>,
    properties: &'a Tags,
}

#[derive(Debug, Serialize)]
struct WireCollectionOut<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<WireFeatureOut<'a>>,
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn properties_to_tags(properties: Option<Map<String, Value>>) -> Tags {
    properties
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| scalar_to_string(value).map(|value| (key, value)))
        .collect()
}

fn coord(position: &[f64]) -> Result<Coord<f64>, GeoJsonError> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(GeoJsonError::InvalidPosition {
            found: position.len(),
        }),
    }
}

fn line_string(positions: &[Position]) -> Result<LineString<f64>, GeoJsonError> {
    positions
        .iter()
        .map(|position| coord(position))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>, GeoJsonError> {
    let mut rings = rings
        .iter()
        .map(|ring| line_string(ring))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}

impl TryFrom<WireGeometry> for Geometry<f64> {
    type Error = GeoJsonError;

    fn try_from(wire: WireGeometry) -> Result<Self, Self::Error> {
        Ok(match wire {
            WireGeometry::Point { coordinates } => Geometry::Point(Point(coord(&coordinates)?)),
            WireGeometry::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates
                    .iter()
                    .map(|position| coord(position).map(Point))
                    .collect::<Result<_, _>>()?,
            )),
            WireGeometry::LineString { coordinates } => {
                Geometry::LineString(line_string(&coordinates)?)
            }
            WireGeometry::MultiLineString { coordinates } => {
                Geometry::MultiLineString(MultiLineString::new(
                    coordinates
                        .iter()
                        .map(|line| line_string(line))
                        .collect::<Result<_, _>>()?,
                ))
            }
            WireGeometry::Polygon { coordinates } => Geometry::Polygon(polygon(&coordinates)?),
            WireGeometry::MultiPolygon { coordinates } => {
                Geometry::MultiPolygon(MultiPolygon::new(
                    coordinates
                        .iter()
                        .map(|rings| polygon(rings))
                        .collect::<Result<_, _>>()?,
                ))
            }
            WireGeometry::GeometryCollection { geometries } => {
                Geometry::GeometryCollection(GeometryCollection(
                    geometries
                        .into_iter()
                        .map(Self::try_from)
                        .collect::<Result<_, _>>()?,
                ))
            }
        })
    }
}

fn position(coord: Coord<f64>) -> Position {
    vec![coord.x, coord.y]
}

fn positions(line: &LineString<f64>) -> Vec<Position> {
    line.0.iter().copied().map(position).collect()
}

fn rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(positions)
        .collect()
}

impl From<&Geometry<f64>> for WireGeometry {
    fn from(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(point) => Self::Point {
                coordinates: position(point.0),
            },
            Geometry::Line(line) => Self::LineString {
                coordinates: vec![position(line.start), position(line.end)],
            },
            Geometry::LineString(line) => Self::LineString {
                coordinates: positions(line),
            },
            Geometry::Polygon(poly) => Self::Polygon {
                coordinates: rings(poly),
            },
            Geometry::MultiPoint(points) => Self::MultiPoint {
                coordinates: points.0.iter().map(|p| position(p.0)).collect(),
            },
            Geometry::MultiLineString(lines) => Self::MultiLineString {
                coordinates: lines.0.iter().map(positions).collect(),
            },
            Geometry::MultiPolygon(polys) => Self::MultiPolygon {
                coordinates: polys.0.iter().map(rings).collect(),
            },
            Geometry::GeometryCollection(collection) => Self::GeometryCollection {
                geometries: collection.0.iter().map(Self::from).collect(),
            },
            Geometry::Rect(rect) => Self::Polygon {
                coordinates: rings(&rect.to_polygon()),
            },
            Geometry::Triangle(triangle) => Self::Polygon {
                coordinates: rings(&triangle.to_polygon()),
            },
        }
    }
}

/// Decode a GeoJSON `FeatureCollection`.
///
/// Non-string property values are stringified and `null` values dropped.
///
/// # Examples
///
/// ```
/// use geoweave_core::geojson::parse_feature_collection;
///
/// let text = r#"{"type":"FeatureCollection","features":[
///     {"type":"Feature","properties":{"name":"Well","level":2},
///      "geometry":{"type":"Point","coordinates":[1.5,2.5]}}]}"#;
/// let collection = parse_feature_collection(text).expect("valid GeoJSON");
/// assert_eq!(collection.features.len(), 1);
/// assert_eq!(collection.features[0].properties["level"], "2");
/// ```
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection, GeoJsonError> {
    let wire: WireCollectionIn = serde_json::from_str(text)?;
    if wire.kind != "FeatureCollection" {
        return Err(GeoJsonError::NotFeatureCollection { found: wire.kind });
    }
    let features = wire
        .features
        .ok_or(GeoJsonError::MissingFeatures)?
        .into_iter()
        .map(|feature| {
            Ok(Feature {
                id: feature.id.and_then(scalar_to_string),
                geometry: feature
                    .geometry
                    .map(Geometry::<f64>::try_from)
                    .transpose()?,
                properties: properties_to_tags(feature.properties),
            })
        })
        .collect::<Result<Vec<_>, GeoJsonError>>()?;
    Ok(FeatureCollection {
        features,
        changeset: wire.changeset.and_then(scalar_to_string),
    })
}

fn to_wire(collection: &FeatureCollection) -> WireCollectionOut<'_> {
    WireCollectionOut {
        kind: "FeatureCollection",
        features: collection
            .features
            .iter()
            .map(|feature| WireFeatureOut {
                kind: "Feature",
                id: feature.id.as_deref(),
                geometry: feature.geometry.as_ref().map(WireGeometry::from),
                properties: &feature.properties,
            })
            .collect(),
    }
}

/// Encode a collection as pretty-printed GeoJSON text.
pub fn to_json_string(collection: &FeatureCollection) -> Result<String, GeoJsonError> {
    Ok(serde_json::to_string_pretty(&to_wire(collection))?)
}

/// Encode a collection as pretty-printed GeoJSON into `writer`.
pub fn write_feature_collection<W: Write>(
    mut writer: W,
    collection: &FeatureCollection,
) -> Result<(), GeoJsonError> {
    serde_json::to_writer_pretty(&mut writer, &to_wire(collection))?;
    writer.write_all(b"\n")?;
    Ok(())
}
