//! Combine the member geometries of a relation into one geometry.
//!
//! Members of a single line or area type are merged; anything else is kept
//! verbatim inside a geometry collection.

use std::collections::BTreeSet;

use geo::{Geometry, GeometryCollection, LineString, Polygon, Validation};

use crate::{MergeError, dissolve_polygons, merge_lines};

/// Return the geometry that stands for "nothing to show".
///
/// An empty geometry collection is used so callers always receive a value.
#[must_use]
pub const fn empty_geometry() -> Geometry<f64> {
    Geometry::GeometryCollection(GeometryCollection(Vec::new()))
}

/// Return `true` when `geometry` is the [`empty_geometry`] placeholder.
#[must_use]
pub fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::GeometryCollection(collection) if collection.0.is_empty())
}

/// GeoJSON-style name of the geometry's type.
#[must_use]
pub const fn type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn line_parts(geometries: Vec<Geometry<f64>>) -> impl Iterator<Item = LineString<f64>> {
    geometries.into_iter().flat_map(|geometry| match geometry {
        Geometry::LineString(line) => vec![line],
        Geometry::MultiLineString(lines) => lines.0,
        _ => Vec::new(),
    })
}

fn polygon_parts(geometries: Vec<Geometry<f64>>) -> impl Iterator<Item = Polygon<f64>> {
    geometries.into_iter().flat_map(|geometry| match geometry {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(polygons) => polygons.0,
        _ => Vec::new(),
    })
}

fn keep_valid<G: Validation>(parts: impl Iterator<Item = G>, kind: &str) -> Vec<G> {
    parts
        .filter(|part| {
            let valid = part.is_valid();
            if !valid {
                log::debug!("dropping invalid {kind} member from merge");
            }
            valid
        })
        .collect()
}

/// Combine relation member geometries.
///
/// - no members gives [`empty_geometry`];
/// - members that are all line strings (or all multi line strings) are
///   flattened and chained with [`merge_lines`];
/// - members that are all polygons (or all multi polygons) are flattened
///   and unioned with [`dissolve_polygons`];
/// - anything else becomes a geometry collection in member order.
///
/// Invalid parts are dropped before merging. When none survive, the result
/// is [`empty_geometry`].
///
/// # Errors
///
/// Propagates [`MergeError::AmbiguousTopology`] from line merging.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, line_string, point};
/// use geoweave_geometry::combine;
///
/// let lines = vec![
///     Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
///     Geometry::LineString(line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]),
/// ];
/// assert!(matches!(combine(lines)?, Geometry::LineString(_)));
///
/// let mixed = vec![
///     Geometry::Point(point!(x: 0.0, y: 0.0)),
///     Geometry::LineString(line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]),
/// ];
/// assert!(matches!(combine(mixed)?, Geometry::GeometryCollection(gc) if gc.0.len() == 2));
/// # Ok::<(), geoweave_geometry::MergeError>(())
/// ```
pub fn combine(geometries: Vec<Geometry<f64>>) -> Result<Geometry<f64>, MergeError> {
    let kinds: BTreeSet<&'static str> = geometries.iter().map(type_name).collect();
    let mut kinds = kinds.into_iter();
    let (Some(kind), None) = (kinds.next(), kinds.next()) else {
        if geometries.is_empty() {
            return Ok(empty_geometry());
        }
        return Ok(Geometry::GeometryCollection(GeometryCollection(geometries)));
    };
    match kind {
        "LineString" | "MultiLineString" => {
            let lines = keep_valid(line_parts(geometries), kind);
            if lines.is_empty() {
                return Ok(empty_geometry());
            }
            merge_lines(lines).map(Geometry::from)
        }
        "Polygon" | "MultiPolygon" => {
            let polygons = keep_valid(polygon_parts(geometries), kind);
            if polygons.is_empty() {
                return Ok(empty_geometry());
            }
            Ok(Geometry::from(dissolve_polygons(polygons)))
        }
        _ => Ok(Geometry::GeometryCollection(GeometryCollection(geometries))),
    }
}
