//! Planar union of area members.

use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};

/// Result of [`dissolve_polygons`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dissolved {
    /// The union collapsed to a single part.
    Single(Polygon<f64>),
    /// Disjoint parts of the union, or no parts at all.
    Multi(MultiPolygon<f64>),
}

impl From<Dissolved> for Geometry<f64> {
    fn from(dissolved: Dissolved) -> Self {
        match dissolved {
            Dissolved::Single(polygon) => Self::Polygon(polygon),
            Dissolved::Multi(polygons) => Self::MultiPolygon(polygons),
        }
    }
}

/// Union every polygon into the smallest covering set of parts.
///
/// Polygons sharing boundary or area fuse together; disjoint ones remain
/// separate parts. A one-part union is flattened to a plain polygon.
///
/// # Examples
///
/// ```
/// use geo::{Area, polygon};
/// use geoweave_geometry::{Dissolved, dissolve_polygons};
///
/// let left = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
/// let right = polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)];
/// let Dissolved::Single(merged) = dissolve_polygons([left, right]) else {
///     panic!("adjacent squares fuse");
/// };
/// assert!((merged.unsigned_area() - 2.0).abs() < 1e-9);
/// ```
pub fn dissolve_polygons<I>(polygons: I) -> Dissolved
where
    I: IntoIterator<Item = Polygon<f64>>,
{
    let mut parts = polygons.into_iter();
    let Some(first) = parts.next() else {
        return Dissolved::Multi(MultiPolygon::new(Vec::new()));
    };
    let union = parts.fold(MultiPolygon::new(vec![first]), |acc, polygon| {
        acc.union(&MultiPolygon::new(vec![polygon]))
    });
    let mut pieces = union.0;
    if pieces.len() == 1 {
        if let Some(polygon) = pieces.pop() {
            return Dissolved::Single(polygon);
        }
    }
    log::debug!("dissolve produced {} disjoint part(s)", pieces.len());
    Dissolved::Multi(MultiPolygon::new(pieces))
}
