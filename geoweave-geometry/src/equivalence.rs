//! Compare rings and polygons up to rotation of their vertex sequence.
//!
//! A ring's closing coordinate is ignored, so `[a, b, c, a]` and
//! `[b, c, a, b]` describe the same boundary. Direction matters.

use geo::{Coord, LineString, Polygon};

fn open_ring(ring: &LineString<f64>) -> &[Coord<f64>] {
    let coords = ring.0.as_slice();
    match coords.split_last() {
        Some((last, body)) if coords.len() > 1 && coords.first() == Some(last) => body,
        _ => coords,
    }
}

fn is_rotation(lhs: &[Coord<f64>], rhs: &[Coord<f64>]) -> bool {
    if lhs.len() != rhs.len() {
        return false;
    }
    if lhs.is_empty() {
        return true;
    }
    (0..lhs.len()).any(|offset| {
        lhs.iter()
            .cycle()
            .skip(offset)
            .zip(rhs)
            .all(|(a, b)| a == b)
    })
}

/// Return `true` when both rings visit the same vertices in the same cyclic
/// order, whichever vertex they start from.
///
/// # Examples
///
/// ```
/// use geo::line_string;
/// use geoweave_geometry::rings_equivalent;
///
/// let a = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
/// let b = line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
/// assert!(rings_equivalent(&a, &b));
/// ```
#[must_use]
pub fn rings_equivalent(lhs: &LineString<f64>, rhs: &LineString<f64>) -> bool {
    is_rotation(open_ring(lhs), open_ring(rhs))
}

/// Return `true` when exteriors and interiors are pairwise equivalent rings.
#[must_use]
pub fn polygons_equivalent(lhs: &Polygon<f64>, rhs: &Polygon<f64>) -> bool {
    rings_equivalent(lhs.exterior(), rhs.exterior())
        && lhs.interiors().len() == rhs.interiors().len()
        && lhs
            .interiors()
            .iter()
            .zip(rhs.interiors())
            .all(|(a, b)| rings_equivalent(a, b))
}
