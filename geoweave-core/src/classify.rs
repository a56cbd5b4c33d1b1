//! Decide whether a closed node sequence describes an area.
//!
//! The default rules follow the community-maintained OSM polygon feature
//! table: some keys always make a closed way an area, some only for listed
//! values, and some for every value except a listed few.

use geo::Coord;

use crate::Tags;

/// Classifies a resolved coordinate sequence as an area or a line.
pub trait AreaClassifier: Send + Sync {
    /// Return `true` when `coords` with `tags` should become a polygon ring.
    fn is_area(&self, coords: &[Coord<f64>], tags: &Tags) -> bool;
}

impl<F> AreaClassifier for F
where
    F: Fn(&[Coord<f64>], &Tags) -> bool + Send + Sync,
{
    fn is_area(&self, coords: &[Coord<f64>], tags: &Tags) -> bool {
        self(coords, tags)
    }
}

/// Return `true` when the first and last coordinates are identical.
#[must_use]
pub fn is_closed(coords: &[Coord<f64>]) -> bool {
    match (coords.first(), coords.last()) {
        (Some(first), Some(last)) => first == last,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
enum PolygonRule {
    All,
    Whitelist(&'static [&'static str]),
    Blacklist(&'static [&'static str]),
}

impl PolygonRule {
    fn accepts(self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Whitelist(values) => values.contains(&value),
            Self::Blacklist(values) => !values.contains(&value),
        }
    }
}

const POLYGON_FEATURES: &[(&str, PolygonRule)] = &[
    ("building", PolygonRule::All),
    (
        "highway",
        PolygonRule::Whitelist(&["services", "rest_area", "escape", "elevator"]),
    ),
    (
        "natural",
        PolygonRule::Blacklist(&["coastline", "cliff", "ridge", "arete", "tree_row"]),
    ),
    ("landuse", PolygonRule::All),
    (
        "waterway",
        PolygonRule::Whitelist(&["riverbank", "dock", "boatyard", "dam"]),
    ),
    ("amenity", PolygonRule::All),
    ("leisure", PolygonRule::All),
    (
        "barrier",
        PolygonRule::Whitelist(&[
            "city_wall",
            "ditch",
            "hedge",
            "retaining_wall",
            "wall",
            "spikes",
        ]),
    ),
    (
        "railway",
        PolygonRule::Whitelist(&["station", "turntable", "roundhouse", "platform"]),
    ),
    ("area", PolygonRule::All),
    ("boundary", PolygonRule::All),
    (
        "man_made",
        PolygonRule::Blacklist(&["cutline", "embankment", "pipeline"]),
    ),
    (
        "power",
        PolygonRule::Whitelist(&["plant", "substation", "generator", "transformer"]),
    ),
    ("place", PolygonRule::All),
    ("shop", PolygonRule::All),
    ("aeroway", PolygonRule::Blacklist(&["taxiway"])),
    ("tourism", PolygonRule::All),
    ("historic", PolygonRule::All),
    ("public_transport", PolygonRule::All),
    ("office", PolygonRule::All),
    ("building:part", PolygonRule::All),
    ("military", PolygonRule::All),
    ("ruins", PolygonRule::All),
    ("area:highway", PolygonRule::All),
    ("craft", PolygonRule::All),
    ("golf", PolygonRule::All),
    ("indoor", PolygonRule::All),
];

fn rule_for(key: &str) -> Option<PolygonRule> {
    POLYGON_FEATURES
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, rule)| *rule)
}

/// Default classifier built on the OSM polygon feature table.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geoweave_core::{AreaClassifier, OsmPolygonRules, Tags};
///
/// let ring = [
///     Coord { x: 0.0, y: 0.0 },
///     Coord { x: 1.0, y: 0.0 },
///     Coord { x: 0.0, y: 1.0 },
///     Coord { x: 0.0, y: 0.0 },
/// ];
/// let mut tags = Tags::new();
/// tags.insert("building".into(), "yes".into());
/// assert!(OsmPolygonRules.is_area(&ring, &tags));
///
/// tags.insert("area".into(), "no".into());
/// assert!(!OsmPolygonRules.is_area(&ring, &tags));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct OsmPolygonRules;

impl AreaClassifier for OsmPolygonRules {
    fn is_area(&self, coords: &[Coord<f64>], tags: &Tags) -> bool {
        if !is_closed(coords) {
            return false;
        }
        if tags.get("area").is_some_and(|value| value == "no") {
            return false;
        }
        tags.iter().any(|(key, value)| {
            value != "no" && rule_for(key).is_some_and(|rule| rule.accepts(value))
        })
    }
}
