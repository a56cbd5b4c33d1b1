//! Core domain types for the geoweave engine.
//!
//! This crate owns the primitive data model (nodes, ways and relations with
//! their concurrent forks), the storage interface, the tag heuristics used
//! when turning primitives into features, and the GeoJSON codec.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod classify;
pub mod geojson;
mod ids;
mod model;
pub mod store;
pub mod tags;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use classify::{AreaClassifier, OsmPolygonRules, is_closed};
pub use geojson::{Feature, FeatureCollection, GeoJsonError};
pub use ids::generate_id;
pub use model::{
    Document, Element, ElementKind, Member, Primitive, PrimitiveId, Tags, VersionToken,
};
#[cfg(feature = "store-sqlite")]
pub use store::SqlitePrimitiveStore;
pub use store::{BatchOp, PrimitiveStore, StoreError};
pub use tags::{DEFAULT_UNINTERESTING_KEYS, TagFilter};
