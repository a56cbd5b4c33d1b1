//! Facade crate for the geoweave engine.
//!
//! This crate re-exports the core data model, the geometry merge routines
//! and, behind feature flags, the SQLite store and the import/export layer.

#![forbid(unsafe_code)]

pub use geoweave_core::{
    AreaClassifier, Document, Element, ElementKind, Feature, FeatureCollection, GeoJsonError,
    Member, OsmPolygonRules, Primitive, PrimitiveId, PrimitiveStore, StoreError, TagFilter, Tags,
    VersionToken,
};
pub use geoweave_geometry::{MergeError, combine, dissolve_polygons, merge_lines};

#[cfg(feature = "store-sqlite")]
pub use geoweave_core::SqlitePrimitiveStore;

#[cfg(feature = "data")]
pub use geoweave_data::{
    ExportError, ExportOptions, Exporter, ImportError, ImportEvent, ImportReport, Importer,
};
