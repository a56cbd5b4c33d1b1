//! Planar geometry operations for assembling map primitives.
//!
//! Relations reference ways and other relations whose geometries must be
//! stitched together before they can be published as a single feature. This
//! crate provides the pieces of that stitching: chaining line segments that
//! share endpoints ([`merge_lines`]), dissolving touching areas
//! ([`dissolve_polygons`]) and choosing between the two for a relation's
//! members ([`combine`]). Ring comparison helpers ([`rings_equivalent`],
//! [`polygons_equivalent`]) check results without caring where a ring starts.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod combine;
mod dissolve;
mod equivalence;
mod line_merge;

pub use combine::{combine, empty_geometry, is_empty_geometry, type_name};
pub use dissolve::{Dissolved, dissolve_polygons};
pub use equivalence::{polygons_equivalent, rings_equivalent};
pub use line_merge::{MergeError, MergedLines, merge_lines};
