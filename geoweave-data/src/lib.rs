//! Move features between a versioned primitive store and GeoJSON.
//!
//! The export side reads stored primitives, settles concurrent forks, and
//! assembles the geometry each primitive stands for. The import side turns
//! a feature collection into fresh primitives written as one batch.
//!
//! Responsibilities:
//! - Pick the winning fork of a primitive ([`select_fork`], [`resolve`]).
//! - Assemble nodes, ways, and relations into geometry ([`Assembler`]).
//! - Decide which primitives stand alone as features ([`EmissionFilter`]).
//! - Export feature collections ([`Exporter`]) and import them
//!   ([`Importer`]).
//!
//! Boundaries:
//! - Storage is reached only through [`geoweave_core::PrimitiveStore`].
//! - Line merging and polygon union live in `geoweave-geometry`.
//! - No bytes are read from or written to disk here; callers hand over
//!   parsed collections or JSON text.
//!
//! Invariants:
//! - Deleted forks never take part in assembly or export.
//! - Reference cycles between relations end assembly of the repeated
//!   member instead of recursing forever.
//! - At most one import runs per [`Importer`] at a time.

#![forbid(unsafe_code)]

mod assemble;
mod emit;
mod export;
mod import;
mod resolve;

pub use assemble::{AssembleError, Assembler};
pub use emit::{DEFAULT_REFERRER_CONCURRENCY, EmissionFilter};
pub use export::{
    DEFAULT_EXPORT_CONCURRENCY, ExportError, ExportOptions, Exporter, MetadataField,
    UnknownMetadataField,
};
pub use import::{ImportError, ImportEvent, ImportReport, Importer, InvalidImportInput};
pub use resolve::{resolve, select_fork};
