//! Error types emitted by the geoweave CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geoweave_core::{GeoJsonError, StoreError};
use geoweave_data::{ExportError, ImportError, UnknownMetadataField};
use thiserror::Error;

/// Errors emitted by the geoweave CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A required positional argument is missing after configuration merging.
    #[error("missing {field} (pass <{field}> as an argument or set {env})")]
    MissingPositional {
        field: &'static str,
        env: &'static str,
    },
    /// A metadata field name was not recognised.
    #[error(transparent)]
    InvalidMetadata(#[from] UnknownMetadataField),
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Starting the async runtime failed.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Opening or creating the primitive store failed.
    #[error("failed to open primitive store at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// Reading the GeoJSON input failed.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The GeoJSON input could not be decoded.
    #[error("failed to parse GeoJSON in {path:?}: {source}")]
    ParseInput {
        path: Utf8PathBuf,
        #[source]
        source: GeoJsonError,
    },
    /// Exporting from the store failed.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    /// Importing into the store failed.
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    /// Serializing the exported collection failed.
    #[error("failed to serialize feature collection: {0}")]
    SerializeCollection(#[source] GeoJsonError),
    /// Writing the export to a file failed.
    #[error("failed to write {path:?}: {source}")]
    WriteOutputFile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Writing to standard output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
