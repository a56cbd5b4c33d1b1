//! Import command implementation for the geoweave CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geoweave_core::geojson::parse_feature_collection;
use geoweave_core::{FeatureCollection, SqlitePrimitiveStore};
use geoweave_data::Importer;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CHANGESET, ARG_DB, ARG_INPUT, CliError, ENV_IMPORT_DB, ENV_IMPORT_INPUT, fs,
    require_existing, runtime,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Import a GeoJSON FeatureCollection as new nodes, ways and \
                 relations written to the store in a single batch. The \
                 store is created when it does not exist yet.",
    about = "Import GeoJSON as new primitives"
)]
#[ortho_config(prefix = "GEOWEAVE")]
pub(crate) struct ImportArgs {
    /// Path to a GeoJSON FeatureCollection.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Path to the SQLite primitive store.
    #[arg(long = ARG_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) db: Option<Utf8PathBuf>,
    /// Changeset recorded on every imported primitive.
    #[arg(long = ARG_CHANGESET, value_name = "id")]
    #[serde(default)]
    pub(crate) changeset: Option<String>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportConfig {
    /// GeoJSON input file.
    pub(crate) input: Utf8PathBuf,
    /// Path to the SQLite store.
    pub(crate) db: Utf8PathBuf,
    /// Changeset overriding the one carried by the input, if any.
    pub(crate) changeset: Option<String>,
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingPositional {
            field: ARG_INPUT,
            env: ENV_IMPORT_INPUT,
        })?;
        let db = args.db.ok_or(CliError::MissingArgument {
            field: ARG_DB,
            env: ENV_IMPORT_DB,
        })?;
        Ok(Self {
            input,
            db,
            changeset: args.changeset,
        })
    }
}

pub(crate) fn run_import(args: ImportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    execute_import(&config, writer)
}

pub(crate) fn execute_import(config: &ImportConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    require_existing(&config.input, ARG_INPUT)?;
    let mut collection = load_collection(&config.input)?;
    if config.changeset.is_some() {
        collection.changeset.clone_from(&config.changeset);
    }
    fs::ensure_parent_dir(&config.db).map_err(|source| CliError::InspectSourcePath {
        field: ARG_DB,
        path: config.db.clone(),
        source,
    })?;
    let store =
        SqlitePrimitiveStore::open(config.db.as_std_path()).map_err(|source| CliError::OpenStore {
            path: config.db.clone(),
            source,
        })?;
    let importer = Importer::new(&store);
    let report = runtime()?.block_on(importer.import_feature_collection(&collection))?;
    writeln!(
        writer,
        "imported {} feature(s) as {} primitive(s)",
        collection.features.len(),
        report.written.len()
    )
    .map_err(CliError::WriteOutput)
}

/// Read and decode a GeoJSON feature collection from disk.
pub(crate) fn load_collection(path: &Utf8Path) -> Result<FeatureCollection, CliError> {
    let text = fs::read_utf8_file(path).map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    parse_feature_collection(&text).map_err(|source| CliError::ParseInput {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportConfig::try_from(merged)
}
