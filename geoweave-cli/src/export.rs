//! Export command implementation for the geoweave CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geoweave_core::SqlitePrimitiveStore;
use geoweave_core::geojson::to_json_string;
use geoweave_data::{ExportOptions, Exporter, MetadataField};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{ARG_DB, ARG_METADATA, ARG_OUTPUT, CliError, ENV_EXPORT_DB, fs, require_existing, runtime};

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Export every primitive that stands on its own as a GeoJSON \
                 FeatureCollection. Concurrent forks are settled before \
                 assembly, and relations are merged into single geometries.",
    about = "Export stored primitives as GeoJSON"
)]
#[ortho_config(prefix = "GEOWEAVE")]
pub(crate) struct ExportArgs {
    /// Path to the SQLite primitive store.
    #[arg(long = ARG_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) db: Option<Utf8PathBuf>,
    /// Write the collection to this file instead of standard output.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Metadata copied into properties: any of id, version, timestamp.
    #[arg(long = ARG_METADATA, value_name = "fields", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) metadata: Option<Vec<String>>,
    /// Keep polygon rings in stored order instead of rewinding them.
    #[arg(long)]
    #[serde(default)]
    pub(crate) no_rewind: bool,
}

impl ExportArgs {
    pub(crate) fn into_config(self) -> Result<ExportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExportConfig::try_from(merged)
    }
}

/// Resolved `export` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    /// Path to the SQLite store.
    pub(crate) db: Utf8PathBuf,
    /// Output file; standard output when absent.
    pub(crate) output: Option<Utf8PathBuf>,
    /// Metadata copied into properties.
    pub(crate) metadata: Vec<MetadataField>,
    /// Whether polygon rings are rewound.
    pub(crate) rewind: bool,
}

impl ExportConfig {
    pub(crate) fn options(&self) -> ExportOptions {
        ExportOptions::default()
            .with_metadata(self.metadata.iter().copied())
            .with_rewind(self.rewind)
    }
}

impl TryFrom<ExportArgs> for ExportConfig {
    type Error = CliError;

    fn try_from(args: ExportArgs) -> Result<Self, Self::Error> {
        let db = args.db.ok_or(CliError::MissingArgument {
            field: ARG_DB,
            env: ENV_EXPORT_DB,
        })?;
        let metadata = match args.metadata {
            Some(fields) => fields
                .iter()
                .filter(|field| !field.trim().is_empty())
                .map(|field| field.parse::<MetadataField>())
                .collect::<Result<Vec<_>, _>>()?,
            None => MetadataField::ALL.to_vec(),
        };
        Ok(Self {
            db,
            output: args.output,
            metadata,
            rewind: !args.no_rewind,
        })
    }
}

pub(crate) fn run_export(args: ExportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    execute_export(&config, writer)
}

pub(crate) fn execute_export(config: &ExportConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    require_existing(&config.db, ARG_DB)?;
    let store =
        SqlitePrimitiveStore::open(config.db.as_std_path()).map_err(|source| CliError::OpenStore {
            path: config.db.clone(),
            source,
        })?;
    let exporter = Exporter::new(&store, config.options());
    let collection = runtime()?.block_on(exporter.export_all())?;
    log::info!("exported {} feature(s)", collection.features.len());
    let payload = to_json_string(&collection).map_err(CliError::SerializeCollection)?;
    match &config.output {
        Some(path) => fs::write_utf8_file(path, &payload).map_err(|source| {
            CliError::WriteOutputFile {
                path: path.clone(),
                source,
            }
        }),
        None => writeln!(writer, "{payload}").map_err(CliError::WriteOutput),
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ExportConfig, CliError> {
    let merged = ExportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ExportConfig::try_from(merged)
}
