//! Command-line interface for moving features between a geoweave store and
//! GeoJSON files.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand};

mod error;
mod export;
mod fs;
mod import;

pub use error::CliError;
use export::{ExportArgs, run_export};
use import::{ImportArgs, run_import};

const ARG_DB: &str = "db";
const ARG_OUTPUT: &str = "output";
const ARG_METADATA: &str = "metadata";
const ARG_INPUT: &str = "input";
const ARG_CHANGESET: &str = "changeset";
const ENV_EXPORT_DB: &str = "GEOWEAVE_CMDS_EXPORT_DB";
const ENV_IMPORT_DB: &str = "GEOWEAVE_CMDS_IMPORT_DB";
const ENV_IMPORT_INPUT: &str = "GEOWEAVE_CMDS_IMPORT_INPUT";

/// Run the geoweave CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns a [`CliError`] describing the first failure encountered.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Export(args) => run_export(args, writer),
        Command::Import(args) => run_import(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geoweave",
    about = "Move map features between a primitive store and GeoJSON",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export stored primitives as a GeoJSON FeatureCollection.
    Export(ExportArgs),
    /// Import a GeoJSON FeatureCollection as new primitives.
    Import(ImportArgs),
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
