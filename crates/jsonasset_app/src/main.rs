// SPDX-License-Identifier: MIT OR Apache-2.0
//! `jsonasset` - imports JSON asset descriptions into live object graphs
//!
//! Reads export files written by an asset inspection tool and rebuilds:
//! - Assets with every reflected property restored
//! - Material and material function expression graphs
//! - Referenced assets found in the same export directory
//!
//! ## Usage
//!
//! ```text
//! jsonasset [--settings <file.ron>] [--write-settings] <export.json>...
//! ```

mod importer;
mod settings;

use clap::Parser;
use importer::{build_registry, import_file, ImportReport};
use jsonasset_core::{ObjectArena, Severity};
use settings::{ImportSettings, SETTINGS_FILE_NAME};
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(
    name = "jsonasset",
    version,
    about = "Import JSON asset descriptions into live object graphs"
)]
struct CliArgs {
    /// Settings file (defaults to `jsonasset.ron` in the working directory)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    write_settings: bool,

    /// Export files to import
    #[arg(value_name = "EXPORT", required_unless_present = "write_settings")]
    files: Vec<PathBuf>,
}

fn print_report(report: &ImportReport) {
    for (path, type_name) in &report.imported {
        println!("imported {path} ({type_name})");
        if let Some(graph) = report.graphs.get(path) {
            println!(
                "  graph: {} nodes, {} comments, {} connections, {} parameters",
                graph.nodes, graph.comments, graph.connections, graph.parameters
            );
            for missing in &graph.missing_types {
                println!("  missing node class {missing}");
            }
        }
    }
    for path in &report.up_to_date {
        println!("up to date {path}");
    }
    for entry in &report.unsupported {
        println!("unsupported {entry}");
    }
    for diagnostic in report
        .diagnostics
        .iter()
        .filter(|d| d.severity >= Severity::Warning)
    {
        println!("{:?}: {}", diagnostic.severity, diagnostic.message);
    }
}

fn main() {
    let args = CliArgs::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME));
    let settings = match ImportSettings::load_or_default(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_directive));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting jsonasset v{}", env!("CARGO_PKG_VERSION"));

    if args.write_settings {
        if let Err(e) = settings.save(&settings_path) {
            tracing::error!("Failed to write {}: {e}", settings_path.display());
            std::process::exit(1);
        }
        tracing::info!("Wrote {}", settings_path.display());
    }

    let mut arena = ObjectArena::new(Rc::new(build_registry()));
    let mut failed = false;
    for file in &args.files {
        match import_file(&mut arena, &settings, file) {
            Ok(report) => {
                tracing::debug!(warnings = report.warnings(), "Finished {}", file.display());
                print_report(&report);
            }
            Err(e) => {
                tracing::error!("Failed to import {}: {e}", file.display());
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}
