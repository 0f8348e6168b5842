//! Action execution against the configured store.
//!
//! Every action opens its own connection from `[backend]` and lets it drop
//! (and disconnect) when the action returns.

use crate::config::AppConfig;
use crate::embed::Embedder;
use crate::format::{format_ack, format_info, format_ingest, format_search, OutputMode};
use crate::parse::CliAction;
use crate::pipeline::{self, CliError};
use annlink_client::{SearchClient, UpsertClient};
use annlink_source::ImageSource;
use std::path::Path;

/// `config init`
pub fn init_config(path: &Path, mode: OutputMode) -> Result<String, CliError> {
    let message = if AppConfig::write_default_if_missing(path)? {
        format!("Wrote default config to {}", path.display())
    } else {
        format!("Config {} already exists, left unchanged", path.display())
    };
    Ok(format_ack(&message, mode))
}

/// Run a store-facing action and return its formatted output.
pub fn execute(
    action: &CliAction,
    config: &AppConfig,
    embedder: &dyn Embedder,
    mode: OutputMode,
) -> Result<String, CliError> {
    let collection = config.collection.name.as_str();

    match action {
        CliAction::ConfigInit => Ok(format_ack("Nothing to do", mode)),
        CliAction::Create { recreate } => {
            let spec = config.client().collection_spec()?;
            let conn = config.backend.connect()?;
            if *recreate {
                conn.recreate_collection(&spec)?;
            } else {
                conn.create_collection(&spec)?;
            }
            Ok(format_ack(
                &format!(
                    "Created collection \"{}\" (dim {}, {} {})",
                    spec.name, spec.dimension, spec.index.index_type, spec.index.metric_type
                ),
                mode,
            ))
        }
        CliAction::Drop => {
            let conn = config.backend.connect()?;
            conn.drop_collection(collection)?;
            Ok(format_ack(
                &format!("Dropped collection \"{}\"", collection),
                mode,
            ))
        }
        CliAction::Truncate => {
            let conn = config.backend.connect()?;
            conn.truncate_collection(collection)?;
            Ok(format_ack(
                &format!("Truncated collection \"{}\"", collection),
                mode,
            ))
        }
        CliAction::Info => {
            let conn = config.backend.connect()?;
            let mut descriptor = conn.describe_collection(collection)?;
            if descriptor.row_count.is_none() {
                descriptor.row_count = Some(conn.count(collection)?);
            }
            Ok(format_info(&descriptor, mode))
        }
        CliAction::Rebuild => {
            let conn = config.backend.connect()?;
            conn.rebuild_index(collection)?;
            Ok(format_ack(
                &format!("Rebuilt index of \"{}\"", collection),
                mode,
            ))
        }
        CliAction::Ingest { source } => {
            let writer = UpsertClient::new(config.backend.connect()?, collection)?;
            let report = pipeline::ingest(&ImageSource::from_spec(source), embedder, &writer)?;
            Ok(format_ingest(&report, mode))
        }
        CliAction::Search {
            source,
            limit,
            filter,
        } => {
            let mut overrides = config.search.to_overrides()?;
            if let Some(expr) = filter {
                overrides = overrides.filter(expr.clone());
            }
            let searcher = SearchClient::new(config.backend.connect()?, collection, overrides)?;
            let results =
                pipeline::search(&ImageSource::from_spec(source), embedder, &searcher, *limit)?;
            Ok(format_search(&results, mode))
        }
    }
}
