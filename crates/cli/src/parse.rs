//! ArgMatches → CliAction conversion.

use clap::ArgMatches;
use std::path::PathBuf;

/// The result of parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// `config init`
    ConfigInit,
    /// `collection create [--recreate]`
    Create { recreate: bool },
    /// `collection drop`
    Drop,
    /// `collection truncate`
    Truncate,
    /// `collection info`
    Info,
    /// `collection rebuild`
    Rebuild,
    /// `ingest <SRC>`
    Ingest { source: String },
    /// `search <SRC> [--limit N] [--filter EXPR]`
    Search {
        source: String,
        limit: Option<usize>,
        filter: Option<String>,
    },
}

impl CliAction {
    /// Whether the action needs a config file to exist
    pub fn needs_config(&self) -> bool {
        !matches!(self, CliAction::ConfigInit)
    }
}

/// Config path given by `--config`
pub fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(crate::config::CONFIG_FILE_NAME))
}

fn source_arg(matches: &ArgMatches) -> Result<String, String> {
    matches
        .get_one::<String>("source")
        .cloned()
        .ok_or_else(|| "missing image source".to_string())
}

/// Convert clap matches to an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("config", sub)) => match sub.subcommand() {
            Some(("init", _)) => Ok(CliAction::ConfigInit),
            _ => Err("unknown config subcommand".to_string()),
        },
        Some(("collection", sub)) => match sub.subcommand() {
            Some(("create", m)) => Ok(CliAction::Create {
                recreate: m.get_flag("recreate"),
            }),
            Some(("drop", _)) => Ok(CliAction::Drop),
            Some(("truncate", _)) => Ok(CliAction::Truncate),
            Some(("info", _)) => Ok(CliAction::Info),
            Some(("rebuild", _)) => Ok(CliAction::Rebuild),
            _ => Err("unknown collection subcommand".to_string()),
        },
        Some(("ingest", m)) => Ok(CliAction::Ingest {
            source: source_arg(m)?,
        }),
        Some(("search", m)) => Ok(CliAction::Search {
            source: source_arg(m)?,
            limit: m.get_one::<usize>("limit").copied(),
            filter: m.get_one::<String>("filter").cloned(),
        }),
        Some((other, _)) => Err(format!("unknown command '{}'", other)),
        None => Err("no command given".to_string()),
    }
}
