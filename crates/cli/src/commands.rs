//! Clap command tree definition.

use crate::config::CONFIG_FILE_NAME;
use clap::{value_parser, Arg, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("annlink")
        .about("Reverse image search over Milvus or Tencent Cloud VectorDB")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Config file")
                .default_value(CONFIG_FILE_NAME)
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_config())
        .subcommand(build_collection())
        .subcommand(
            Command::new("ingest")
                .about("Embed images and upsert them into the collection")
                .arg(
                    Arg::new("source")
                        .required(true)
                        .help("CSV manifest (path in column 2) or glob pattern"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Find the nearest stored images for each query image")
                .arg(
                    Arg::new("source")
                        .required(true)
                        .help("CSV manifest or glob pattern of query images"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .short('n')
                        .value_parser(value_parser!(usize))
                        .help("Results per query (default: [search] limit)"),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .help("Filter expression in the store's syntax (default: [search] filter)"),
                ),
        )
}

fn build_config() -> Command {
    Command::new("config")
        .about("Config file management")
        .subcommand_required(true)
        .subcommand(Command::new("init").about("Write a commented default config if missing"))
}

fn build_collection() -> Command {
    Command::new("collection")
        .about("Collection management")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create the configured collection and its index")
                .arg(
                    Arg::new("recreate")
                        .long("recreate")
                        .help("Drop an existing collection first")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("drop").about("Drop the configured collection"))
        .subcommand(Command::new("truncate").about("Delete every record, keeping the schema"))
        .subcommand(Command::new("info").about("Describe the configured collection"))
        .subcommand(Command::new("rebuild").about("Rebuild the vector index"))
}
