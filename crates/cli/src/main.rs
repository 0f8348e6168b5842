//! annlink CLI: reverse image search over an ANN store.
//!
//! `annlink [--config annlink.toml] [--json] <command>`
//!
//! Log verbosity follows `ANNLINK_LOG` (an `EnvFilter` directive, default
//! `warn`). Logs go to stderr so `--json` output stays parseable.

mod commands;
mod config;
mod embed;
mod format;
mod parse;
mod pipeline;
mod run;

use std::process;

use tracing_subscriber::EnvFilter;

use commands::build_cli;
use config::AppConfig;
use embed::HttpEmbedder;
use format::{format_error, OutputMode};
use parse::{config_path, matches_to_action, CliAction};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ANNLINK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() {
    init_tracing();

    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };

    process::exit(run_action(&action, &matches, mode));
}

fn run_action(action: &CliAction, matches: &clap::ArgMatches, mode: OutputMode) -> i32 {
    let path = config_path(matches);

    let result = if action.needs_config() {
        AppConfig::from_file(&path)
            .map_err(pipeline::CliError::from)
            .and_then(|config| {
                let embedder = HttpEmbedder::new(
                    &config.embedder.endpoint,
                    &config.embedder.model,
                    config.embedder.api_key.as_deref(),
                    config.embedder.timeout(),
                );
                run::execute(action, &config, &embedder, mode)
            })
    } else {
        run::init_config(&path, mode)
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            1
        }
    }
}
