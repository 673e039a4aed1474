pub mod boroughs;
pub mod bucket;
pub mod cache;
pub mod cli;
pub mod columns;
pub mod config;
pub mod dashboard_cmd;
pub mod data;
pub mod discover;
pub mod error;
pub mod fetch_cmd;
pub mod filter;
pub mod frequency;
pub mod io_utils;
pub mod paginate;
pub mod pipeline;
pub mod table;
pub mod temporal;
pub mod transport;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("soda_pull", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Parsed command line: {:?}", cli.command);
    match cli.command {
        Commands::Columns(args) => columns::execute(&args),
        Commands::Fetch(args) => fetch_cmd::execute(&args),
        Commands::Timeseries(args) => dashboard_cmd::execute_timeseries(&args),
        Commands::Counts(args) => dashboard_cmd::execute_counts(&args),
    }
}
