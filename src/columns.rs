//! Column resolution and the `columns` command.
//!
//! Dataset field names drift over time, so callers name their columns as an
//! ordered list of candidates and take the first one that is present.

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::ColumnsArgs,
    discover,
    table::{self, Table},
    transport::HttpTransport,
};

/// The first candidate that exists as a column, or `None`.
pub fn first_column<'a, S: AsRef<str>>(table: &Table, candidates: &'a [S]) -> Option<&'a str> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|candidate| table.has_column(candidate))
}

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let transport = HttpTransport::new(args.timeout()).context("Building HTTP client")?;
    let fields = discover::discover_columns(&transport, &args.url)
        .with_context(|| format!("Discovering columns for {}", args.url))?;

    if fields.is_empty() {
        info!("'{}' is not a SODA collection URL; no schema to list", args.url);
        return Ok(());
    }

    let headers = vec!["#".to_string(), "field".to_string()];
    let rows = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| vec![(idx + 1).to_string(), field.clone()])
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    info!("Listed {} field(s) for {}", fields.len(), args.url);
    Ok(())
}
