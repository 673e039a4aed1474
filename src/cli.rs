use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::{bucket::BucketSize, data, transport::DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Pull, filter and bucket NYC Open Data collections",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the field names a collection publishes in its metadata
    Columns(ColumnsArgs),
    /// Page through a collection and export the rows as CSV
    Fetch(FetchArgs),
    /// Count rows per period and borough for a dashboard
    Timeseries(TimeseriesArgs),
    /// Produce frequency counts for one column of a dashboard dataset
    Counts(CountsArgs),
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Collection URL such as https://data.cityofnewyork.us/resource/rbx6-tga4.json
    #[arg(long)]
    pub url: String,
    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl ColumnsArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Collection URL to page through
    #[arg(long, conflicts_with = "preset", required_unless_present = "preset")]
    pub url: Option<String>,
    /// Use the URL and columns of a built-in dashboard (permits, job-filings, evictions)
    #[arg(long)]
    pub preset: Option<String>,
    /// Columns to $select; the schema is consulted and absent names dropped
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Rows requested per page
    #[arg(long)]
    pub limit: Option<usize>,
    /// Stop after this many rows
    #[arg(long = "max-rows")]
    pub max_rows: Option<usize>,
    /// Sort descending by this column when the collection has it
    #[arg(long = "order-by")]
    pub order_by: Option<String>,
    /// Raw SoQL predicate sent as $where
    #[arg(long = "where", conflicts_with_all = ["since", "until"])]
    pub where_clause: Option<String>,
    /// Lower bound (inclusive) on --date-column
    #[arg(long, value_parser = parse_date, requires = "date_column")]
    pub since: Option<NaiveDate>,
    /// Upper bound (inclusive, end of day) on --date-column
    #[arg(long, value_parser = parse_date, requires = "date_column")]
    pub until: Option<NaiveDate>,
    /// Column the --since/--until range applies to
    #[arg(long = "date-column")]
    pub date_column: Option<String>,
    /// Output CSV file (stdout if omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Print the first N rows as a table instead of writing CSV
    #[arg(long)]
    pub preview: Option<usize>,
    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl FetchArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dataset selection shared by the dashboard commands.
#[derive(Debug, Args)]
pub struct DashboardArgs {
    /// Built-in dashboard (permits, job-filings, evictions)
    #[arg(long, required_unless_present = "config")]
    pub preset: Option<String>,
    /// YAML dashboard definition; takes precedence over --preset
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl DashboardArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Row selections shared by the dashboard commands. Unset axes keep every value.
#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Keep only these boroughs (comma separated names)
    #[arg(long, value_delimiter = ',')]
    pub borough: Option<Vec<String>>,
    /// Keep only these types (comma separated)
    #[arg(long = "type", value_delimiter = ',')]
    pub types: Option<Vec<String>>,
    /// Keep only these statuses (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub status: Option<Vec<String>>,
    /// Extra constraints such as `community_board=101|102`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// End of the rolling twelve-month window (defaults to the local date)
    #[arg(long, value_parser = parse_date)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct TimeseriesArgs {
    #[command(flatten)]
    pub dashboard: DashboardArgs,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Bucket size: month (MS), week (W-MON) or day (D)
    #[arg(long, value_parser = parse_bucket, default_value = "month")]
    pub bucket: BucketSize,
    /// Print the distinct values available for each filter axis
    #[arg(long = "show-options")]
    pub show_options: bool,
    /// Write the series as CSV here instead of printing a table
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

/// Value counts over the rows a dashboard keeps after dating and filtering.
#[derive(Debug, Args)]
pub struct CountsArgs {
    #[command(flatten)]
    pub dashboard: DashboardArgs,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Column to count; defaults to the dashboard's borough column
    #[arg(long)]
    pub column: Option<String>,
    /// Only show the N most frequent values
    #[arg(long)]
    pub top: Option<usize>,
}

pub fn parse_bucket(value: &str) -> Result<BucketSize, String> {
    value.parse::<BucketSize>().map_err(|err| err.to_string())
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    data::parse_naive_date(value.trim())
        .map_err(|_| format!("'{value}' is not a date (expected YYYY-MM-DD)"))
}
