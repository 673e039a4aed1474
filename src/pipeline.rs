//! The dashboard pipeline.
//!
//! fetch → pick date column → map borough codes → time window → categorical
//! filters → bucketize. Soft conditions end the pipeline with an explicit
//! [`PipelineOutcome`] instead of an empty table.

use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{info, warn};

use crate::{
    boroughs,
    bucket::{self, BucketOptions, BucketSize, TimeSeries},
    cache::FetchCache,
    columns::first_column,
    config::DashboardConfig,
    error::FetchResult,
    filter::{self, FilterSpec},
    frequency, paginate,
    table::Table,
    temporal,
    transport::Transport,
};

/// Caller choices for one pipeline run. `None` selections mean "everything".
#[derive(Debug, Clone, Default)]
pub struct DashboardRequest {
    pub bucket_size: BucketSize,
    /// Overrides the end of the rolling window.
    pub today: Option<NaiveDate>,
    /// Overrides the end of a server-side date range.
    pub now: Option<NaiveDateTime>,
    pub boroughs: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    /// Extra constraints on arbitrary columns.
    pub filters: FilterSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardReport {
    pub fetched_rows: usize,
    pub date_column: String,
    pub borough_column: Option<String>,
    pub type_column: Option<String>,
    pub status_column: Option<String>,
    /// Rows left after the window and categorical filters.
    pub table: Table,
    pub series: TimeSeries,
}

impl DashboardReport {
    /// Distinct values offered for each filter axis, as the dashboards list
    /// them in their selectors.
    pub fn filter_options(&self) -> Vec<(String, Vec<String>)> {
        [&self.borough_column, &self.type_column, &self.status_column]
            .into_iter()
            .flatten()
            .map(|column| (column.clone(), filter::distinct_values(&self.table, column)))
            .collect()
    }
}

/// Frequencies of `column` over the rows the report kept, so undated rows and
/// unselected values never count. `None` when the column is absent.
pub fn report_counts(report: &DashboardReport, column: &str) -> Option<Vec<(String, usize)>> {
    report
        .table
        .has_column(column)
        .then(|| frequency::value_counts(&report.table, column))
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The API returned no rows at all.
    NoRows,
    /// None of the configured date columns exist.
    NoDateColumn { available: Vec<String> },
    /// Rows exist, but none carry a usable date inside the window.
    NoRowsInWindow { date_column: String },
    Report(DashboardReport),
}

pub fn fetch_table<T: Transport + ?Sized>(
    transport: &T,
    config: &DashboardConfig,
    now: NaiveDateTime,
) -> FetchResult<Table> {
    let options = config.pagination_options(now);
    if config.desired_columns.is_empty() {
        paginate::fetch_all(transport, &config.url, &options)
    } else {
        paginate::fetch_paginated(transport, &config.url, &config.desired_columns, &options)
    }
}

pub fn run_dashboard<T: Transport + ?Sized>(
    transport: &T,
    config: &DashboardConfig,
    request: &DashboardRequest,
) -> FetchResult<PipelineOutcome> {
    let now = request.now.unwrap_or_else(|| Local::now().naive_local());
    let table = fetch_table(transport, config, now)?;
    Ok(transform(&table, config, request))
}

/// Same as [`run_dashboard`], but serves the fetch from `cache` while fresh.
pub fn run_dashboard_cached<T: Transport + ?Sized>(
    transport: &T,
    cache: &mut FetchCache,
    config: &DashboardConfig,
    request: &DashboardRequest,
) -> FetchResult<PipelineOutcome> {
    let now = request.now.unwrap_or_else(|| Local::now().naive_local());
    let key = config.cache_key(request.now);
    let table = cache.get_or_fetch(key, || fetch_table(transport, config, now))?;
    Ok(transform(&table, config, request))
}

/// Everything after the fetch. Pure.
pub fn transform(
    table: &Table,
    config: &DashboardConfig,
    request: &DashboardRequest,
) -> PipelineOutcome {
    if table.is_empty() {
        return PipelineOutcome::NoRows;
    }
    let fetched_rows = table.len();

    let Some(date_column) = first_column(table, &config.date_columns).map(str::to_string) else {
        warn!(
            "None of {:?} found; columns are {:?}",
            config.date_columns,
            table.columns()
        );
        return PipelineOutcome::NoDateColumn {
            available: table.columns().to_vec(),
        };
    };

    let mapped = match &config.borough_column {
        Some(column) => boroughs::map_borough(table, column),
        None => table.clone(),
    };

    let windowed = if config.rolling_window {
        temporal::filter_last_12_months(&mapped, &date_column, request.today)
    } else {
        temporal::coerce_dates(&mapped, &date_column).unwrap_or_else(|| mapped.empty_like())
    };
    if windowed.is_empty() {
        return PipelineOutcome::NoRowsInWindow { date_column };
    }
    info!(
        "{} of {fetched_rows} row(s) usable with date column '{date_column}'",
        windowed.len()
    );

    let borough_column = config
        .borough_column
        .as_deref()
        .filter(|column| windowed.has_column(column))
        .map(str::to_string);
    let type_column = first_column(&windowed, &config.type_columns).map(str::to_string);
    let status_column = first_column(&windowed, &config.status_columns).map(str::to_string);

    let mut spec = FilterSpec::new()
        .with_optional(borough_column.as_deref(), request.boroughs.clone())
        .with_optional(type_column.as_deref(), request.types.clone())
        .with_optional(status_column.as_deref(), request.statuses.clone());
    spec.conditions
        .extend(request.filters.conditions.iter().cloned());
    let filtered = filter::apply_filters(&windowed, &spec);

    let mut options = BucketOptions::new(request.bucket_size);
    options.approved_values = config.approved_values.clone();
    if config.count_approved_only {
        options.status_column = status_column.clone();
    }
    let group_column = borough_column.as_deref().unwrap_or("borough");
    let series = bucket::bucketize(&filtered, &date_column, group_column, &options);

    PipelineOutcome::Report(DashboardReport {
        fetched_rows,
        date_column,
        borough_column,
        type_column,
        status_column,
        table: filtered,
        series,
    })
}
