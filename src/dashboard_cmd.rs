//! The `timeseries` and `counts` commands.

use anyhow::{Context, Result, anyhow};
use encoding_rs::UTF_8;
use log::info;

use crate::{
    bucket::BucketSize,
    cli::{CountsArgs, DashboardArgs, SelectionArgs, TimeseriesArgs},
    config::{self, DashboardConfig},
    filter::FilterSpec,
    frequency, io_utils,
    pipeline::{self, DashboardReport, DashboardRequest, PipelineOutcome},
    table,
    transport::HttpTransport,
};

fn load_dashboard(args: &DashboardArgs) -> Result<(DashboardConfig, HttpTransport)> {
    let config = config::resolve(args.preset.as_deref(), args.config.as_deref())?;
    let transport = HttpTransport::new(args.timeout()).context("Building HTTP client")?;
    Ok((config, transport))
}

fn build_request(selection: &SelectionArgs, bucket_size: BucketSize) -> Result<DashboardRequest> {
    Ok(DashboardRequest {
        bucket_size,
        today: selection.today,
        now: None,
        boroughs: selection.borough.clone(),
        types: selection.types.clone(),
        statuses: selection.status.clone(),
        filters: FilterSpec::parse_all(&selection.filters)?,
    })
}

/// Prints the soft outcomes; `None` means there is nothing further to show.
fn into_report(outcome: PipelineOutcome, config: &DashboardConfig) -> Option<DashboardReport> {
    match outcome {
        PipelineOutcome::NoRows => {
            println!("No rows returned from API");
            None
        }
        PipelineOutcome::NoDateColumn { available } => {
            println!(
                "No date column found among {}. Available columns: {}",
                config.date_columns.join(", "),
                available.join(", ")
            );
            None
        }
        PipelineOutcome::NoRowsInWindow { date_column } => {
            println!("No rows with a usable '{date_column}' in the selected window");
            None
        }
        PipelineOutcome::Report(report) => Some(report),
    }
}

pub fn execute_timeseries(args: &TimeseriesArgs) -> Result<()> {
    let request = build_request(&args.selection, args.bucket)?;
    let (config, transport) = load_dashboard(&args.dashboard)?;
    info!(
        "Running '{}' dashboard with {} buckets",
        config.name, request.bucket_size
    );
    let outcome = pipeline::run_dashboard(&transport, &config, &request)
        .with_context(|| format!("Fetching {}", config.url))?;
    let Some(report) = into_report(outcome, &config) else {
        return Ok(());
    };

    if args.show_options {
        for (column, values) in report.filter_options() {
            println!("{column}: {}", values.join(", "));
        }
    }
    if report.series.is_empty() {
        println!("No rows match the selected filters");
        return Ok(());
    }
    info!(
        "{} row(s) counted into {} bucket(s) by '{}'",
        report.series.total(),
        report.series.len(),
        report.date_column
    );
    let series = report.series.to_table();
    match &args.output {
        Some(path) => io_utils::export_table(&series, Some(path), UTF_8),
        None => {
            table::print_table(&series);
            Ok(())
        }
    }
}

pub fn execute_counts(args: &CountsArgs) -> Result<()> {
    let request = build_request(&args.selection, BucketSize::default())?;
    let (config, transport) = load_dashboard(&args.dashboard)?;
    let column = args
        .column
        .clone()
        .or_else(|| config.borough_column.clone())
        .ok_or_else(|| anyhow!("Provide --column; '{}' has no borough column", config.name))?;

    let outcome = pipeline::run_dashboard(&transport, &config, &request)
        .with_context(|| format!("Fetching {}", config.url))?;
    let Some(report) = into_report(outcome, &config) else {
        return Ok(());
    };
    let Some(mut counts) = pipeline::report_counts(&report, &column) else {
        return Err(anyhow!(
            "Column '{column}' not found. Available columns: {}",
            report.table.columns().join(", ")
        ));
    };
    if report.table.is_empty() {
        println!("No rows match the selected filters");
        return Ok(());
    }
    info!(
        "Counting '{column}' over {} of {} fetched row(s)",
        report.table.len(),
        report.fetched_rows
    );
    if let Some(top) = args.top {
        counts.truncate(top);
    }
    let headers = vec![column.clone(), "count".to_string(), "percent".to_string()];
    print!(
        "{}",
        table::render_table(&headers, &frequency::render_rows(&counts))
    );
    Ok(())
}
