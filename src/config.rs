//! Dashboard configuration.
//!
//! A dashboard names one dataset and the candidate columns the pipeline
//! should look for in it. Configurations are loaded from YAML or taken from
//! the built-in presets for the NYC datasets.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    bucket::DEFAULT_APPROVED_VALUES,
    cache::FetchKey,
    paginate::{self, DEFAULT_PAGE_LIMIT, PaginationOptions},
};

pub const PRESET_NAMES: [&str; 3] = ["permits", "job-filings", "evictions"];

/// Server-side `$where` restriction from `since` up to the moment of the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRange {
    pub column: String,
    pub since: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub name: String,
    pub url: String,
    /// Columns to `$select`. Empty fetches every column without schema
    /// discovery.
    pub desired_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub borough_column: Option<String>,
    pub type_columns: Vec<String>,
    pub status_columns: Vec<String>,
    pub limit: usize,
    pub max_rows: Option<usize>,
    pub order_by: Option<String>,
    pub server_range: Option<ServerRange>,
    /// Restrict rows to the trailing twelve months client-side.
    pub rolling_window: bool,
    /// Count only rows whose status is in `approved_values`.
    pub count_approved_only: bool,
    pub approved_values: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            desired_columns: Vec::new(),
            date_columns: Vec::new(),
            borough_column: Some("borough".to_string()),
            type_columns: Vec::new(),
            status_columns: Vec::new(),
            limit: DEFAULT_PAGE_LIMIT,
            max_rows: None,
            order_by: None,
            server_range: None,
            rolling_window: true,
            count_approved_only: false,
            approved_values: strings(&DEFAULT_APPROVED_VALUES),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening dashboard config {path:?}"))?;
        let config: DashboardConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing dashboard config {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("Dashboard '{}' does not define a url", self.name));
        }
        if self.date_columns.is_empty() {
            return Err(anyhow!(
                "Dashboard '{}' does not list any date columns",
                self.name
            ));
        }
        if self.limit == 0 {
            return Err(anyhow!("Dashboard '{}' has a zero page limit", self.name));
        }
        Ok(())
    }

    pub fn preset(name: &str) -> Option<Self> {
        let config = match name {
            "permits" => Self {
                name: "permits".to_string(),
                url: "https://data.cityofnewyork.us/resource/rbx6-tga4.json".to_string(),
                desired_columns: strings(&[
                    "borough",
                    "issued_date",
                    "approved_date",
                    "expired_date",
                    "work_type",
                    "permit_status",
                    "community_board",
                ]),
                date_columns: strings(&["issued_date", "approved_date", "expired_date"]),
                type_columns: strings(&["permit_type", "work_type", "job_type", "permit_subtype"]),
                status_columns: strings(&["permit_status"]),
                limit: DEFAULT_PAGE_LIMIT,
                max_rows: Some(paginate::DEFAULT_MAX_ROWS),
                order_by: Some("issued_date".to_string()),
                ..Self::default()
            },
            "job-filings" => Self {
                name: "job-filings".to_string(),
                url: "https://data.cityofnewyork.us/resource/w9ak-ipjd.json".to_string(),
                date_columns: strings(&["filing_date"]),
                type_columns: strings(&["job_type"]),
                status_columns: strings(&["filing_status"]),
                limit: paginate::SIMPLE_PAGE_LIMIT,
                server_range: Some(ServerRange {
                    column: "filing_date".to_string(),
                    since: NaiveDate::from_ymd_opt(2026, 1, 1)?,
                }),
                rolling_window: false,
                ..Self::default()
            },
            "evictions" => Self {
                name: "evictions".to_string(),
                url: "https://data.cityofnewyork.us/resource/6z8x-wfk4.json".to_string(),
                date_columns: strings(&["executed_date"]),
                type_columns: strings(&["residential_commercial_ind"]),
                limit: paginate::SIMPLE_PAGE_LIMIT,
                server_range: Some(ServerRange {
                    column: "executed_date".to_string(),
                    since: NaiveDate::from_ymd_opt(2025, 1, 1)?,
                }),
                rolling_window: false,
                ..Self::default()
            },
            _ => return None,
        };
        Some(config)
    }

    /// Paging options for a fetch happening at `now`.
    pub fn pagination_options(&self, now: NaiveDateTime) -> PaginationOptions {
        let mut options = PaginationOptions {
            limit: self.limit,
            max_rows: self.max_rows,
            order_by: self.order_by.clone(),
            where_clause: None,
        };
        if let Some(range) = &self.server_range {
            let start = range.since.and_time(NaiveTime::MIN);
            options.where_clause = Some(paginate::date_range_predicate(&range.column, start, now));
        }
        options
    }

    /// Cache key for a fetch. Without a pinned `now` the key stays stable for
    /// the lifetime of a server-side range; a pinned `now` fixes the range end
    /// and so becomes part of the key.
    pub fn cache_key(&self, pinned_now: Option<NaiveDateTime>) -> FetchKey {
        let mut options = self.pagination_options(pinned_now.unwrap_or(NaiveDateTime::MIN));
        if pinned_now.is_none() {
            options.where_clause = self
                .server_range
                .as_ref()
                .map(|range| format!("{} since {}", range.column, range.since));
        }
        FetchKey::for_fetch(&self.url, &self.desired_columns, &options)
    }
}

/// Resolves `--preset` or `--config` into a configuration.
pub fn resolve(preset: Option<&str>, path: Option<&Path>) -> Result<DashboardConfig> {
    match (preset, path) {
        (_, Some(path)) => DashboardConfig::load(path),
        (Some(name), None) => DashboardConfig::preset(name).ok_or_else(|| {
            anyhow!(
                "Unknown preset '{name}' (available: {})",
                PRESET_NAMES.join(", ")
            )
        }),
        (None, None) => Err(anyhow!("Provide --preset or --config")),
    }
}
