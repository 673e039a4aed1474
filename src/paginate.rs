//! Offset pagination over SODA collection endpoints.

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value as JsonValue;

use crate::{
    discover::{self, ColumnManifest},
    error::{FetchError, FetchResult},
    table::Table,
    transport::Transport,
};

pub const DEFAULT_PAGE_LIMIT: usize = 50_000;
pub const DEFAULT_MAX_ROWS: usize = 250_000;
pub const SIMPLE_PAGE_LIMIT: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaginationOptions {
    pub limit: usize,
    pub max_rows: Option<usize>,
    pub order_by: Option<String>,
    pub where_clause: Option<String>,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self::rich()
    }
}

impl PaginationOptions {
    /// Schema-aware path: large pages, capped at 250k rows.
    pub fn rich() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            max_rows: Some(DEFAULT_MAX_ROWS),
            order_by: None,
            where_clause: None,
        }
    }

    /// Date-filtered path: small pages, no row cap.
    pub fn simple() -> Self {
        Self {
            limit: SIMPLE_PAGE_LIMIT,
            max_rows: None,
            order_by: None,
            where_clause: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn with_where(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Canonical `(name, value)` pairs, used as part of cache keys.
    pub fn key_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("limit".to_string(), self.limit.to_string()),
            (
                "max_rows".to_string(),
                self.max_rows
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            ),
        ];
        if let Some(order) = &self.order_by {
            params.push(("order_by".to_string(), order.clone()));
        }
        if let Some(predicate) = &self.where_clause {
            params.push(("where".to_string(), predicate.clone()));
        }
        params
    }
}

/// One `$limit`/`$offset` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
    pub select: Option<String>,
    pub order: Option<String>,
    pub where_clause: Option<String>,
}

impl PageRequest {
    pub fn query(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(5);
        if let Some(select) = &self.select {
            params.push(("$select".to_string(), select.clone()));
        }
        if let Some(order) = &self.order {
            params.push(("$order".to_string(), order.clone()));
        }
        if let Some(predicate) = &self.where_clause {
            params.push(("$where".to_string(), predicate.clone()));
        }
        params.push(("$limit".to_string(), self.limit.to_string()));
        params.push(("$offset".to_string(), self.offset.to_string()));
        params
    }

    /// A first page shorter than the limit ends the fetch, which is also what
    /// a server silently capping `$limit` looks like.
    pub fn is_short_first_page(&self, received: usize) -> bool {
        self.offset == 0 && received > 0 && received < self.limit
    }

    pub fn next_page(&self) -> PageRequest {
        PageRequest {
            offset: self.offset + self.limit,
            ..self.clone()
        }
    }
}

pub struct Paginator<'a, T: Transport + ?Sized> {
    transport: &'a T,
    url: &'a str,
    options: &'a PaginationOptions,
}

impl<'a, T: Transport + ?Sized> Paginator<'a, T> {
    pub fn new(transport: &'a T, url: &'a str, options: &'a PaginationOptions) -> Self {
        Self {
            transport,
            url,
            options,
        }
    }

    /// Pages until the collection is exhausted or the row cap is reached.
    ///
    /// Exhaustion is an empty page or a page shorter than the limit; a short
    /// first page is logged as a warning. When the cap is hit the
    /// accumulation is truncated to exactly `max_rows`. Any failing request
    /// aborts the whole fetch.
    pub fn collect_records(
        &self,
        select: Option<String>,
        order: Option<String>,
    ) -> FetchResult<Vec<JsonValue>> {
        if self.options.max_rows == Some(0) {
            return Ok(Vec::new());
        }
        let mut request = PageRequest {
            limit: self.options.limit.max(1),
            offset: 0,
            select,
            order,
            where_clause: self.options.where_clause.clone(),
        };
        let mut records: Vec<JsonValue> = Vec::new();

        loop {
            let page = self.fetch_page(&request)?;
            let received = page.len();
            debug!(
                "Page at offset {} of {} returned {received} record(s)",
                request.offset, self.url
            );
            if received == 0 {
                break;
            }
            records.extend(page);

            if let Some(max_rows) = self.options.max_rows
                && records.len() >= max_rows
            {
                records.truncate(max_rows);
                debug!("Row cap {max_rows} reached for {}", self.url);
                break;
            }
            if received < request.limit {
                if request.is_short_first_page(received) {
                    warn!(
                        "{} returned {received} of {} requested row(s) on its first page; \
                         treating the collection as exhausted",
                        self.url, request.limit
                    );
                }
                break;
            }
            request = request.next_page();
        }
        Ok(records)
    }

    fn fetch_page(&self, request: &PageRequest) -> FetchResult<Vec<JsonValue>> {
        match self.transport.get_json(self.url, &request.query())? {
            JsonValue::Array(items) => Ok(items),
            other => Err(FetchError::Decode {
                url: self.url.to_string(),
                message: format!("expected a JSON array page, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Phase one: discover the schema and settle the column manifest.
pub fn resolve_manifest<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    desired: &[String],
    order_by: Option<&str>,
) -> FetchResult<Option<ColumnManifest>> {
    let schema = discover::discover_columns(transport, url)?;
    Ok(ColumnManifest::resolve(&schema, desired, order_by))
}

/// Phase two: page through the collection selecting only the manifest.
pub fn fetch_manifest<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    manifest: &ColumnManifest,
    options: &PaginationOptions,
) -> FetchResult<Table> {
    let records = Paginator::new(transport, url, options)
        .collect_records(Some(manifest.select_clause()), manifest.order_clause())?;
    info!(
        "Fetched {} row(s) from {url} selecting [{}]",
        records.len(),
        manifest.select_clause()
    );
    Ok(Table::from_records(&records))
}

/// Schema-aware fetch. An unknown or empty schema yields an empty table.
pub fn fetch_paginated<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    desired: &[String],
    options: &PaginationOptions,
) -> FetchResult<Table> {
    match resolve_manifest(transport, url, desired, options.order_by.as_deref())? {
        Some(manifest) => fetch_manifest(transport, url, &manifest, options),
        None => {
            info!("No schema available for {url}; returning an empty table");
            Ok(Table::default())
        }
    }
}

/// Fetches every column without schema discovery. `order_by` and the
/// `$where` predicate are sent verbatim.
pub fn fetch_all<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    options: &PaginationOptions,
) -> FetchResult<Table> {
    let order = options.order_by.as_ref().map(|col| format!("{col} DESC"));
    let records = Paginator::new(transport, url, options).collect_records(None, order)?;
    info!("Fetched {} row(s) from {url}", records.len());
    Ok(Table::from_records(&records))
}

/// `"<col> >= '<start>' AND <col> <= '<end>'"` with floating ISO timestamps.
pub fn date_range_predicate(column: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
    const ISO: &str = "%Y-%m-%dT%H:%M:%S";
    format!(
        "{column} >= '{}' AND {column} <= '{}'",
        start.format(ISO),
        end.format(ISO)
    )
}

/// One dataset to fetch as part of [`fetch_many`]. An empty `desired` list
/// takes the schema-free [`fetch_all`] path.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub url: String,
    pub desired: Vec<String>,
    pub options: PaginationOptions,
}

/// Fetches independent datasets in parallel, one worker per job. Results are
/// returned in job order; one failing job does not affect the others.
pub fn fetch_many<T: Transport + ?Sized>(transport: &T, jobs: &[FetchJob]) -> Vec<FetchResult<Table>> {
    jobs.par_iter()
        .map(|job| {
            if job.desired.is_empty() {
                fetch_all(transport, &job.url, &job.options)
            } else {
                fetch_paginated(transport, &job.url, &job.desired, &job.options)
            }
        })
        .collect()
}
