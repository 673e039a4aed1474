//! Date coercion and time-window filtering.
//!
//! Public data carries plenty of malformed dates; rows whose date cannot be
//! coerced are dropped silently rather than reported.

use chrono::{Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use crate::{data::Value, paginate, table::Table};

/// Inclusive `[start, end]` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// `[today - 1 year, today]` at midnight. 29 February steps back to
    /// 28 February.
    pub fn rolling_year(today: NaiveDate) -> Self {
        let end = today.and_time(NaiveTime::MIN);
        let start = today
            .checked_sub_months(Months::new(12))
            .unwrap_or(NaiveDate::MIN)
            .and_time(NaiveTime::MIN);
        Self { start, end }
    }

    /// Rolling year ending at `today`, or at the local current date.
    pub fn trailing_year(today: Option<NaiveDate>) -> Self {
        Self::rolling_year(today.unwrap_or_else(local_today))
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// The equivalent server-side `$where` predicate.
    pub fn where_predicate(&self, column: &str) -> String {
        paginate::date_range_predicate(column, self.start, self.end)
    }
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Replaces `column` with parsed timestamps and drops rows that fail to
/// parse. `None` when the column does not exist.
pub fn coerce_dates(table: &Table, column: &str) -> Option<Table> {
    let idx = table.column_index(column)?;
    let rows = table
        .rows()
        .iter()
        .filter_map(|row| {
            let ts = row[idx].as_ref().and_then(Value::to_timestamp)?;
            let mut row = row.clone();
            row[idx] = Some(Value::DateTime(ts));
            Some(row)
        })
        .collect::<Vec<_>>();
    let dropped = table.len() - rows.len();
    if dropped > 0 {
        debug!("Dropped {dropped} row(s) with unparseable '{column}' values");
    }
    Some(Table::from_rows(table.columns().to_vec(), rows))
}

/// Rows whose `column` falls inside `window`. A table without the column
/// yields zero rows.
pub fn filter_window(table: &Table, column: &str, window: &TimeWindow) -> Table {
    let Some(coerced) = coerce_dates(table, column) else {
        return table.empty_like();
    };
    let Some(idx) = coerced.column_index(column) else {
        return table.empty_like();
    };
    coerced.filter_rows(|row| match &row[idx] {
        Some(Value::DateTime(ts)) => window.contains(*ts),
        _ => false,
    })
}

pub fn filter_last_12_months(table: &Table, column: &str, today: Option<NaiveDate>) -> Table {
    filter_window(table, column, &TimeWindow::trailing_year(today))
}
