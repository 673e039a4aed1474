//! Time-bucketed counts per category.
//!
//! [`bucketize`] turns a table of dated records into a sparse series with one
//! row per non-empty `(period, group)` pair, sorted by period then group.

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};
use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use itertools::Itertools;
use log::debug;

use crate::{data::Value, table::Table, temporal};

pub const PERIOD_COLUMN: &str = "Period";
pub const GROUP_COLUMN: &str = "Group";
pub const COUNT_COLUMN: &str = "Count";

pub const DEFAULT_APPROVED_VALUES: [&str; 2] = ["APPROVED", "ISSUED"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BucketSize {
    /// Calendar month, labelled by its first day (`MS`).
    #[default]
    Month,
    /// Week starting Monday (`W-MON`).
    Week,
    /// Calendar day (`D`).
    Day,
}

impl BucketSize {
    pub fn code(&self) -> &'static str {
        match self {
            BucketSize::Month => "MS",
            BucketSize::Week => "W-MON",
            BucketSize::Day => "D",
        }
    }

    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            BucketSize::Month => date.with_day(1).unwrap_or(date),
            BucketSize::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .unwrap_or(date),
            BucketSize::Day => date,
        }
    }
}

impl FromStr for BucketSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "month" | "monthly" => Ok(BucketSize::Month),
            "w-mon" | "week" | "weekly" => Ok(BucketSize::Week),
            "d" | "day" | "daily" => Ok(BucketSize::Day),
            other => Err(anyhow!(
                "Unknown bucket '{other}' (expected monthly, weekly, daily or MS, W-MON, D)"
            )),
        }
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketOptions {
    pub bucket_size: BucketSize,
    pub status_column: Option<String>,
    pub approved_values: Vec<String>,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            bucket_size: BucketSize::Month,
            status_column: None,
            approved_values: DEFAULT_APPROVED_VALUES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl BucketOptions {
    pub fn new(bucket_size: BucketSize) -> Self {
        Self {
            bucket_size,
            ..Self::default()
        }
    }

    pub fn with_status<I, S>(mut self, column: impl Into<String>, approved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status_column = Some(column.into());
        self.approved_values = approved.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSeriesRow {
    pub period: NaiveDate,
    pub group: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSeries {
    pub rows: Vec<TimeSeriesRow>,
}

impl TimeSeries {
    pub fn header() -> [&'static str; 3] {
        [PERIOD_COLUMN, GROUP_COLUMN, COUNT_COLUMN]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.count).collect()
    }

    /// Re-labels every period to its bucket and sums counts that collide.
    /// Applying the bucket size the series was built with changes nothing.
    pub fn rebucket(&self, bucket_size: BucketSize) -> TimeSeries {
        let rows = self
            .rows
            .iter()
            .map(|row| ((bucket_size.bucket_start(row.period), row.group.clone()), row.count))
            .into_grouping_map()
            .sum();
        Self::from_counts(rows)
    }

    fn from_counts<I>(counts: I) -> TimeSeries
    where
        I: IntoIterator<Item = ((NaiveDate, String), usize)>,
    {
        let rows = counts
            .into_iter()
            .map(|((period, group), count)| TimeSeriesRow {
                period,
                group,
                count,
            })
            .sorted()
            .collect();
        TimeSeries { rows }
    }

    pub fn to_table(&self) -> Table {
        let columns = Self::header().iter().map(|c| c.to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                vec![
                    Some(Value::DateTime(row.period.and_time(NaiveTime::MIN))),
                    Some(Value::String(row.group.clone())),
                    Some(Value::Integer(row.count as i64)),
                ]
            })
            .collect();
        Table::from_rows(columns, rows)
    }
}

/// Counts rows per `(bucket(date_column), group_column)`.
///
/// Missing date or group columns give an empty series. Rows with an
/// unparseable date or a null group are dropped. When `status_column` is set
/// and present, only rows whose upper-cased status is among the upper-cased
/// approved values are counted.
pub fn bucketize(
    table: &Table,
    date_column: &str,
    group_column: &str,
    options: &BucketOptions,
) -> TimeSeries {
    if !table.has_column(group_column) {
        debug!("Group column '{group_column}' missing; empty series");
        return TimeSeries::default();
    }
    let Some(coerced) = temporal::coerce_dates(table, date_column) else {
        debug!("Date column '{date_column}' missing; empty series");
        return TimeSeries::default();
    };

    let (Some(date_idx), Some(group_idx)) = (
        coerced.column_index(date_column),
        coerced.column_index(group_column),
    ) else {
        return TimeSeries::default();
    };

    let status = options
        .status_column
        .as_deref()
        .and_then(|column| coerced.column_index(column))
        .map(|idx| {
            let approved = options
                .approved_values
                .iter()
                .map(|v| v.to_uppercase())
                .collect::<Vec<_>>();
            (idx, approved)
        });

    let counts = coerced
        .rows()
        .iter()
        .filter(|row| match &status {
            Some((idx, approved)) => row[*idx]
                .as_ref()
                .is_some_and(|v| approved.contains(&v.as_display().to_uppercase())),
            None => true,
        })
        .filter_map(|row| {
            let Some(Value::DateTime(ts)) = &row[date_idx] else {
                return None;
            };
            let group = row[group_idx].as_ref()?.as_display();
            Some((options.bucket_size.bucket_start(ts.date()), group))
        })
        .counts();

    TimeSeries::from_counts(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn bucket_start_follows_calendar_rules() {
        // 2026-01-07 is a Wednesday.
        let wed = date(2026, 1, 7);
        assert_eq!(BucketSize::Month.bucket_start(wed), date(2026, 1, 1));
        assert_eq!(BucketSize::Week.bucket_start(wed), date(2026, 1, 5));
        assert_eq!(BucketSize::Week.bucket_start(date(2026, 1, 5)), date(2026, 1, 5));
        assert_eq!(BucketSize::Day.bucket_start(wed), wed);
        // Week crossing a year boundary.
        assert_eq!(BucketSize::Week.bucket_start(date(2026, 1, 1)), date(2025, 12, 29));
    }

    #[test]
    fn bucket_size_parses_codes_and_names() {
        assert_eq!("MS".parse::<BucketSize>().unwrap(), BucketSize::Month);
        assert_eq!("Weekly".parse::<BucketSize>().unwrap(), BucketSize::Week);
        assert_eq!("D".parse::<BucketSize>().unwrap(), BucketSize::Day);
        assert!("hourly".parse::<BucketSize>().is_err());
        assert_eq!(BucketSize::Week.to_string(), "W-MON");
    }

    #[test]
    fn rebucket_to_coarser_size_sums_counts() {
        let series = TimeSeries {
            rows: vec![
                TimeSeriesRow {
                    period: date(2026, 1, 5),
                    group: "Bronx".into(),
                    count: 2,
                },
                TimeSeriesRow {
                    period: date(2026, 1, 12),
                    group: "Bronx".into(),
                    count: 3,
                },
            ],
        };
        let monthly = series.rebucket(BucketSize::Month);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly.rows[0].period, date(2026, 1, 1));
        assert_eq!(monthly.rows[0].count, 5);
    }

    #[test]
    fn to_table_uses_fixed_header() {
        let table = TimeSeries::default().to_table();
        assert_eq!(table.columns(), ["Period", "Group", "Count"]);
        assert!(table.is_empty());
    }
}
