//! In-memory tables and their ASCII rendering.
//!
//! A [`Table`] is an ordered list of rows over a fixed, named column set.
//! Cells are `Option<Value>`; `None` is a missing or null cell. Every
//! transform in the crate takes a `&Table` and returns a new one.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

use log::debug;
use serde_json::{Map, Value as JsonValue};

use crate::data::Value;

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows; short rows are padded with `None` and long
    /// rows are cut to the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Flattens JSON records into a table.
    ///
    /// The column set is the union of all keys in order of first appearance.
    /// Nested objects become dotted paths (`location.latitude`); arrays are
    /// kept as opaque JSON cells.
    pub fn from_records(records: &[JsonValue]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut flattened: Vec<Vec<(usize, Option<Value>)>> = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            let Some(object) = record.as_object() else {
                debug!("Skipping non-object record at position {idx}");
                continue;
            };
            let mut cells = Vec::new();
            flatten_object(object, "", &mut |path, value| {
                let position = *positions.entry(path.clone()).or_insert_with(|| {
                    columns.push(path);
                    columns.len() - 1
                });
                cells.push((position, value));
            });
            flattened.push(cells);
        }

        let width = columns.len();
        let rows = flattened
            .into_iter()
            .map(|cells| {
                let mut row: Row = vec![None; width];
                for (position, value) in cells {
                    row[position] = value;
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, or `None` when the column does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&Value>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_ref()).collect())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// Same columns, zero rows.
    pub fn empty_like(&self) -> Table {
        Table::new(self.columns.clone())
    }

    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Row) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Rewrites every cell of `column`; returns an unchanged copy when the
    /// column is absent.
    pub fn map_column<F>(&self, column: &str, mut f: F) -> Table
    where
        F: FnMut(Option<&Value>) -> Option<Value>,
    {
        let mut out = self.clone();
        if let Some(idx) = self.column_index(column) {
            for row in &mut out.rows {
                row[idx] = f(row[idx].as_ref());
            }
        }
        out
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub fn render(&self) -> String {
        render_table(&self.columns, &self.display_rows())
    }
}

fn flatten_object<F>(object: &Map<String, JsonValue>, prefix: &str, emit: &mut F)
where
    F: FnMut(String, Option<Value>),
{
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            JsonValue::Object(nested) => flatten_object(nested, &path, emit),
            scalar => emit(path, Value::from_json(scalar)),
        }
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h).max(1)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule_widths: Vec<usize> = widths.iter().map(|w| (*w).max(3)).collect();
    let rule: Vec<String> = rule_widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(table: &Table) {
    print!("{}", table.render());
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

// ANSI colour sequences take no columns on screen.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            chars.by_ref().find(|next| *next == 'm');
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
