use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use log::debug;

use crate::table::Table;

/// Set-membership constraint on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub column: String,
    pub allowed: BTreeSet<String>,
}

impl FilterCondition {
    pub fn new<I, S>(column: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `column=a|b|c`. Values may be quoted; an empty right-hand side
    /// is a valid, inactive condition.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let (column, values) = trimmed
            .split_once('=')
            .ok_or_else(|| anyhow!("Filter '{trimmed}' must look like column=value|value"))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(anyhow!("Filter '{trimmed}' is missing a column name"));
        }
        let allowed = values
            .split('|')
            .map(|v| unquote(v.trim()))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            column: column.to_string(),
            allowed,
        })
    }

    fn is_active(&self, table: &Table) -> bool {
        !self.allowed.is_empty() && table.has_column(&self.column)
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// A conjunction of membership constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub conditions: Vec<FilterCondition>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint when both parts are present; `None` for either one
    /// leaves the axis unconstrained.
    pub fn with_optional<I, S>(mut self, column: Option<&str>, allowed: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let (Some(column), Some(allowed)) = (column, allowed) {
            self.conditions.push(FilterCondition::new(column, allowed));
        }
        self
    }

    pub fn with(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn parse_all(expressions: &[String]) -> Result<Self> {
        let conditions = expressions
            .iter()
            .map(|e| FilterCondition::parse(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { conditions })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Keeps rows whose stringified value is allowed on every active axis.
///
/// An axis is inactive when its column is missing or its allowed set is
/// empty. Null cells never match an active axis.
pub fn apply_filters(table: &Table, spec: &FilterSpec) -> Table {
    let active = spec
        .conditions
        .iter()
        .filter(|condition| {
            let active = condition.is_active(table);
            if !active {
                debug!("Filter on '{}' imposes no constraint", condition.column);
            }
            active
        })
        .filter_map(|condition| {
            table
                .column_index(&condition.column)
                .map(|idx| (idx, &condition.allowed))
        })
        .collect::<Vec<_>>();

    if active.is_empty() {
        return table.clone();
    }

    table.filter_rows(|row| {
        active.iter().all(|(idx, allowed)| match &row[*idx] {
            Some(value) => allowed.contains(&value.as_display()),
            None => false,
        })
    })
}

/// Sorted distinct non-null values of `column`, stringified.
pub fn distinct_values(table: &Table, column: &str) -> Vec<String> {
    let Some(cells) = table.column(column) else {
        return Vec::new();
    };
    cells
        .into_iter()
        .flatten()
        .map(|value| value.as_display())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
