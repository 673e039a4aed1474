use crate::{
    data::{self, Value},
    table::Table,
};

const BOROUGHS: [(&str, &str); 5] = [
    ("1", "Manhattan"),
    ("2", "Bronx"),
    ("3", "Brooklyn"),
    ("4", "Queens"),
    ("5", "Staten Island"),
];

/// Normalized string form of a borough code: `1`, `1.0` and `" 1 "` all
/// become `"1"`. Non-code shapes yield `None`.
fn canonical_code(value: &Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => data::integral(*f).map(|i| i.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

pub fn borough_name(value: &Value) -> Option<&'static str> {
    let code = canonical_code(value)?;
    BOROUGHS
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, name)| *name)
}

/// Replaces borough codes in `column` with display names. Unmapped values,
/// nulls and tables without the column pass through unchanged.
pub fn map_borough(table: &Table, column: &str) -> Table {
    table.map_column(column, |cell| match cell {
        Some(value) => match borough_name(value) {
            Some(name) => Some(Value::from(name)),
            None => Some(value.clone()),
        },
        None => None,
    })
}
