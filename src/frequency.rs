use std::collections::HashMap;

use itertools::Itertools;

use crate::table::Table;

pub const MISSING_LABEL: &str = "Missing";

/// Counts per distinct value of `column`, nulls counted as [`MISSING_LABEL`].
/// Sorted by count descending, then value ascending. A missing column gives
/// an empty list.
pub fn value_counts(table: &Table, column: &str) -> Vec<(String, usize)> {
    let Some(cells) = table.column(column) else {
        return Vec::new();
    };
    let mut counts: HashMap<String, usize> = HashMap::new();
    for cell in cells {
        let key = cell
            .map(|value| value.as_display())
            .unwrap_or_else(|| MISSING_LABEL.to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}

/// Renders counts as `[value, count, percent]` rows.
pub fn render_rows(counts: &[(String, usize)]) -> Vec<Vec<String>> {
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    counts
        .iter()
        .map(|(value, count)| {
            let percent = if total == 0 {
                0.0
            } else {
                (*count as f64 / total as f64) * 100.0
            };
            vec![value.clone(), count.to_string(), format!("{percent:.2}%")]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn value_counts_orders_by_count_and_labels_nulls() {
        let table = Table::from_rows(
            vec!["borough".to_string()],
            vec![
                vec![Some(Value::from("Bronx"))],
                vec![None],
                vec![Some(Value::from("Queens"))],
                vec![Some(Value::from("Bronx"))],
            ],
        );
        assert_eq!(
            value_counts(&table, "borough"),
            vec![
                ("Bronx".to_string(), 2),
                ("Missing".to_string(), 1),
                ("Queens".to_string(), 1),
            ]
        );
        assert!(value_counts(&table, "nope").is_empty());
    }

    #[test]
    fn render_rows_formats_percentages() {
        let rows = render_rows(&[("Bronx".to_string(), 3), ("Queens".to_string(), 1)]);
        assert_eq!(rows[0], vec!["Bronx", "3", "75.00%"]);
        assert_eq!(rows[1][2], "25.00%");
    }
}
