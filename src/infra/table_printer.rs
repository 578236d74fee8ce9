use crate::pipeline::storage::TableDescription;
use crate::query::QueryResult;

pub const NO_RESULTS: &str = "No results found.";

/// Render query rows as a `|`-separated table. Each column is as wide as
/// its longest cell or header plus two.
pub fn render_result(result: &QueryResult) -> String {
    if result.is_empty() {
        return NO_RESULTS.to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let longest = cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            longest + 2
        })
        .collect();

    let mut out = String::new();
    out.push_str(&render_line(result.columns.iter().map(String::as_str), &widths));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1)));
    for row in &cells {
        out.push('\n');
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Render the store's table listing: name, key columns and DDL.
pub fn render_tables(tables: &[TableDescription]) -> String {
    if tables.is_empty() {
        return "No tables found in the database.".to_string();
    }
    tables
        .iter()
        .map(|t| {
            format!(
                "Table: {}\n  Primary key: ({})\n  {}",
                t.name,
                t.primary_key.join(", "),
                t.create_sql
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
