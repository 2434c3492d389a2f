//! Output formatting for tabular results.
//!
//! Row listings, query results and schema descriptors are all rendered as a
//! grid of named columns, as JSON, an ASCII table (like the MySQL CLI) or a
//! Markdown table.

use crate::models::{CellValue, ColumnInfo, IndexInfo, Row, TableInfo};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Output format for tabular results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format
    Json,
    /// ASCII table format (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
}

/// Column names of a set of rows, sorted by name.
///
/// Rows carry no column order of their own; use [`ordered_columns`] when the
/// table schema is known.
pub fn column_names(rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for name in row.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Column names in schema order, followed by any row keys the schema lacks.
pub fn ordered_columns(schema: &[ColumnInfo], rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = schema.iter().map(|c| c.name.clone()).collect();
    for name in column_names(rows) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

pub fn format_as_table(columns: &[String], rows: &[Row]) -> String {
    if columns.is_empty() {
        return "Empty set\n".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(col) {
                widths[i] = widths[i].max(value.display().width());
            }
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad_center(col, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let line: String = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                let value = row.get(col).unwrap_or(&CellValue::Null);
                let formatted = value.display();
                if matches!(value, CellValue::Number(_)) {
                    format!("| {} ", pad_left(&formatted, *w))
                } else {
                    format!("| {} ", pad_right(&formatted, *w))
                }
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!("{} {} in set\n", rows.len(), row_text));

    output
}

pub fn format_as_markdown(columns: &[String], rows: &[Row]) -> String {
    if columns.is_empty() {
        return "*Empty set*\n".to_string();
    }

    let mut output = String::new();

    let header: String = columns.iter().map(|c| format!("| {} ", c)).collect::<String>() + "|\n";
    output.push_str(&header);

    let sep: String = columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in rows {
        let line: String = columns
            .iter()
            .map(|col| {
                let value = row.get(col).unwrap_or(&CellValue::Null);
                format!("| {} ", value.display().replace('|', "\\|"))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&format!("\n*{} rows*\n", rows.len()));

    output
}

/// Render rows in the requested format.
pub fn render_rows(format: OutputFormat, columns: &[String], rows: &[Row]) -> String {
    match format {
        OutputFormat::Json => to_json(rows),
        OutputFormat::Table => format_as_table(columns, rows),
        OutputFormat::Markdown => format_as_markdown(columns, rows),
    }
}

/// Render any serializable value as pretty JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

pub fn tables_to_rows(tables: &[TableInfo]) -> (Vec<String>, Vec<Row>) {
    let columns = vec!["name".to_string(), "type".to_string(), "rows".to_string()];
    let rows = tables
        .iter()
        .map(|t| {
            Row::from([
                ("name".to_string(), CellValue::from(t.name.as_str())),
                ("type".to_string(), CellValue::from(t.table_type.as_str())),
                (
                    "rows".to_string(),
                    t.row_count_estimate.map(CellValue::from).unwrap_or(CellValue::Null),
                ),
            ])
        })
        .collect();
    (columns, rows)
}

pub fn columns_to_rows(columns: &[ColumnInfo]) -> (Vec<String>, Vec<Row>) {
    let names = ["name", "type", "nullable", "key", "default"]
        .map(String::from)
        .to_vec();
    let rows = columns
        .iter()
        .map(|c| {
            Row::from([
                ("name".to_string(), CellValue::from(c.name.as_str())),
                ("type".to_string(), CellValue::from(c.data_type.as_str())),
                ("nullable".to_string(), CellValue::from(c.nullable)),
                (
                    "key".to_string(),
                    CellValue::from(if c.is_primary_key { "PRI" } else { "" }),
                ),
                (
                    "default".to_string(),
                    c.default_value
                        .as_deref()
                        .map(CellValue::from)
                        .unwrap_or(CellValue::Null),
                ),
            ])
        })
        .collect();
    (names, rows)
}

pub fn indexes_to_rows(indexes: &[IndexInfo]) -> (Vec<String>, Vec<Row>) {
    let names = ["index", "unique", "primary", "columns"].map(String::from).to_vec();
    let rows = indexes
        .iter()
        .map(|i| {
            Row::from([
                ("index".to_string(), CellValue::from(i.name.as_str())),
                ("unique".to_string(), CellValue::from(i.is_unique)),
                ("primary".to_string(), CellValue::from(i.is_primary)),
                ("columns".to_string(), CellValue::from(i.column_names.join(", "))),
            ])
        })
        .collect();
    (names, rows)
}

fn pad_right(s: &str, width: usize) -> String {
    format!("{}{}", s, " ".repeat(width.saturating_sub(s.width())))
}

fn pad_left(s: &str, width: usize) -> String {
    format!("{}{}", " ".repeat(width.saturating_sub(s.width())), s)
}

fn pad_center(s: &str, width: usize) -> String {
    let total = width.saturating_sub(s.width());
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(total - left))
}
