//! Turning raw sheet data into a total, string-typed table.
//!
//! Sheet connectors hand back sparse and loosely typed data: columns may be
//! missing, empty cells come back as `null` or as a `"nan"` placeholder, and
//! numeric-looking cells arrive as numbers. The bookkeeping columns are
//! compared as plain strings, so every table goes through [`normalize`]
//! first. Every other cell is kept as read and written back unchanged.

use crate::types::{RawTable, Row, Table, BOOKKEEPING_COLUMNS, SOURCE_COLUMNS};
use serde_json::Value;
use tracing::debug;

/// Placeholders a dataframe writes for a missing cell.
const MISSING_PLACEHOLDERS: [&str; 2] = ["nan", "NaN"];

/// Coerce a bookkeeping cell to its string form. Missing-value placeholders
/// become `""`.
pub fn coerce_cell(value: &Value) -> String {
    match value {
        Value::String(s) if MISSING_PLACEHOLDERS.contains(&s.as_str()) => String::new(),
        other => cell_text(other),
    }
}

/// Text of a source cell. Strings are taken verbatim.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Header name for an unnamed overflow cell at `index`.
fn overflow_name(columns: &[String], index: usize) -> String {
    let mut name = format!("column_{}", index + 1);
    while columns.iter().any(|c| *c == name) {
        name.push('_');
    }
    name
}

/// Normalize a raw table. Never fails: missing columns are created empty
/// and cells past the end of the header get a generated column name.
pub fn normalize(raw: RawTable) -> Table {
    let RawTable { mut columns, rows } = raw;

    let longest = rows.iter().map(Vec::len).max().unwrap_or(0);
    for index in columns.len()..longest {
        let name = overflow_name(&columns, index);
        debug!(column = %name, "naming cells past the end of the header");
        columns.push(name);
    }

    for (i, column) in columns.iter().enumerate() {
        if columns[..i].contains(column) {
            debug!(column = %column, position = i, "duplicate column, first occurrence wins");
        }
    }

    let width = columns.len();
    for required in SOURCE_COLUMNS.iter().chain(BOOKKEEPING_COLUMNS.iter()) {
        if !columns.iter().any(|c| c == required) {
            debug!(column = *required, "adding missing column");
            columns.push(required.to_string());
        }
    }

    let rows = rows
        .into_iter()
        .map(|mut cells| {
            cells.resize(width, Value::Null);

            let mut row = Row::default();
            // Reversed so the first of any duplicate columns is set last.
            for (i, column) in columns.iter().enumerate().rev() {
                let cell = cells.get(i).unwrap_or(&Value::Null);
                if BOOKKEEPING_COLUMNS.contains(&column.as_str()) {
                    row.set(column, coerce_cell(cell));
                } else if SOURCE_COLUMNS.contains(&column.as_str()) {
                    row.set(column, cell_text(cell));
                } else {
                    row.extra.insert(column.clone(), cell.clone());
                }
            }
            row.cells = cells;
            row
        })
        .collect();

    Table { columns, rows }
}
