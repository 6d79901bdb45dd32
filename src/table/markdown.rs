//! Parser for pipe-delimited (markdown style) tables.
//!
//! ```text
//! | id | name   |
//! | -  | -      |
//! | 1  | Buffy  |   # trailing comments are dropped
//! | 2  | #2     |   <- a '#' followed by another pipe is cell content
//! ```
//!
//! Cells are kept as written (trimmed). Empty cells are empty strings; the
//! null token is left for callers to interpret.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{Table, TableError, TableResult};

static TRAILING_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^|]*$").expect("valid comment pattern"));

static HEADER_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\-|]*$").expect("valid separator pattern"));

/// Parse a pipe-delimited table.
pub fn parse_markdown(text: &str) -> TableResult<Table> {
    let lines: Vec<String> = text
        .lines()
        .map(|line| TRAILING_COMMENT.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    let bad = |reason: String| TableError::BadTableFormat {
        reason,
        text: text.to_string(),
    };

    let (header, rest) = lines
        .split_first()
        .ok_or_else(|| bad("table is empty".to_string()))?;
    let (separator, body) = rest
        .split_first()
        .ok_or_else(|| bad("missing header separator".to_string()))?;

    if !HEADER_SEPARATOR.is_match(separator) {
        return Err(bad(format!("Bad header separator: {}", separator)));
    }

    let columns = split_row(header);
    let mut seen = HashSet::new();
    for column in &columns {
        if column.is_empty() {
            return Err(bad("empty column name in header".to_string()));
        }
        if !seen.insert(column.as_str()) {
            return Err(bad(format!("duplicate column name: {}", column)));
        }
    }

    let mut table = Table::new(columns);
    for (i, line) in body.iter().enumerate() {
        let cells = split_row(line);
        if cells.len() != table.columns().len() {
            return Err(bad(format!(
                "row {} has {} cells, header has {}",
                i + 1,
                cells.len(),
                table.columns().len()
            )));
        }
        table.push_row(cells.into_iter().map(Some).collect())?;
    }

    Ok(table)
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}
