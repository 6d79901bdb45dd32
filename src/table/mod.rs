//! Minimal in-memory tables.
//!
//! A [`Table`] is an ordered list of named columns and rows of string cells.
//! A cell is `None` when it holds a genuine null, which is distinct from the
//! empty string. Every transformation returns a new table; nothing here
//! mutates a table that may be shared between factories.
//!
//! ```text
//! | id | name  |        columns: ["id", "name"]
//! | -  | -     |   →    rows:    [[Some("1"), Some("Buffy")],
//! | 1  | Buffy |                  [Some("2"), None]]
//! | 2  | {NULL}|
//! ```

mod markdown;

pub use markdown::parse_markdown;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// String used in declarative tables and serialized actuals to mark a null cell.
pub const NULL_TOKEN: &str = "{NULL}";

/// A single cell. `None` is a null.
pub type Cell = Option<String>;

/// A row record keyed by column name, in column order.
pub type Record = serde_json::Map<String, Value>;

/// Errors raised while building or reshaping tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Bad table format: {reason}\n{text}")]
    BadTableFormat { reason: String, text: String },

    #[error("Column not found: {column} (columns: {available})")]
    ColumnNotFound { column: String, available: String },

    #[error("Row {row} has {found} cells, expected {expected}")]
    ColumnMismatch {
        row: usize,
        found: usize,
        expected: usize,
    },
}

pub type TableResult<T> = Result<T, TableError>;

/// Rows × named columns of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows, checking that every row is as wide
    /// as the header.
    pub fn from_rows(
        columns: impl IntoIterator<Item = impl Into<String>>,
        rows: Vec<Vec<Cell>>,
    ) -> TableResult<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from row records.
    ///
    /// When `columns` is given it fixes the column order (and is the only way
    /// to describe an empty result). Otherwise columns are collected in order
    /// of first appearance. Missing keys become nulls; non-string JSON values
    /// are rendered as their JSON text.
    pub fn from_records(records: &[Record], columns: Option<&[String]>) -> Self {
        let columns: Vec<String> = match columns {
            Some(columns) => columns.to_vec(),
            None => {
                let mut seen = HashSet::new();
                let mut ordered = Vec::new();
                for key in records.iter().flat_map(|r| r.keys()) {
                    if seen.insert(key.as_str()) {
                        ordered.push(key.clone());
                    }
                }
                ordered
            }
        };

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).and_then(value_to_cell))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row` in `column`, `None` if either is out of range.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// All cells of one column.
    pub fn column(&self, column: &str) -> TableResult<Vec<&Cell>> {
        let index = self.require_column(column)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> TableResult<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::ColumnMismatch {
                row: self.rows.len(),
                found: row.len(),
                expected: self.columns.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Return a copy with `column` set from `fill(row_index)`.
    ///
    /// An existing column is overwritten in place; a new one is appended.
    pub fn with_column<F>(&self, column: &str, mut fill: F) -> Table
    where
        F: FnMut(usize) -> Cell,
    {
        match self.try_with_column::<_, std::convert::Infallible>(column, |i| Ok(fill(i))) {
            Ok(table) => table,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`Table::with_column`].
    pub fn try_with_column<F, E>(&self, column: &str, mut fill: F) -> Result<Table, E>
    where
        F: FnMut(usize) -> Result<Cell, E>,
    {
        let mut table = self.clone();
        let index = match table.column_index(column) {
            Some(index) => index,
            None => {
                table.columns.push(column.to_string());
                for row in &mut table.rows {
                    row.push(None);
                }
                table.columns.len() - 1
            }
        };
        for (i, row) in table.rows.iter_mut().enumerate() {
            row[index] = fill(i)?;
        }
        Ok(table)
    }

    /// Return a copy with every cell of `column` replaced by `f(cell)`.
    ///
    /// A column that is not present is left alone.
    pub fn try_map_column<F, E>(&self, column: &str, mut f: F) -> Result<Table, E>
    where
        F: FnMut(&Cell) -> Result<Cell, E>,
    {
        let mut table = self.clone();
        if let Some(index) = table.column_index(column) {
            for row in &mut table.rows {
                row[index] = f(&row[index])?;
            }
        }
        Ok(table)
    }

    /// Return a copy with every cell replaced by `f(cell)`.
    pub fn map_cells<F>(&self, mut f: F) -> Table
    where
        F: FnMut(&Cell) -> Cell,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(&mut f).collect())
                .collect(),
        }
    }

    /// Fallible form of [`Table::map_cells`].
    pub fn try_map_cells<F, E>(&self, mut f: F) -> Result<Table, E>
    where
        F: FnMut(&Cell) -> Result<Cell, E>,
    {
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            rows.push(row.iter().map(&mut f).collect::<Result<Vec<_>, E>>()?);
        }
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Turn every [`NULL_TOKEN`] cell into a real null.
    pub fn replace_null_tokens(&self) -> Table {
        self.map_cells(|cell| match cell.as_deref() {
            Some(NULL_TOKEN) => None,
            _ => cell.clone(),
        })
    }

    /// Append the rows of `other`, taking the union of both column sets.
    ///
    /// Columns new to `self` are added at the end and back-filled with nulls;
    /// columns `other` lacks are null in its rows.
    pub fn append(&mut self, other: &Table) {
        for column in &other.columns {
            if !self.has_column(column) {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(None);
                }
            }
        }

        let positions: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();

        for row in &other.rows {
            self.rows.push(
                positions
                    .iter()
                    .map(|pos| pos.and_then(|i| row[i].clone()))
                    .collect(),
            );
        }
    }

    /// Project onto `columns`, in that order.
    pub fn select(&self, columns: &[String]) -> TableResult<Table> {
        let indexes = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<TableResult<Vec<_>>>()?;

        Ok(Table {
            columns: columns.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Return a copy without `column`.
    pub fn drop_column(&self, column: &str) -> Table {
        let Some(index) = self.column_index(column) else {
            return self.clone();
        };
        let mut table = self.clone();
        table.columns.remove(index);
        for row in &mut table.rows {
            row.remove(index);
        }
        table
    }

    /// Keep the rows for which `keep(row_index, row)` holds, in order.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(usize, &[Cell]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .enumerate()
                .filter(|(i, row)| keep(*i, row))
                .map(|(_, row)| row.clone())
                .collect(),
        }
    }

    /// Stable sort by the given key columns. Nulls sort first.
    pub fn sorted_by(&self, keys: &[String]) -> TableResult<Table> {
        let indexes = keys
            .iter()
            .map(|k| self.require_column(k))
            .collect::<TableResult<Vec<_>>>()?;

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            indexes
                .iter()
                .map(|&i| a[i].cmp(&b[i]))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Values of the key columns for every row.
    pub fn key_tuples(&self, keys: &[String]) -> TableResult<Vec<Vec<Cell>>> {
        let projected = self.select(keys)?;
        Ok(projected.rows)
    }

    /// Compare contents ignoring column order.
    pub fn same_content(&self, other: &Table) -> bool {
        if self.columns.len() != other.columns.len() || self.rows.len() != other.rows.len() {
            return false;
        }
        match other.select(&self.columns) {
            Ok(reordered) => reordered.rows == self.rows,
            Err(_) => false,
        }
    }

    /// Export rows as records, one JSON object per row.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| {
                        let value = match cell {
                            Some(v) => Value::String(v.clone()),
                            None => Value::Null,
                        };
                        (column.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Render a single row as `column=value` pairs for diagnostics.
    pub fn describe_row(&self, row: usize) -> String {
        let Some(cells) = self.rows.get(row) else {
            return String::new();
        };
        self.columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| format!("{}={}", column, cell.as_deref().unwrap_or(NULL_TOKEN)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn require_column(&self, column: &str) -> TableResult<usize> {
        self.column_index(column)
            .ok_or_else(|| TableError::ColumnNotFound {
                column: column.to_string(),
                available: self.columns.join(", "),
            })
    }
}

fn value_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl FromStr for Table {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_markdown(s)
    }
}

/// Renders the table in the same pipe-delimited format the parser reads.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |cell: &Cell| cell.as_deref().unwrap_or(NULL_TOKEN).to_string();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count().max(1)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(render(cell).chars().count());
            }
        }

        let line = |cells: Vec<String>| -> String {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect();
            format!("| {} |", padded.join(" | "))
        };

        writeln!(f, "{}", line(self.columns.clone()))?;
        write!(f, "{}", line(widths.iter().map(|w| "-".repeat(*w)).collect()))?;
        for row in &self.rows {
            write!(f, "\n{}", line(row.iter().map(render).collect()))?;
        }
        Ok(())
    }
}
