//! Expected data for one target within one case, and the comparison against
//! what the transformation actually produced.
//!
//! Three comparison modes:
//!
//! * `exact`: rows must match in order.
//! * `sorted`: both sides are sorted by the `by` columns first.
//! * `keys`: only actual rows whose `by` key appears in the expected table are
//!   compared; every expected key must be present in the actual data.
//!
//! Only the expected columns are compared, so actual data may carry extra
//! columns.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::identifier::{translate_embedded, CaseId, IdentifierError, IdentifierRegistry};
use crate::table::{parse_markdown, Cell, Table, TableError, NULL_TOKEN};

/// Errors in how an expectation is declared or resolved.
#[derive(Debug, thiserror::Error)]
pub enum ExpectationError {
    #[error("Target \"{target}\": cannot use compare_via={compare_via} without a \"by\" option")]
    CompareViaWithoutKeys {
        target: String,
        compare_via: CompareVia,
    },

    #[error("Unknown compare_via option: {0} (expected exact, sorted or keys)")]
    UnknownCompareVia(String),

    #[error("Target \"{target}\": key column \"{column}\" is not in the expected table")]
    UnknownKeyColumn { target: String, column: String },

    #[error("Unable to build expected data for target \"{target}\": {error}")]
    BadTableFormat {
        target: String,
        #[source]
        error: TableError,
    },

    #[error("Target \"{target}\": unable to resolve embedded identifier in expected data: {error}")]
    EmbeddedIdentifier {
        target: String,
        #[source]
        error: IdentifierError,
    },

    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

pub type ExpectationResult<T> = Result<T, ExpectationError>;

/// Actual data did not match expected data.
#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    #[error("Target \"{target}\": {detail}\nActual:\n{actual}\nExpected:\n{expected}")]
    DataMismatch {
        target: String,
        detail: String,
        actual: Table,
        expected: Table,
    },

    #[error("Target \"{target}\" missing expected columns: {}", .columns.join(", "))]
    MissingColumns { target: String, columns: Vec<String> },

    #[error(
        "For target \"{target}\", keys in expected data, not found in actual data:\n{missing_from_actual}\nKeys in actual data, not in expected:\n{missing_from_expected}"
    )]
    MissingExpectedKeys {
        target: String,
        missing_from_actual: Table,
        missing_from_expected: Table,
    },
}

/// How actual rows are matched against expected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareVia {
    #[default]
    Exact,
    Sorted,
    Keys,
}

impl FromStr for CompareVia {
    type Err = ExpectationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "sorted" => Ok(Self::Sorted),
            "keys" => Ok(Self::Keys),
            other => Err(ExpectationError::UnknownCompareVia(other.to_string())),
        }
    }
}

impl fmt::Display for CompareVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::Sorted => "sorted",
            Self::Keys => "keys",
        };
        f.write_str(name)
    }
}

/// Optional settings of a [`DataExpectation`].
#[derive(Debug, Clone, Default)]
pub struct ExpectationOptions {
    /// Columns with the same value in every expected row.
    pub values: Vec<(String, String)>,
    /// Key columns for `sorted` and `keys` comparison.
    pub by: Vec<String>,
    /// Defaults to `sorted` when `by` is given, `exact` otherwise.
    pub compare_via: Option<CompareVia>,
}

/// Expected contents of one target for one case.
#[derive(Debug, Clone)]
pub struct DataExpectation {
    target: String,
    table: Table,
    by: Vec<String>,
    compare_via: CompareVia,
}

impl DataExpectation {
    pub fn new(
        target: impl Into<String>,
        table: &str,
        options: ExpectationOptions,
    ) -> ExpectationResult<Self> {
        let target = target.into();
        let compare_via = options.compare_via.unwrap_or(if options.by.is_empty() {
            CompareVia::Exact
        } else {
            CompareVia::Sorted
        });
        if options.by.is_empty() && compare_via != CompareVia::Exact {
            return Err(ExpectationError::CompareViaWithoutKeys {
                target,
                compare_via,
            });
        }

        let mut expected = parse_markdown(table).map_err(|error| ExpectationError::BadTableFormat {
            target: target.clone(),
            error,
        })?;
        for (column, value) in &options.values {
            expected = expected.with_column(column, |_| Some(value.clone()));
        }
        let expected = expected.replace_null_tokens();

        if let Some(column) = options.by.iter().find(|c| !expected.has_column(c)) {
            return Err(ExpectationError::UnknownKeyColumn {
                target,
                column: column.clone(),
            });
        }

        Ok(Self {
            target,
            table: expected,
            by: options.by,
            compare_via,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Expected rows before embedded identifiers are resolved.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn by(&self) -> &[String] {
        &self.by
    }

    pub fn compare_via(&self) -> CompareVia {
        self.compare_via
    }

    /// Compare `actual` (already restricted to `case`) with the expected rows.
    pub fn assert_expected(
        &self,
        actual: &Table,
        case: &CaseId,
        registry: &mut IdentifierRegistry,
    ) -> ExpectationResult<()> {
        let expected = translate_embedded(&self.table, case, registry).map_err(|error| {
            ExpectationError::EmbeddedIdentifier {
                target: self.target.clone(),
                error,
            }
        })?;

        let missing: Vec<String> = expected
            .columns()
            .iter()
            .filter(|c| !actual.has_column(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(AssertionError::MissingColumns {
                target: self.target.clone(),
                columns: missing,
            }
            .into());
        }

        let (actual, expected) = match self.compare_via {
            CompareVia::Exact => (actual.clone(), expected),
            CompareVia::Sorted => (self.sorted(actual)?, self.sorted(&expected)?),
            CompareVia::Keys => self.matching_keys(actual, &expected)?,
        };

        let actual = actual.select(expected.columns()).map_err(|_| AssertionError::MissingColumns {
            target: self.target.clone(),
            columns: expected.columns().to_vec(),
        })?;
        self.compare(actual, expected)?;
        Ok(())
    }

    fn sorted(&self, table: &Table) -> Result<Table, AssertionError> {
        table.sorted_by(&self.by).map_err(|_| AssertionError::MissingColumns {
            target: self.target.clone(),
            columns: self.by.clone(),
        })
    }

    fn key_tuples(&self, table: &Table) -> Result<Vec<Vec<Cell>>, AssertionError> {
        table.key_tuples(&self.by).map_err(|_| AssertionError::MissingColumns {
            target: self.target.clone(),
            columns: self.by.clone(),
        })
    }

    /// Restrict `actual` to the expected keys, failing when an expected key has
    /// no actual row.
    fn matching_keys(&self, actual: &Table, expected: &Table) -> Result<(Table, Table), AssertionError> {
        let expected_keys = self.key_tuples(expected)?;
        let actual_keys = self.key_tuples(actual)?;
        let expected_set: HashSet<&Vec<Cell>> = expected_keys.iter().collect();
        let actual_set: HashSet<&Vec<Cell>> = actual_keys.iter().collect();

        let missing_from_actual: Vec<Vec<Cell>> = dedup(
            expected_keys.iter().filter(|k| !actual_set.contains(k)),
        );
        if !missing_from_actual.is_empty() {
            let missing_from_expected = dedup(actual_keys.iter().filter(|k| !expected_set.contains(k)));
            return Err(AssertionError::MissingExpectedKeys {
                target: self.target.clone(),
                missing_from_actual: self.key_table(missing_from_actual)?,
                missing_from_expected: self.key_table(missing_from_expected)?,
            });
        }

        let kept = actual.filter_rows(|row, _| expected_set.contains(&actual_keys[row]));
        Ok((self.sorted(&kept)?, self.sorted(expected)?))
    }

    fn key_table(&self, keys: Vec<Vec<Cell>>) -> Result<Table, AssertionError> {
        Table::from_rows(self.by.iter().cloned(), keys).map_err(|_| AssertionError::MissingColumns {
            target: self.target.clone(),
            columns: self.by.clone(),
        })
    }

    fn compare(&self, actual: Table, expected: Table) -> Result<(), AssertionError> {
        let detail = if actual.len() != expected.len() {
            Some(format!(
                "row count differs: actual has {} rows, expected {}",
                actual.len(),
                expected.len()
            ))
        } else {
            first_difference(&actual, &expected)
        };

        match detail {
            None => Ok(()),
            Some(detail) => Err(AssertionError::DataMismatch {
                target: self.target.clone(),
                detail,
                actual,
                expected,
            }),
        }
    }
}

fn dedup<'a>(keys: impl Iterator<Item = &'a Vec<Cell>>) -> Vec<Vec<Cell>> {
    let mut seen = HashSet::new();
    keys.filter(|k| seen.insert(*k)).cloned().collect()
}

fn first_difference(actual: &Table, expected: &Table) -> Option<String> {
    for (row, (a, e)) in actual.rows().iter().zip(expected.rows()).enumerate() {
        for (column, (a, e)) in expected.columns().iter().zip(a.iter().zip(e)) {
            if a != e {
                return Some(format!(
                    "row {} column \"{}\" differs: actual {}, expected {}",
                    row,
                    column,
                    a.as_deref().unwrap_or(NULL_TOKEN),
                    e.as_deref().unwrap_or(NULL_TOKEN)
                ));
            }
        }
    }
    None
}
