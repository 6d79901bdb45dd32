//! Targets: the output tables a transformation writes.
//!
//! Loading actual rows runs stacking in reverse. Each concrete identifier value
//! is looked up in the registry, which tells both the named id it stands for
//! and the case it was generated in. The first non-null identifier column of a
//! row decides its case; [`Target::case_data`] then hands each case only its
//! own rows.

use tracing::{debug, info};

use crate::identifier::{CaseId, IdentifierError, IdentifierMap, IdentifierRegistry};
use crate::table::{Record, Table};

/// Errors raised while loading actual data into a target.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Target \"{target}\": empty data with no columns given")]
    EmptyDataNoColumns { target: String },

    #[error(
        "Target \"{target}\" defines identifier map for column \"{column}\", but \"{column}\" not found in actual data. columns found: {found}"
    )]
    MissingIdentifierColumn {
        target: String,
        column: String,
        found: String,
    },

    #[error("Target \"{target}\": unable to find a case for row: {row}")]
    UnableToFindCase { target: String, row: String },

    #[error("Target \"{target}\", column \"{column}\": {error}")]
    Identifier {
        target: String,
        column: String,
        #[source]
        error: IdentifierError,
    },
}

pub type TargetResult<T> = Result<T, TargetError>;

/// A named output table, partitioned by case once actuals are loaded.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    description: Option<String>,
    identifier_map: IdentifierMap,
    data: Table,
    cases: Option<Vec<CaseId>>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            identifier_map: IdentifierMap::new(),
            data: Table::default(),
            cases: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_identifier_map(mut self, identifier_map: IdentifierMap) -> Self {
        self.identifier_map = identifier_map;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn identifier_map(&self) -> &IdentifierMap {
        &self.identifier_map
    }

    /// All loaded rows, identifier columns translated to named ids.
    pub fn data(&self) -> &Table {
        &self.data
    }

    /// Replace the target's contents with actual result rows.
    ///
    /// `columns` fixes the column order and is required when `records` is
    /// empty.
    pub fn load_actual(
        &mut self,
        registry: &IdentifierRegistry,
        records: &[Record],
        columns: Option<&[String]>,
    ) -> TargetResult<()> {
        if records.is_empty() && columns.is_none() {
            return Err(TargetError::EmptyDataNoColumns {
                target: self.name.clone(),
            });
        }
        self.load_table(registry, Table::from_records(records, columns))
    }

    /// Replace the target's contents with an already built table.
    pub fn load_table(&mut self, registry: &IdentifierRegistry, table: Table) -> TargetResult<()> {
        let table = table.replace_null_tokens();

        for column in self.identifier_map.columns() {
            if !table.has_column(column) {
                return Err(TargetError::MissingIdentifierColumn {
                    target: self.name.clone(),
                    column: column.to_string(),
                    found: table.columns().join(", "),
                });
            }
        }

        if self.identifier_map.is_empty() {
            info!(target_name = %self.name, rows = table.len(), "loaded actuals without identifiers");
            self.data = table;
            self.cases = None;
            return Ok(());
        }

        let cases = (0..table.len())
            .map(|row| self.infer_case(registry, &table, row))
            .collect::<TargetResult<Vec<_>>>()?;

        let mut translated = table;
        for (column, reference) in self.identifier_map.iter() {
            translated = translated.try_map_column(column, |cell| match cell {
                None => Ok(None),
                Some(value) => registry
                    .find(reference, value)
                    .map(|owner| Some(owner.named_id.clone()))
                    .map_err(|error| self.identifier_error(column, error)),
            })?;
        }

        info!(target_name = %self.name, rows = translated.len(), "loaded actuals");
        self.data = translated;
        self.cases = Some(cases);
        Ok(())
    }

    /// Rows belonging to `case`, in load order.
    ///
    /// A target without identifier columns cannot be partitioned and returns
    /// everything.
    pub fn case_data(&self, case: &CaseId) -> Table {
        match &self.cases {
            None => self.data.clone(),
            Some(cases) => self.data.filter_rows(|row, _| cases[row] == *case),
        }
    }

    fn infer_case(
        &self,
        registry: &IdentifierRegistry,
        table: &Table,
        row: usize,
    ) -> TargetResult<CaseId> {
        let first = self.identifier_map.iter().find_map(|(column, reference)| {
            table
                .cell(row, column)
                .and_then(|cell| cell.as_deref())
                .map(|value| (column, reference, value))
        });

        let Some((column, reference, value)) = first else {
            return Err(TargetError::UnableToFindCase {
                target: self.name.clone(),
                row: table.describe_row(row),
            });
        };

        let owner = registry
            .find(reference, value)
            .map_err(|error| self.identifier_error(column, error))?;
        debug!(target_name = %self.name, row, case = %owner.case, "inferred case");
        Ok(owner.case.clone())
    }

    fn identifier_error(&self, column: &str, error: IdentifierError) -> TargetError {
        TargetError::Identifier {
            target: self.name.clone(),
            column: column.to_string(),
            error,
        }
    }
}
