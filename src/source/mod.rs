//! Sources: the input tables a transformation reads.
//!
//! Each case contributes a fragment to a source. [`Source::stack`] fills in
//! defaults, resolves identifiers for the case, and appends the rows, so after
//! generation a source holds the rows of every case side by side. Identifier
//! values are unique across cases, which is what later lets a target tell the
//! cases apart again.

mod values;

pub use values::{ColumnValue, ColumnValues};

use tracing::debug;

use crate::identifier::{
    translate_embedded, CaseId, IdentifierError, IdentifierMap, IdentifierRegistry,
};
use crate::table::{Record, Table};

/// Errors raised while stacking data onto a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(
        "In case \"{case}\", source \"{name}\" is missing columns corresponding to identifier attributes: {}",
        .columns.join(", ")
    )]
    MissingIdentifyingColumns {
        name: String,
        case: CaseId,
        columns: Vec<String>,
    },

    #[error(
        "In case \"{case}\", attempting to stack data onto source \"{name}\" without identifiers:\n{data}"
    )]
    CannotStackStaticSource {
        name: String,
        case: CaseId,
        data: Table,
    },

    #[error("In case \"{case}\", unable to resolve embedded identifier in source \"{name}\": {error}")]
    EmbeddedIdentifier {
        name: String,
        case: CaseId,
        #[source]
        error: IdentifierError,
    },

    #[error("In case \"{case}\", source \"{name}\" column \"{column}\": {error}")]
    Identifier {
        name: String,
        case: CaseId,
        column: String,
        #[source]
        error: IdentifierError,
    },
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A named input table accumulated across cases.
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    description: Option<String>,
    defaults: ColumnValues,
    identifier_map: IdentifierMap,
    anonymous_identifiers: bool,
    data: Table,
    stacked: bool,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            defaults: ColumnValues::new(),
            identifier_map: IdentifierMap::new(),
            anonymous_identifiers: true,
            data: Table::default(),
            stacked: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_defaults(mut self, defaults: ColumnValues) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_identifier_map(mut self, identifier_map: IdentifierMap) -> Self {
        self.identifier_map = identifier_map;
        self
    }

    /// Whether identifying columns missing from a fragment get a fresh
    /// anonymous identity per row (the default) or are an error.
    pub fn with_anonymous_identifiers(mut self, enabled: bool) -> Self {
        self.anonymous_identifiers = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn defaults(&self) -> &ColumnValues {
        &self.defaults
    }

    pub fn identifier_map(&self) -> &IdentifierMap {
        &self.identifier_map
    }

    /// A source without identifier columns holds the same data for every case.
    pub fn is_static(&self) -> bool {
        self.identifier_map.is_empty()
    }

    /// Rows stacked so far.
    pub fn data(&self) -> &Table {
        &self.data
    }

    /// Stack the fragment a case contributes.
    ///
    /// `values` override the source defaults for this call only.
    pub fn stack(
        &mut self,
        registry: &mut IdentifierRegistry,
        case: &CaseId,
        fragment: &Table,
        values: Option<&ColumnValues>,
    ) -> SourceResult<()> {
        let effective = match values {
            Some(values) => self.defaults.merged(values),
            None => self.defaults.clone(),
        };

        let mut table = fragment.clone();

        if self.anonymous_identifiers {
            for column in self.identifier_map.columns() {
                if !table.has_column(column) && !effective.contains(column) {
                    table = table.with_column(column, |_| Some(registry.anonymous_named_id()));
                }
            }
        }

        table = self.fill_defaults(table, &effective, registry, case)?;
        table = table.replace_null_tokens();
        table = translate_embedded(&table, case, registry).map_err(|error| {
            SourceError::EmbeddedIdentifier {
                name: self.name.clone(),
                case: case.clone(),
                error,
            }
        })?;

        if self.is_static() {
            if self.stacked && !self.data.same_content(&table) {
                return Err(SourceError::CannotStackStaticSource {
                    name: self.name.clone(),
                    case: case.clone(),
                    data: table,
                });
            }
            self.data = table;
            self.stacked = true;
            debug!(source = %self.name, case = %case, rows = self.data.len(), "set static source data");
            return Ok(());
        }

        let table = self.translate_identifiers(table, registry, case)?;
        debug!(source = %self.name, case = %case, rows = table.len(), "stacked source data");
        self.data.append(&table);
        self.stacked = true;
        Ok(())
    }

    /// Export the stacked rows, one record per row.
    pub fn serialize(&self) -> Vec<Record> {
        self.data.to_records()
    }

    fn fill_defaults(
        &self,
        mut table: Table,
        defaults: &ColumnValues,
        registry: &mut IdentifierRegistry,
        case: &CaseId,
    ) -> SourceResult<Table> {
        for (column, value) in defaults.iter() {
            if table.has_column(column) {
                continue;
            }
            table = match value {
                ColumnValue::Literal(literal) => table.with_column(column, |_| literal.clone()),
                // Mapped columns are translated after filling, so they receive a
                // named id; other columns receive the concrete value directly.
                ColumnValue::Identifier(_) if self.identifier_map.contains(column) => {
                    table.with_column(column, |_| Some(registry.anonymous_named_id()))
                }
                ColumnValue::Identifier(reference) => table.try_with_column(column, |_| {
                    let named_id = registry.anonymous_named_id();
                    registry
                        .value(reference, case, Some(named_id.as_str()))
                        .map_err(|error| self.identifier_error(case, column, error))
                })?,
            };
        }
        Ok(table)
    }

    fn translate_identifiers(
        &self,
        mut table: Table,
        registry: &mut IdentifierRegistry,
        case: &CaseId,
    ) -> SourceResult<Table> {
        let missing: Vec<String> = self
            .identifier_map
            .columns()
            .filter(|column| !table.has_column(column))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::MissingIdentifyingColumns {
                name: self.name.clone(),
                case: case.clone(),
                columns: missing,
            });
        }

        for (column, reference) in self.identifier_map.iter() {
            table = table.try_map_column(column, |cell| match cell {
                None => Ok(None),
                Some(named_id) => registry
                    .value(reference, case, Some(named_id.as_str()))
                    .map_err(|error| self.identifier_error(case, column, error)),
            })?;
        }
        Ok(table)
    }

    fn identifier_error(&self, case: &CaseId, column: &str, error: IdentifierError) -> SourceError {
        SourceError::Identifier {
            name: self.name.clone(),
            case: case.clone(),
            column: column.to_string(),
            error,
        }
    }
}
