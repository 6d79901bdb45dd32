//! Factories: reusable bundles of source fragments.
//!
//! A factory maps source names to a table fragment plus override values.
//! Factories inherit: the parents' bundles are combined left to right and the
//! factory's own data is laid on top. For each source, the later table replaces
//! the earlier one outright while values merge column by column.

use std::collections::BTreeMap;

use tracing::debug;

use crate::identifier::{CaseId, IdentifierRegistry};
use crate::source::{ColumnValues, Source, SourceError};
use crate::table::{parse_markdown, Table, TableError};

/// Errors raised while building or generating a factory.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("Factory \"{factory}\", source \"{source_name}\": {error}")]
    BadTableFormat {
        factory: String,
        source_name: String,
        #[source]
        error: TableError,
    },

    #[error("Factory \"{factory}\" refers to unknown source \"{source_name}\"")]
    UnknownSource { factory: String, source_name: String },

    #[error(transparent)]
    Stack(#[from] SourceError),
}

pub type FactoryResult<T> = Result<T, FactoryError>;

/// The fragment and overrides one factory contributes to one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorySource {
    pub table: Option<Table>,
    pub values: ColumnValues,
}

/// Per-source bundles in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactoryData(Vec<(String, FactorySource)>);

impl FactoryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, data: FactorySource) {
        let source = source.into();
        match self.0.iter_mut().find(|(s, _)| *s == source) {
            Some(entry) => entry.1 = data,
            None => self.0.push((source, data)),
        }
    }

    pub fn get(&self, source: &str) -> Option<&FactorySource> {
        self.0.iter().find(|(s, _)| s == source).map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactorySource)> {
        self.0.iter().map(|(s, d)| (s.as_str(), d))
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(s, _)| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse raw table text per source.
    ///
    /// Tables are parsed here, so a malformed table fails at load time and
    /// names the factory and source it belongs to.
    pub fn from_tables<'a, I>(factory: &str, tables: I) -> FactoryResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>, ColumnValues)>,
    {
        let mut data = FactoryData::new();
        for (source, text, values) in tables {
            let table = text
                .map(parse_markdown)
                .transpose()
                .map_err(|error| FactoryError::BadTableFormat {
                    factory: factory.to_string(),
                    source_name: source.to_string(),
                    error,
                })?;
            data.insert(source, FactorySource { table, values });
        }
        Ok(data)
    }

    /// Lay `later` over `self`.
    pub fn merge(&self, later: &FactoryData) -> FactoryData {
        let mut merged = self.clone();
        for (source, data) in &later.0 {
            let combined = match merged.get(source) {
                Some(earlier) => FactorySource {
                    table: data.table.clone().or_else(|| earlier.table.clone()),
                    values: earlier.values.merged(&data.values),
                },
                None => data.clone(),
            };
            merged.insert(source.clone(), combined);
        }
        merged
    }
}

/// A named, composed bundle of source fragments.
#[derive(Debug, Clone)]
pub struct Factory {
    name: String,
    description: Option<String>,
    data: FactoryData,
}

impl Factory {
    pub fn new(name: impl Into<String>, data: FactoryData) -> Self {
        Self {
            name: name.into(),
            description: None,
            data,
        }
    }

    /// Build a factory from raw table text per source.
    pub fn from_tables<'a, I>(name: impl Into<String>, tables: I) -> FactoryResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>, ColumnValues)>,
    {
        let name = name.into();
        let data = FactoryData::from_tables(&name, tables)?;
        Ok(Self::new(name, data))
    }

    /// Compose `parents` (left to right) with `own` data on top.
    pub fn inherit(name: impl Into<String>, parents: &[&Factory], own: FactoryData) -> Self {
        let composed = parents
            .iter()
            .fold(FactoryData::new(), |acc, parent| acc.merge(&parent.data))
            .merge(&own);
        Self::new(name, composed)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn data(&self) -> &FactoryData {
        &self.data
    }

    /// Stack this factory's fragments onto `sources` for one case.
    pub fn generate(
        &self,
        registry: &mut IdentifierRegistry,
        case: &CaseId,
        sources: &mut BTreeMap<String, Source>,
    ) -> FactoryResult<()> {
        for (source_name, entry) in self.data.iter() {
            let source = sources
                .get_mut(source_name)
                .ok_or_else(|| FactoryError::UnknownSource {
                    factory: self.name.clone(),
                    source_name: source_name.to_string(),
                })?;

            let fragment = entry.table.clone().unwrap_or_default();
            let values = source.defaults().merged(&entry.values);
            source.stack(registry, case, &fragment, Some(&values))?;
        }
        debug!(factory = %self.name, case = %case, "generated factory data");
        Ok(())
    }
}
