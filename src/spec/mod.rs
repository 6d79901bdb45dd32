//! The declarative spec document.
//!
//! A spec is written in JSON (or TOML, chosen by file extension) and describes
//! identifiers, sources, targets, factories and scenarios. These types mirror
//! the document one to one; [`crate::Api`] validates the references between
//! them and builds the runtime objects.
//!
//! ```json
//! {
//!   "version": "0.1",
//!   "identifiers": [
//!     {"identifier": "student", "attributes": [{"field": "id", "generator": "unique_integer"}]}
//!   ],
//!   "sources": [
//!     {"source": "raw_students",
//!      "identifier_map": [{"column": "id", "identifier": {"name": "student", "attribute": "id"}}]}
//!   ],
//!   "targets": [ ... ],
//!   "factories": [ ... ],
//!   "scenarios": [ ... ]
//! }
//! ```

mod docs;

pub use docs::render_markdown;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifier::IdentifierRef;
use crate::table::Record;

/// Errors raised while reading a spec or actuals document.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported file extension (expected .json or .toml): {0}")]
    UnsupportedExtension(PathBuf),

    #[error("Invalid selector: {0}")]
    InvalidSelector(#[from] regex::Error),
}

pub type SpecResult<T> = Result<T, SpecError>;

/// Root of a spec document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<IdentifierSpec>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub factories: Vec<FactorySpec>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifierSpec {
    pub identifier: String,
    pub attributes: Vec<AttributeDecl>,
}

/// An attribute and its generator. Any other keys are generator arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub field: String,
    pub generator: String,
    #[serde(flatten)]
    pub args: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaults: Vec<ColumnValueSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier_map: Vec<IdentifierMapSpec>,
}

/// A column assignment: a literal `value` (null when absent) or an `identifier`
/// directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnValueSpec {
    pub column: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<IdentifierRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifierMapSpec {
    pub column: String,
    pub identifier: IdentifierRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier_map: Vec<IdentifierMapSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactorySpec {
    pub factory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<FactoryDataSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactoryDataSpec {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ColumnValueSpec>,
}

/// The anonymous factory of a scenario or case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineFactorySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<FactoryDataSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    pub scenario: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<InlineFactorySpec>,
    pub cases: Vec<CaseSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseSpec {
    pub case: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<InlineFactorySpec>,
    pub expected: ExpectedSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedSpec {
    #[serde(default)]
    pub data: Vec<ExpectationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationSpec {
    pub target: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ColumnValueSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_via: Option<String>,
}

/// Actual rows for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetActuals {
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Actual results keyed by target name.
pub type ActualsDocument = BTreeMap<String, TargetActuals>;

impl SpecDocument {
    /// Read a spec from a `.json` or `.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> SpecResult<Self> {
        let path = path.as_ref();
        let content = read(path)?;
        match extension(path).as_deref() {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(SpecError::UnsupportedExtension(path.to_path_buf())),
        }
    }

    pub fn from_json_str(content: &str) -> SpecResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> SpecResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Keep only the scenarios and cases whose names match the selectors
    /// (regex search), and only the targets the remaining cases expect.
    pub fn select(mut self, scenarios: Option<&str>, cases: Option<&str>) -> SpecResult<Self> {
        let scenario_selector = scenarios.map(Regex::new).transpose()?;
        let case_selector = cases.map(Regex::new).transpose()?;

        self.scenarios.retain(|scenario| {
            scenario_selector
                .as_ref()
                .map_or(true, |re| re.is_match(&scenario.scenario))
        });
        for scenario in &mut self.scenarios {
            scenario
                .cases
                .retain(|case| case_selector.as_ref().map_or(true, |re| re.is_match(&case.case)));
        }

        let expected_targets: Vec<&str> = self
            .scenarios
            .iter()
            .flat_map(|s| &s.cases)
            .flat_map(|c| &c.expected.data)
            .map(|e| e.target.as_str())
            .collect();
        let targets = self
            .targets
            .iter()
            .filter(|t| expected_targets.contains(&t.target.as_str()))
            .cloned()
            .collect();
        self.targets = targets;

        Ok(self)
    }
}

/// Read an actuals document (`{target: {records, columns?}}`) from a JSON file.
pub fn actuals_from_file(path: impl AsRef<Path>) -> SpecResult<ActualsDocument> {
    let path = path.as_ref();
    let content = read(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn read(path: &Path) -> SpecResult<String> {
    fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
