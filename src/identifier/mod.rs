//! Identifiers and the registry that owns them.
//!
//! An [`Identifier`] is an entity type (e.g. `student`) whose attributes
//! (`id`, `uuid`, `external_id`, ...) each have a value generator. Tests refer
//! to entities by *named ids* (`"s1"`) that are only meaningful within one
//! case. The first time a `(case, named_id)` pair is seen, every attribute
//! gets a fresh concrete value; after that the same values are returned.
//!
//! ```text
//!  (case "C1", "s1") ──generate──▶ { id: "482913", uuid: "5b0e…" }
//!                    ◀───find───── ("id", "482913")
//! ```
//!
//! Concrete values are unique per attribute across all cases, so a value seen
//! in the output of a transformation identifies both the named id and the case
//! it came from.

mod case;
mod embedded;
mod generator;

pub use case::CaseId;
pub use embedded::translate_embedded;
pub use generator::{
    build_generator, generator_names, GeneratorArgs, IdGenerator, UniqueIdGenerator,
    UuidGenerator,
};

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors raised by identifiers and the registry.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("Unknown generator \"{generator}\" (known generators: {known})")]
    UnknownGenerator { generator: String, known: String },

    #[error("Invalid arguments for generator \"{generator}\": {reason}")]
    InvalidGeneratorArguments { generator: String, reason: String },

    #[error("Duplicate identifiers detected: {0}")]
    DuplicateIdentifier(String),

    #[error("Duplicate attribute \"{attribute}\" on identifier \"{identifier}\"")]
    DuplicateAttribute { identifier: String, attribute: String },

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Identifier \"{identifier}\" has no attribute \"{attribute}\"")]
    UnknownAttribute { identifier: String, attribute: String },

    #[error(
        "Unable to find named identifier for attribute \"{attribute}\" of identifier \"{identifier}\" and value \"{value}\""
    )]
    NotFound {
        identifier: String,
        attribute: String,
        value: String,
    },

    #[error(
        "Value \"{value}\" of attribute \"{attribute}\" of identifier \"{identifier}\" belongs to more than one named id: {owners}"
    )]
    AmbiguousValue {
        identifier: String,
        attribute: String,
        value: String,
        owners: String,
    },
}

pub type IdentifierResult<T> = Result<T, IdentifierError>;

/// Attribute values generated for one named id, keyed by attribute name.
pub type NamedValues = BTreeMap<String, String>;

/// Declaration of one identifier attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub generator: String,
    pub args: GeneratorArgs,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, generator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generator: generator.into(),
            args: GeneratorArgs::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Reference to one attribute of a named identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifierRef {
    #[serde(rename = "name")]
    pub identifier: String,
    pub attribute: String,
}

impl IdentifierRef {
    pub fn new(identifier: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            attribute: attribute.into(),
        }
    }
}

/// The owner of a concrete value: which case and named id it was generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub case: CaseId,
    pub named_id: String,
}

/// Columns of a source or target that hold identifier values, in declaration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap(Vec<(String, IdentifierRef)>);

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `column` to `identifier`, replacing an earlier mapping of the column.
    pub fn insert(&mut self, column: impl Into<String>, identifier: IdentifierRef) {
        let column = column.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = identifier,
            None => self.0.push((column, identifier)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, identifier: IdentifierRef) -> Self {
        self.insert(column, identifier);
        self
    }

    pub fn get(&self, column: &str) -> Option<&IdentifierRef> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, r)| r)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdentifierRef)> {
        self.0.iter().map(|(c, r)| (c.as_str(), r))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, IdentifierRef)> for IdentifierMap {
    fn from_iter<I: IntoIterator<Item = (String, IdentifierRef)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (column, identifier) in iter {
            map.insert(column, identifier);
        }
        map
    }
}

/// An entity type with generated attributes.
#[derive(Debug)]
pub struct Identifier {
    name: String,
    attributes: Vec<String>,
    generators: Vec<Box<dyn IdGenerator>>,
    cases: BTreeMap<CaseId, BTreeMap<String, NamedValues>>,
    owners: HashMap<String, HashMap<String, Vec<NamedRef>>>,
}

impl Identifier {
    /// Create an identifier, building one generator per attribute.
    ///
    /// Each generator gets its own rng derived from `rng`.
    pub fn new(
        name: impl Into<String>,
        attributes: &[AttributeSpec],
        rng: &mut StdRng,
    ) -> IdentifierResult<Self> {
        let name = name.into();
        let mut names = Vec::with_capacity(attributes.len());
        let mut generators = Vec::with_capacity(attributes.len());

        for attribute in attributes {
            if names.contains(&attribute.name) {
                return Err(IdentifierError::DuplicateAttribute {
                    identifier: name,
                    attribute: attribute.name.clone(),
                });
            }
            let generator = build_generator(
                &attribute.generator,
                &attribute.args,
                StdRng::from_rng(&mut *rng),
            )?;
            names.push(attribute.name.clone());
            generators.push(generator);
        }

        Ok(Self {
            name,
            attributes: names,
            generators,
            cases: BTreeMap::new(),
            owners: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute names in declaration order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }

    /// Values for `named_id` within `case`, generating them on first use.
    ///
    /// Returns `None` when there is no named id (null or empty): such a row
    /// has no identity and all of its attribute values stay null.
    pub fn generate(&mut self, case: &CaseId, named_id: Option<&str>) -> Option<&NamedValues> {
        let named_id = named_id.filter(|n| !n.is_empty())?;
        let named_ids = self.cases.entry(case.clone()).or_default();

        if !named_ids.contains_key(named_id) {
            let values: NamedValues = self
                .attributes
                .iter()
                .zip(self.generators.iter_mut())
                .map(|(attribute, generator)| (attribute.clone(), generator.next_value()))
                .collect();

            for (attribute, value) in &values {
                self.owners
                    .entry(attribute.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default()
                    .push(NamedRef {
                        case: case.clone(),
                        named_id: named_id.to_string(),
                    });
            }
            debug!(identifier = %self.name, case = %case, named_id, "generated identifier values");
            named_ids.insert(named_id.to_string(), values);
        }

        named_ids.get(named_id)
    }

    /// Value of one attribute for `named_id` within `case`.
    pub fn value(
        &mut self,
        case: &CaseId,
        named_id: Option<&str>,
        attribute: &str,
    ) -> IdentifierResult<Option<String>> {
        self.require_attribute(attribute)?;
        Ok(self
            .generate(case, named_id)
            .and_then(|values| values.get(attribute).cloned()))
    }

    /// Find which case and named id a concrete attribute value was generated for.
    pub fn find(&self, attribute: &str, value: &str) -> IdentifierResult<&NamedRef> {
        self.require_attribute(attribute)?;

        let owners = self
            .owners
            .get(attribute)
            .and_then(|values| values.get(value))
            .map(Vec::as_slice)
            .unwrap_or_default();

        match owners {
            [] => Err(IdentifierError::NotFound {
                identifier: self.name.clone(),
                attribute: attribute.to_string(),
                value: value.to_string(),
            }),
            [owner] => Ok(owner),
            many => Err(IdentifierError::AmbiguousValue {
                identifier: self.name.clone(),
                attribute: attribute.to_string(),
                value: value.to_string(),
                owners: many
                    .iter()
                    .map(|o| format!("{}[{}]", o.case, o.named_id))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Named ids generated so far for `case`.
    pub fn named_ids(&self, case: &CaseId) -> impl Iterator<Item = (&str, &NamedValues)> {
        self.cases
            .get(case)
            .into_iter()
            .flat_map(|named| named.iter().map(|(n, v)| (n.as_str(), v)))
    }

    fn require_attribute(&self, attribute: &str) -> IdentifierResult<()> {
        if self.has_attribute(attribute) {
            Ok(())
        } else {
            Err(IdentifierError::UnknownAttribute {
                identifier: self.name.clone(),
                attribute: attribute.to_string(),
            })
        }
    }
}

/// All identifiers of one spec, plus the rng everything random is drawn from.
///
/// The registry is owned by the run and passed by reference to sources,
/// factories and targets. With a seed, every generated value (including
/// anonymous named ids) repeats exactly from run to run.
#[derive(Debug)]
pub struct IdentifierRegistry {
    identifiers: BTreeMap<String, Identifier>,
    rng: StdRng,
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentifierRegistry {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            identifiers: BTreeMap::new(),
            rng,
        }
    }

    /// Declare an identifier. Names must be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        attributes: &[AttributeSpec],
    ) -> IdentifierResult<&mut Identifier> {
        let name = name.into();
        if self.identifiers.contains_key(&name) {
            return Err(IdentifierError::DuplicateIdentifier(name));
        }
        let identifier = Identifier::new(name.clone(), attributes, &mut self.rng)?;
        Ok(self.identifiers.entry(name).or_insert(identifier))
    }

    pub fn get(&self, name: &str) -> IdentifierResult<&Identifier> {
        self.identifiers
            .get(name)
            .ok_or_else(|| IdentifierError::UnknownIdentifier(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> IdentifierResult<&mut Identifier> {
        self.identifiers
            .get_mut(name)
            .ok_or_else(|| IdentifierError::UnknownIdentifier(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.identifiers.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.identifiers.values()
    }

    /// Check that `reference` names a declared identifier and attribute.
    pub fn validate(&self, reference: &IdentifierRef) -> IdentifierResult<()> {
        let identifier = self.get(&reference.identifier)?;
        identifier.require_attribute(&reference.attribute)
    }

    /// Forward translation: the concrete value of `reference` for a named id.
    pub fn value(
        &mut self,
        reference: &IdentifierRef,
        case: &CaseId,
        named_id: Option<&str>,
    ) -> IdentifierResult<Option<String>> {
        self.get_mut(&reference.identifier)?
            .value(case, named_id, &reference.attribute)
    }

    /// Reverse translation: the owner of a concrete value of `reference`.
    pub fn find(&self, reference: &IdentifierRef, value: &str) -> IdentifierResult<&NamedRef> {
        self.get(&reference.identifier)?
            .find(&reference.attribute, value)
    }

    /// A fresh opaque named id for rows that were given no identity.
    pub fn anonymous_named_id(&mut self) -> String {
        generator::random_uuid(&mut self.rng)
    }
}
