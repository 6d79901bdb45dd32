//! Run orchestration.
//!
//! [`Api`] turns a [`SpecDocument`] into live objects and drives a run:
//!
//! ```text
//!  SpecDocument ──new──▶ Api ──generate_sources──▶ source_data()  ──▶ (transform)
//!                                                                        │
//!  AssertionReport ◀──assert_expectations── Api ◀──load_actuals──────────┘
//! ```
//!
//! Every reference in the document is checked while building, before any data
//! is generated, so a bad spec fails fast with a [`ApiError::Duplicate`] or
//! [`ApiError::Referential`] error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info, warn};

use crate::config::GenerationSettings;
use crate::expectation::{CompareVia, DataExpectation, ExpectationError, ExpectationOptions};
use crate::factory::{Factory, FactoryData, FactoryError};
use crate::identifier::{AttributeSpec, CaseId, IdentifierError, IdentifierMap, IdentifierRegistry};
use crate::scenario::{Case, Scenario, ScenarioError};
use crate::source::{ColumnValue, ColumnValues, Source};
use crate::spec::{
    render_markdown, ActualsDocument, ColumnValueSpec, FactoryDataSpec, IdentifierMapSpec,
    InlineFactorySpec, ScenarioSpec, SpecDocument, SpecError,
};
use crate::table::Record;
use crate::target::{Target, TargetError};

/// Errors raised while building or running an [`Api`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Referential(String),

    #[error("Invalid spec: {0}")]
    Invalid(String),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Expectation(#[from] ExpectationError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Target(#[from] TargetError),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Run options.
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Seed for all generated values; `None` draws from the OS.
    pub seed: Option<u64>,
    pub anonymous_identifiers: bool,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            seed: None,
            anonymous_identifiers: true,
        }
    }
}

impl From<&GenerationSettings> for ApiOptions {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            seed: settings.seed,
            anonymous_identifiers: settings.anonymous_identifiers,
        }
    }
}

/// Outcome of asserting one case.
#[derive(Debug)]
pub struct CaseOutcome {
    pub case: CaseId,
    pub error: Option<ScenarioError>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of every case, in declaration order.
#[derive(Debug, Default)]
pub struct AssertionReport {
    outcomes: Vec<CaseOutcome>,
}

impl AssertionReport {
    pub fn outcomes(&self) -> &[CaseOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(CaseOutcome::passed)
    }
}

impl fmt::Display for AssertionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.error {
                None => writeln!(f, "Asserting {} PASSED", outcome.case)?,
                Some(error) => writeln!(f, "Asserting {} FAILED\n{}", outcome.case, error)?,
            }
        }
        write!(
            f,
            "{} passed, {} failed",
            self.passed(),
            self.outcomes.len() - self.passed()
        )
    }
}

/// A loaded spec and the state of one run.
#[derive(Debug)]
pub struct Api {
    spec: SpecDocument,
    registry: IdentifierRegistry,
    sources: BTreeMap<String, Source>,
    targets: BTreeMap<String, Target>,
    factories: BTreeMap<String, Factory>,
    scenarios: Vec<Scenario>,
}

impl Api {
    /// Validate `spec` and build the registry, sources, targets, factories and
    /// scenarios it declares.
    pub fn new(spec: SpecDocument, options: ApiOptions) -> ApiResult<Self> {
        let mut api = Self {
            spec: SpecDocument::default(),
            registry: IdentifierRegistry::new(options.seed),
            sources: BTreeMap::new(),
            targets: BTreeMap::new(),
            factories: BTreeMap::new(),
            scenarios: Vec::new(),
        };

        api.build_identifiers(&spec)?;
        api.build_sources(&spec, options.anonymous_identifiers)?;
        api.build_targets(&spec)?;
        api.build_factories(&spec)?;
        let mut case_ids = HashSet::new();
        for scenario in &spec.scenarios {
            let scenario = api.build_scenario(scenario)?;
            // Qualified names can collide across scenarios ("A: B" + "C" vs "A" + "B: C").
            if let Some(case) = scenario.cases().iter().find(|c| !case_ids.insert(c.id().clone())) {
                return Err(ApiError::Duplicate(format!(
                    "Duplicate case identities detected: {}",
                    case.id()
                )));
            }
            api.scenarios.push(scenario);
        }

        info!(
            identifiers = spec.identifiers.len(),
            sources = api.sources.len(),
            targets = api.targets.len(),
            factories = api.factories.len(),
            scenarios = api.scenarios.len(),
            "loaded spec"
        );
        api.spec = spec;
        Ok(api)
    }

    // =========================================================================
    // Run
    // =========================================================================

    /// Generate source data for every case of every scenario.
    pub fn generate_sources(&mut self) -> ApiResult<()> {
        for scenario in &self.scenarios {
            debug!(scenario = scenario.name(), cases = scenario.cases().len(), "generating scenario");
            scenario.generate(&mut self.registry, &mut self.sources)?;
        }
        info!(sources = self.sources.len(), "generated source data");
        Ok(())
    }

    /// Generated rows per source.
    pub fn source_data(&self) -> BTreeMap<String, Vec<Record>> {
        self.sources
            .iter()
            .map(|(name, source)| (name.clone(), source.serialize()))
            .collect()
    }

    /// Load the actual results of the transformation, per target.
    pub fn load_actuals(&mut self, actuals: &ActualsDocument) -> ApiResult<()> {
        for (name, data) in actuals {
            let target = self.targets.get_mut(name).ok_or_else(|| {
                ApiError::Referential(format!("Unable to find target \"{}\" in actuals", name))
            })?;
            info!(target_name = %name, records = data.records.len(), "loading actuals");
            target.load_actual(&self.registry, &data.records, data.columns.as_deref())?;
        }
        Ok(())
    }

    /// Assert every case. Failures are collected, never propagated.
    pub fn assert_expectations(&mut self) -> AssertionReport {
        let mut report = AssertionReport::default();
        for scenario in &self.scenarios {
            for case in scenario.cases() {
                let result = case.assert_expectations(&mut self.registry, &self.targets);
                match &result {
                    Ok(()) => info!(case = %case.id(), "PASSED"),
                    Err(error) => warn!(case = %case.id(), %error, "FAILED"),
                }
                report.outcomes.push(CaseOutcome {
                    case: case.id().clone(),
                    error: result.err(),
                });
            }
        }
        report
    }

    /// Markdown documentation of the loaded spec.
    pub fn to_markdown(&self) -> String {
        render_markdown(&self.spec)
    }

    pub fn spec(&self) -> &SpecDocument {
        &self.spec
    }

    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn factory(&self, name: &str) -> Option<&Factory> {
        self.factories.get(name)
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    // =========================================================================
    // Building
    // =========================================================================

    fn build_identifiers(&mut self, spec: &SpecDocument) -> ApiResult<()> {
        for identifier in &spec.identifiers {
            if self.registry.contains(&identifier.identifier) {
                return Err(ApiError::Duplicate(format!(
                    "Duplicate identifiers detected: {}",
                    identifier.identifier
                )));
            }
            let attributes: Vec<AttributeSpec> = identifier
                .attributes
                .iter()
                .map(|a| AttributeSpec {
                    name: a.field.clone(),
                    generator: a.generator.clone(),
                    args: a.args.clone(),
                })
                .collect();
            self.registry.register(&identifier.identifier, &attributes)?;
        }
        Ok(())
    }

    fn build_sources(&mut self, spec: &SpecDocument, anonymous_identifiers: bool) -> ApiResult<()> {
        for source in &spec.sources {
            if self.sources.contains_key(&source.source) {
                return Err(ApiError::Duplicate(format!(
                    "Duplicate sources detected: {}",
                    source.source
                )));
            }
            let context = format!("source: \"{}\"", source.source);
            let mut built = Source::new(&source.source)
                .with_defaults(self.column_values(&source.defaults, &context)?)
                .with_identifier_map(self.identifier_map(&source.identifier_map, &context)?)
                .with_anonymous_identifiers(anonymous_identifiers);
            if let Some(description) = &source.description {
                built = built.with_description(description);
            }
            self.sources.insert(source.source.clone(), built);
        }
        Ok(())
    }

    fn build_targets(&mut self, spec: &SpecDocument) -> ApiResult<()> {
        for target in &spec.targets {
            if self.targets.contains_key(&target.target) {
                return Err(ApiError::Duplicate(format!(
                    "Duplicate targets detected: {}",
                    target.target
                )));
            }
            let context = format!("target: \"{}\"", target.target);
            let mut built = Target::new(&target.target)
                .with_identifier_map(self.identifier_map(&target.identifier_map, &context)?);
            if let Some(description) = &target.description {
                built = built.with_description(description);
            }
            self.targets.insert(target.target.clone(), built);
        }
        Ok(())
    }

    /// Build factories parents first, whatever order they are declared in.
    fn build_factories(&mut self, spec: &SpecDocument) -> ApiResult<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for factory in &spec.factories {
            if nodes.contains_key(factory.factory.as_str()) {
                return Err(ApiError::Duplicate(format!(
                    "Duplicate factories detected: {}",
                    factory.factory
                )));
            }
            nodes.insert(&factory.factory, graph.add_node(&factory.factory));
        }
        for factory in &spec.factories {
            let child = nodes[factory.factory.as_str()];
            for parent in &factory.parents {
                let parent = nodes.get(parent.as_str()).ok_or_else(|| {
                    ApiError::Referential(format!(
                        "Unable to find parent factory \"{}\" referenced in factory \"{}\"",
                        parent, factory.factory
                    ))
                })?;
                graph.add_edge(*parent, child, ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            ApiError::Referential(format!(
                "Factory inheritance cycle involving \"{}\"",
                graph[cycle.node_id()]
            ))
        })?;

        let by_name: HashMap<&str, _> = spec
            .factories
            .iter()
            .map(|f| (f.factory.as_str(), f))
            .collect();
        for index in order {
            let declared = by_name[graph[index]];
            let own = self.factory_data(&declared.data, &declared.factory)?;
            let parents = self.parents(&declared.parents, &declared.factory)?;
            let mut factory = Factory::inherit(&declared.factory, &parents, own);
            if let Some(description) = &declared.description {
                factory = factory.with_description(description);
            }
            debug!(factory = %declared.factory, parents = declared.parents.len(), "built factory");
            self.factories.insert(declared.factory.clone(), factory);
        }
        Ok(())
    }

    fn build_scenario(&self, spec: &ScenarioSpec) -> ApiResult<Scenario> {
        if self.scenarios.iter().any(|s| s.name() == spec.scenario) {
            return Err(ApiError::Duplicate(format!(
                "Duplicate scenarios detected: {}",
                spec.scenario
            )));
        }

        let scenario_factory = spec
            .factory
            .as_ref()
            .map(|inline| {
                self.inline_factory(inline, &[], &format!("Factory for Scenario {}", spec.scenario))
            })
            .transpose()?;

        let mut scenario = Scenario::new(&spec.scenario);
        if let Some(description) = &spec.description {
            scenario = scenario.with_description(description);
        }

        let mut seen = HashSet::new();
        for case_spec in &spec.cases {
            if !seen.insert(case_spec.case.as_str()) {
                return Err(ApiError::Duplicate(format!(
                    "Duplicate cases detected in scenario \"{}\": {}",
                    spec.scenario, case_spec.case
                )));
            }

            let factory_name = format!("<Case Factory> {}: {}", spec.scenario, case_spec.case);
            let inherited: Vec<&Factory> = scenario_factory.iter().collect();
            let factory = self.inline_factory(
                &case_spec.factory.clone().unwrap_or_default(),
                &inherited,
                &factory_name,
            )?;

            let mut case = Case::new(&spec.scenario, &case_spec.case, factory);
            if let Some(description) = &case_spec.description {
                case = case.with_description(description);
            }
            for expected in &case_spec.expected.data {
                if !self.targets.contains_key(&expected.target) {
                    return Err(ApiError::Referential(format!(
                        "Unable to find target \"{}\" referenced in expectation of case \"{}\"",
                        expected.target,
                        case.id()
                    )));
                }
                let options = ExpectationOptions {
                    values: self.constants(&expected.values, &expected.target)?,
                    by: expected.by.clone(),
                    compare_via: expected
                        .compare_via
                        .as_deref()
                        .map(str::parse::<CompareVia>)
                        .transpose()?,
                };
                case = case.with_expectation(DataExpectation::new(
                    &expected.target,
                    &expected.table,
                    options,
                )?);
            }
            scenario.add_case(case)?;
        }
        Ok(scenario)
    }

    /// The factory of a scenario or case: `inherited` first, then named
    /// parents, then its own data.
    fn inline_factory(
        &self,
        inline: &InlineFactorySpec,
        inherited: &[&Factory],
        name: &str,
    ) -> ApiResult<Factory> {
        let mut parents = inherited.to_vec();
        parents.extend(self.parents(&inline.parents, name)?);
        let own = self.factory_data(&inline.data, name)?;
        Ok(Factory::inherit(name, &parents, own))
    }

    fn parents(&self, names: &[String], factory: &str) -> ApiResult<Vec<&Factory>> {
        names
            .iter()
            .map(|parent| {
                self.factories.get(parent).ok_or_else(|| {
                    ApiError::Referential(format!(
                        "Unable to find parent factory \"{}\" referenced in factory \"{}\"",
                        parent, factory
                    ))
                })
            })
            .collect()
    }

    fn factory_data(&self, data: &[FactoryDataSpec], factory: &str) -> ApiResult<FactoryData> {
        let mut tables = Vec::with_capacity(data.len());
        for entry in data {
            if !self.sources.contains_key(&entry.source) {
                return Err(ApiError::Referential(format!(
                    "Unable to find source \"{}\" referenced in factory \"{}\"",
                    entry.source, factory
                )));
            }
            let context = format!("factory: \"{}\"", factory);
            let values = self.column_values(&entry.values, &context)?;
            tables.push((entry.source.as_str(), entry.table.as_deref(), values));
        }
        Ok(FactoryData::from_tables(factory, tables)?)
    }

    fn identifier_map(&self, entries: &[IdentifierMapSpec], context: &str) -> ApiResult<IdentifierMap> {
        let mut map = IdentifierMap::new();
        for entry in entries {
            self.validate_reference(&entry.identifier, context)?;
            map.insert(&entry.column, entry.identifier.clone());
        }
        Ok(map)
    }

    fn column_values(&self, entries: &[ColumnValueSpec], context: &str) -> ApiResult<ColumnValues> {
        let mut values = ColumnValues::new();
        for entry in entries {
            let value = match (&entry.value, &entry.identifier) {
                (Some(_), Some(_)) => {
                    return Err(ApiError::Invalid(format!(
                        "column \"{}\" in {} has both a value and an identifier",
                        entry.column, context
                    )))
                }
                (_, Some(reference)) => {
                    self.validate_reference(reference, context)?;
                    ColumnValue::Identifier(reference.clone())
                }
                (Some(literal), None) => ColumnValue::literal(literal),
                (None, None) => ColumnValue::Literal(None),
            };
            values.insert(&entry.column, value);
        }
        Ok(values)
    }

    /// Expectation constants are plain values.
    fn constants(&self, entries: &[ColumnValueSpec], target: &str) -> ApiResult<Vec<(String, String)>> {
        entries
            .iter()
            .map(|entry| match (&entry.value, &entry.identifier) {
                (_, Some(_)) => Err(ApiError::Invalid(format!(
                    "expected value for column \"{}\" of target \"{}\" cannot be an identifier",
                    entry.column, target
                ))),
                (value, None) => Ok((
                    entry.column.clone(),
                    value.clone().unwrap_or_else(|| crate::table::NULL_TOKEN.to_string()),
                )),
            })
            .collect()
    }

    fn validate_reference(
        &self,
        reference: &crate::identifier::IdentifierRef,
        context: &str,
    ) -> ApiResult<()> {
        self.registry.validate(reference).map_err(|error| match error {
            IdentifierError::UnknownIdentifier(name) => ApiError::Referential(format!(
                "Unable to find identifier \"{}\" referenced in {}",
                name, context
            )),
            IdentifierError::UnknownAttribute {
                identifier,
                attribute,
            } => ApiError::Referential(format!(
                "Identifier attribute \"{}\" referenced in {} not present for identifier \"{}\"",
                attribute, context, identifier
            )),
            other => ApiError::Identifier(other),
        })
    }
}
