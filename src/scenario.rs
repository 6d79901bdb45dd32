//! Scenarios group cases; a case pairs one composed factory with the
//! expectations checked against the targets afterwards.

use std::collections::BTreeMap;

use tracing::debug;

use crate::expectation::{DataExpectation, ExpectationError};
use crate::factory::{Factory, FactoryError};
use crate::identifier::{CaseId, IdentifierRegistry};
use crate::source::Source;
use crate::target::Target;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Duplicate cases detected in scenario \"{scenario}\": {case}")]
    DuplicateCase { scenario: String, case: String },

    #[error("Case \"{case}\" expects data from unknown target \"{target}\"")]
    UnknownTarget { case: CaseId, target: String },

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Expectation(#[from] ExpectationError),
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// One test case: the data it contributes and what it expects back.
#[derive(Debug, Clone)]
pub struct Case {
    id: CaseId,
    name: String,
    description: Option<String>,
    factory: Factory,
    expectations: Vec<DataExpectation>,
}

impl Case {
    /// Create a case of `scenario`. Its identity is the qualified name.
    pub fn new(scenario: &str, name: impl Into<String>, factory: Factory) -> Self {
        let name = name.into();
        Self {
            id: CaseId::qualified(scenario, &name),
            name,
            description: None,
            factory,
            expectations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_expectation(mut self, expectation: DataExpectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    pub fn id(&self) -> &CaseId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn expectations(&self) -> &[DataExpectation] {
        &self.expectations
    }

    pub fn generate(
        &self,
        registry: &mut IdentifierRegistry,
        sources: &mut BTreeMap<String, Source>,
    ) -> ScenarioResult<()> {
        self.factory.generate(registry, &self.id, sources)?;
        Ok(())
    }

    /// Check every expectation against the case's slice of its target. Stops at
    /// the first failure.
    pub fn assert_expectations(
        &self,
        registry: &mut IdentifierRegistry,
        targets: &BTreeMap<String, Target>,
    ) -> ScenarioResult<()> {
        for expectation in &self.expectations {
            let target = targets
                .get(expectation.target())
                .ok_or_else(|| ScenarioError::UnknownTarget {
                    case: self.id.clone(),
                    target: expectation.target().to_string(),
                })?;
            let actual = target.case_data(&self.id);
            debug!(case = %self.id, target_name = target.name(), rows = actual.len(), "asserting expectation");
            expectation.assert_expected(&actual, &self.id, registry)?;
        }
        Ok(())
    }
}

/// A named group of cases sharing a common setup.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    description: Option<String>,
    cases: Vec<Case>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            cases: Vec::new(),
        }
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

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn add_case(&mut self, case: Case) -> ScenarioResult<()> {
        if self.cases.iter().any(|c| c.name == case.name) {
            return Err(ScenarioError::DuplicateCase {
                scenario: self.name.clone(),
                case: case.name,
            });
        }
        self.cases.push(case);
        Ok(())
    }

    /// Generate source data for every case, in declaration order.
    pub fn generate(
        &self,
        registry: &mut IdentifierRegistry,
        sources: &mut BTreeMap<String, Source>,
    ) -> ScenarioResult<()> {
        for case in &self.cases {
            case.generate(registry, sources)?;
        }
        Ok(())
    }
}
