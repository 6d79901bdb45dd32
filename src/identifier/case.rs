use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one test case.
///
/// Cases are keyed by an explicit value (their qualified name, e.g.
/// `"Enrollment: new student"`) so that generated data can be attributed to a
/// case without relying on object identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Qualified id for a case declared inside a scenario.
    pub fn qualified(scenario: &str, case: &str) -> Self {
        Self(format!("{}: {}", scenario, case))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CaseId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CaseId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
