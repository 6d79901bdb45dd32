//! # dtspec
//!
//! Spec-driven test data for data transformations.
//!
//! ## Architecture
//!
//! A spec declares identifiers, sources, targets, factories and scenarios.
//! dtspec generates source data for every case, hands it to an external
//! transformation, and checks the transformation's output case by case:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Spec document (JSON / TOML)                   │
//! │  (identifiers, sources, targets, factories, scenarios)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [Api::new - validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Scenario → Case → Factory.generate(case)               │
//! │                        │                                 │
//! │                        ▼                                 │
//! │   Source.stack(case, fragment)  ◀──▶ IdentifierRegistry  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [source_data - external transform runs]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Target.load_actual(rows)  ◀──find── IdentifierRegistry │
//! │   Target.case_data(case)                                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [assert_expectations]
//! ┌─────────────────────────────────────────────────────────┐
//! │   DataExpectation (exact / sorted / keys)                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Test authors write named ids (`s1`) in their tables. The registry swaps
//! them for concrete values that are unique across every case, so the rows of
//! all cases can share one set of source tables and the output can still be
//! split back into cases without an explicit case column.

pub mod api;
pub mod config;
pub mod expectation;
pub mod factory;
pub mod identifier;
pub mod scenario;
pub mod source;
pub mod spec;
pub mod table;
pub mod target;

pub use api::{Api, ApiError, ApiOptions, AssertionReport, CaseOutcome};
pub use identifier::{CaseId, IdentifierRef, IdentifierRegistry};
pub use spec::SpecDocument;
pub use table::{Table, NULL_TOKEN};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::api::{Api, ApiError, ApiOptions, AssertionReport};
    pub use crate::expectation::{CompareVia, DataExpectation, ExpectationOptions};
    pub use crate::factory::{Factory, FactoryData, FactorySource};
    pub use crate::identifier::{
        AttributeSpec, CaseId, IdentifierMap, IdentifierRef, IdentifierRegistry,
    };
    pub use crate::scenario::{Case, Scenario};
    pub use crate::source::{ColumnValue, ColumnValues, Source};
    pub use crate::spec::SpecDocument;
    pub use crate::table::{Table, NULL_TOKEN};
    pub use crate::target::Target;
}
