//! Plan data model and validation

pub mod catalog;
pub mod policy;
pub mod schema;
pub mod types;

pub use policy::{Finding, PolicyReport, PolicyRule, PolicyValidator, Severity};
pub use schema::{parse_plan, validate_plan_doc, SchemaViolation};
pub use types::{LayerDiscipline, LayerMatch, OnError, Plan, Policy, Step, StepKind};
