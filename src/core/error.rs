use thiserror::Error;

use crate::plan::policy::Finding;
use crate::plan::schema::SchemaViolation;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("schema validation failed ({} violations)", .0.len())]
    Schema(Vec<SchemaViolation>),

    #[error("policy validation failed ({} violations)", .0.len())]
    Policy(Vec<Finding>),

    #[error("unresolved variable ${name} in step {step_id}")]
    UnresolvedVariable { step_id: String, name: String },

    #[error("unknown macro '{name}' in step {step_id}")]
    UnknownMacro { step_id: String, name: String },

    #[error("bad macro args in step {step_id}: {message}")]
    MacroArgs { step_id: String, message: String },

    #[error("args map error: {0}")]
    ArgsMap(String),

    #[error("unknown transform '{name}' referenced for tool '{tool}'")]
    UnknownTransform { tool: String, name: String },

    #[error("transform '{name}' failed: {message}")]
    TransformFailed { name: String, message: String },

    #[error("expanded plan has {count} steps (limit {max})")]
    PlanTooLarge { count: usize, max: usize },

    #[error("boundary call failed at step {step_id} ({tool}): {message}")]
    Boundary {
        step_id: String,
        tool: String,
        message: String,
    },

    #[error("patch conflict: {0}")]
    PatchConflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
