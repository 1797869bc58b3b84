//! Execution: tool boundary, sequential executor, engine facade

pub mod boundary;
pub mod engine;
pub mod executor;

pub use boundary::{BoundaryError, McpHttpBoundary, ToolBoundary, ToolResult};
pub use engine::{Engine, PreparedPlan};
pub use executor::{CallOutcome, CallRecord, ExecMode, ExecState, ExecutionReport, Executor};
