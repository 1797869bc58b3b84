//! Draftplan - Declarative Drafting-Plan Execution Engine

pub mod adapter;
pub mod core;
pub mod exec;
pub mod macros;
pub mod patch;
pub mod plan;
pub mod qa;
pub mod vars;
