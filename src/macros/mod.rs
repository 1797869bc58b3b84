//! Macro definitions and deterministic expansion

pub mod library;
pub mod registry;

pub use library::builtin_registry;
pub use registry::{MacroDef, MacroRegistry, ParamSpec};
