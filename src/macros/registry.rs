//! Macro registry and all-or-nothing sequence expansion
//!
//! Expansion is a pure transformation: a macro sees only its declared
//! parameters and the invoking step's id. It never touches the variable
//! store or the tool boundary, so `$name` references inside macro args pass
//! through unresolved and are handled later by the executor, at the correct
//! position in the sequence.

use std::collections::HashMap;

use crate::core::error::{EngineError, Result};
use crate::core::types::JsonMap;
use crate::plan::types::{Step, StepKind};

/// Declared macro parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// A named, versioned macro template
///
/// `expand` must be deterministic for the same `(args, step_id)` input: no
/// randomness, no clocks, no external calls. Child step ids derive from the
/// invoking step's id plus a positional suffix, so re-expansion yields
/// byte-identical output.
pub trait MacroDef: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "1"
    }

    fn params(&self) -> &'static [ParamSpec];

    fn expand(&self, args: &JsonMap, step_id: &str) -> Result<Vec<Step>>;
}

#[derive(Default)]
pub struct MacroRegistry {
    macros: HashMap<&'static str, Box<dyn MacroDef>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: Box<dyn MacroDef>) {
        self.macros.insert(def.name(), def);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Expand one macro step after validating its args against the
    /// declared parameters
    pub fn expand(&self, name: &str, args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let def = self
            .macros
            .get(name)
            .ok_or_else(|| EngineError::UnknownMacro {
                step_id: step_id.to_string(),
                name: name.to_string(),
            })?;

        let params = def.params();
        for param in params {
            if param.required && !args.contains_key(param.name) {
                return Err(EngineError::MacroArgs {
                    step_id: step_id.to_string(),
                    message: format!("macro '{name}' missing required param '{}'", param.name),
                });
            }
        }
        for key in args.keys() {
            if !params.iter().any(|p| p.name == key) {
                return Err(EngineError::MacroArgs {
                    step_id: step_id.to_string(),
                    message: format!("macro '{name}' does not declare param '{key}'"),
                });
            }
        }

        def.expand(args, step_id)
    }

    /// Rewrite a plan sequence into primitive steps.
    ///
    /// Unknown macro names are reported before any expansion is attempted,
    /// so expansion is all-or-nothing for a given plan.
    pub fn expand_sequence(&self, sequence: &[Step]) -> Result<Vec<Step>> {
        for step in sequence {
            if let Some(StepKind::Macro(name)) = step.kind() {
                if !self.contains(name) {
                    return Err(EngineError::UnknownMacro {
                        step_id: step.id.clone(),
                        name: name.to_string(),
                    });
                }
            }
        }

        let mut expanded = Vec::with_capacity(sequence.len());
        for step in sequence {
            match step.kind() {
                Some(StepKind::Macro(name)) => {
                    expanded.extend(self.expand(name, &step.args, &step.id)?);
                }
                _ => expanded.push(step.clone()),
            }
        }
        Ok(expanded)
    }
}
