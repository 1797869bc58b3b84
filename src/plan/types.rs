//! Plan document data model
//!
//! A plan is the declarative contract between the LLM planner and the
//! execution engine: the planner writes it once, the engine interprets it.
//! The engine never mutates a plan in place; corrections arrive as patch
//! documents that produce a new plan revision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::types::JsonMap;

/// Root plan document (`plan_v1`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Document version tag; must match a supported version
    pub version: String,
    /// Stable identifier, referenced by patch documents
    pub id: String,
    /// Bumped by the patch applier; a fresh plan starts at 0
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub policy: Policy,
    /// Named literal values referenced from step args as `"$name"`
    #[serde(default)]
    pub vars: JsonMap,
    /// Free-text notes the planner records instead of asking questions
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Execution order; not reorderable
    pub sequence: Vec<Step>,
}

impl Plan {
    /// Position of a step by id, if present
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.sequence.iter().position(|s| s.id == id)
    }
}

/// One unit of a plan: a primitive tool invocation or a macro invocation
///
/// Exactly one of `tool` / `macro` must be set; the schema validator
/// rejects anything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(rename = "macro", default, skip_serializing_if = "Option::is_none")]
    pub macro_name: Option<String>,
    #[serde(default)]
    pub args: JsonMap,
    /// Bind this step's result under the given variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_as: Option<String>,
    /// Non-empty justification downgrades certain policy violations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Per-step failure override; defaults to aborting the sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,
    /// Planner annotation, ignored by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Step kind, borrowed from a structurally valid step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind<'a> {
    Tool(&'a str),
    Macro(&'a str),
}

impl Step {
    /// Construct a primitive step (used by macro expansion)
    pub fn primitive(id: impl Into<String>, tool: impl Into<String>, args: JsonMap) -> Self {
        Self {
            id: id.into(),
            tool: Some(tool.into()),
            macro_name: None,
            args,
            save_as: None,
            justification: None,
            on_error: None,
            comment: None,
        }
    }

    /// Kind of this step, or `None` when it is ambiguous (both or neither
    /// of `tool`/`macro` present). Ambiguity is a schema violation, so
    /// post-validation code can rely on `Some`.
    pub fn kind(&self) -> Option<StepKind<'_>> {
        match (self.tool.as_deref(), self.macro_name.as_deref()) {
            (Some(t), None) => Some(StepKind::Tool(t)),
            (None, Some(m)) => Some(StepKind::Macro(m)),
            _ => None,
        }
    }

    /// Whether the step carries a non-empty justification
    pub fn has_justification(&self) -> bool {
        self.justification
            .as_deref()
            .map(|j| !j.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Per-step failure handling, from the plan document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Halt the sequence at this step (default)
    Abort,
    /// Record the failure and move to the next step
    Continue,
}

/// Plan-level policy record; every rule is independently togglable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    /// Scale-type operations are violations unless whitelisted or justified
    #[serde(default = "default_true")]
    pub avoid_scale: bool,
    /// Entity kinds (e.g. "symbol", "table") for which scaling is acceptable
    #[serde(default)]
    pub scale_allow_kinds: BTreeSet<String>,
    /// Tools that must not appear in the expanded sequence
    #[serde(default)]
    pub forbid_tools: BTreeSet<String>,
    /// Layer-assignment discipline for entity-creation steps
    #[serde(default)]
    pub explicit_layer: LayerDiscipline,
    /// How a prior layer activation is matched against a creation step
    #[serde(default)]
    pub layer_match: LayerMatch,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            avoid_scale: true,
            scale_allow_kinds: BTreeSet::new(),
            forbid_tools: BTreeSet::new(),
            explicit_layer: LayerDiscipline::Off,
            layer_match: LayerMatch::AnyPreceding,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Which layer discipline entity-creation steps must satisfy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerDiscipline {
    /// Rule disabled
    #[default]
    Off,
    /// A `set_current_layer` step targeting the same layer must precede
    /// the creation step
    ActivationBefore,
    /// The creation step itself must carry a `layer` argument
    LayerArg,
}

/// Whether any preceding activation counts, or only the nearest one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerMatch {
    #[default]
    AnyPreceding,
    NearestPreceding,
}
