//! Patch documents and transactional application
//!
//! A patch is the planner's (or the QA loop's) correction vehicle: the plan
//! itself is never edited in place. Applying a patch yields a new plan value
//! with the revision bumped; any conflict rejects the whole patch and the
//! original plan is returned to the caller untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::error::{EngineError, Result};
use crate::core::types::PATCH_VERSION;
use crate::plan::types::{Plan, Step};

/// Correction document (`patch_v1`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchDocument {
    pub version: String,
    pub target_plan_id: String,
    pub ops: Vec<PatchOp>,
}

impl PatchDocument {
    pub fn new(target_plan_id: impl Into<String>, ops: Vec<PatchOp>) -> Self {
        Self {
            version: PATCH_VERSION.to_string(),
            target_plan_id: target_plan_id.into(),
            ops,
        }
    }
}

/// One whole-step edit, addressed by step id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    InsertAfter {
        after_step_id: String,
        steps: Vec<Step>,
    },
    Replace {
        step_id: String,
        step: Step,
    },
    Delete {
        step_id: String,
    },
}

/// Apply `patch` to `plan`, producing a new plan at `revision + 1`.
///
/// Ops resolve against the current state of the sequence, so later ops in
/// one patch see the effect of earlier ones. Any unknown step id, version
/// mismatch, target mismatch, or resulting duplicate id is a
/// `PatchConflict` and nothing is applied.
pub fn apply(plan: &Plan, patch: &PatchDocument) -> Result<Plan> {
    if patch.version != PATCH_VERSION {
        return Err(EngineError::PatchConflict(format!(
            "unsupported patch version '{}'",
            patch.version
        )));
    }
    if patch.target_plan_id != plan.id {
        return Err(EngineError::PatchConflict(format!(
            "patch targets plan '{}', not '{}'",
            patch.target_plan_id, plan.id
        )));
    }

    let mut next = plan.clone();
    for op in &patch.ops {
        apply_op(&mut next, op)?;
    }

    let mut seen = HashSet::new();
    for step in &next.sequence {
        if !seen.insert(step.id.as_str()) {
            return Err(EngineError::PatchConflict(format!(
                "patch would duplicate step id '{}'",
                step.id
            )));
        }
    }

    next.revision = plan.revision + 1;
    Ok(next)
}

fn apply_op(plan: &mut Plan, op: &PatchOp) -> Result<()> {
    let missing = |id: &str| EngineError::PatchConflict(format!("no step with id '{id}'"));
    match op {
        PatchOp::InsertAfter {
            after_step_id,
            steps,
        } => {
            let at = plan
                .step_index(after_step_id)
                .ok_or_else(|| missing(after_step_id))?;
            plan.sequence.splice(at + 1..at + 1, steps.iter().cloned());
        }
        PatchOp::Replace { step_id, step } => {
            let at = plan.step_index(step_id).ok_or_else(|| missing(step_id))?;
            plan.sequence[at] = step.clone();
        }
        PatchOp::Delete { step_id } => {
            let at = plan.step_index(step_id).ok_or_else(|| missing(step_id))?;
            plan.sequence.remove(at);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{JsonMap, PLAN_VERSION};
    use serde_json::json;

    fn step(id: &str, tool: &str) -> Step {
        Step::primitive(id, tool, JsonMap::new())
    }

    fn plan() -> Plan {
        serde_json::from_value(json!({
            "version": PLAN_VERSION,
            "id": "p-1",
            "sequence": [
                {"id": "s1", "tool": "create_layer", "args": {"name": "Walls"}},
                {"id": "s2", "tool": "zoom_extents", "args": {}},
                {"id": "s3", "tool": "save_dxf", "args": {"path": "out.dxf"}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_insert_after() {
        let patch = PatchDocument::new(
            "p-1",
            vec![PatchOp::InsertAfter {
                after_step_id: "s1".into(),
                steps: vec![step("s1b", "set_current_layer")],
            }],
        );
        let next = apply(&plan(), &patch).unwrap();
        assert_eq!(next.revision, 1);
        assert_eq!(
            next.sequence.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["s1", "s1b", "s2", "s3"]
        );
    }

    #[test]
    fn test_replace_and_delete() {
        let patch = PatchDocument::new(
            "p-1",
            vec![
                PatchOp::Replace {
                    step_id: "s2".into(),
                    step: step("s2", "capture_dxf_view"),
                },
                PatchOp::Delete {
                    step_id: "s3".into(),
                },
            ],
        );
        let next = apply(&plan(), &patch).unwrap();
        assert_eq!(next.sequence.len(), 2);
        assert_eq!(next.sequence[1].tool.as_deref(), Some("capture_dxf_view"));
    }

    #[test]
    fn test_ops_compose_in_order() {
        // The second op addresses a step the first op inserted.
        let patch = PatchDocument::new(
            "p-1",
            vec![
                PatchOp::InsertAfter {
                    after_step_id: "s3".into(),
                    steps: vec![step("s4", "zoom_extents")],
                },
                PatchOp::Replace {
                    step_id: "s4".into(),
                    step: step("s4", "capture_dxf_view"),
                },
            ],
        );
        let next = apply(&plan(), &patch).unwrap();
        assert_eq!(next.sequence[3].tool.as_deref(), Some("capture_dxf_view"));
    }

    #[test]
    fn test_unknown_step_rejects_whole_patch() {
        let original = plan();
        let patch = PatchDocument::new(
            "p-1",
            vec![
                PatchOp::Delete { step_id: "s1".into() },
                PatchOp::InsertAfter {
                    after_step_id: "nope".into(),
                    steps: vec![step("x", "zoom_extents")],
                },
            ],
        );
        let err = apply(&original, &patch).unwrap_err();
        assert!(matches!(err, EngineError::PatchConflict(_)));
        // Caller's plan is untouched.
        assert_eq!(original.sequence.len(), 3);
        assert_eq!(original.revision, 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let patch = PatchDocument::new(
            "p-1",
            vec![PatchOp::InsertAfter {
                after_step_id: "s1".into(),
                steps: vec![step("s3", "zoom_extents")],
            }],
        );
        assert!(matches!(
            apply(&plan(), &patch).unwrap_err(),
            EngineError::PatchConflict(_)
        ));
    }

    #[test]
    fn test_wrong_target_plan() {
        let patch = PatchDocument::new("other-plan", vec![]);
        assert!(matches!(
            apply(&plan(), &patch).unwrap_err(),
            EngineError::PatchConflict(_)
        ));
    }

    #[test]
    fn test_wrong_version() {
        let mut patch = PatchDocument::new("p-1", vec![]);
        patch.version = "patch_v0".into();
        assert!(matches!(
            apply(&plan(), &patch).unwrap_err(),
            EngineError::PatchConflict(_)
        ));
    }

    #[test]
    fn test_patch_roundtrip() {
        let doc = json!({
            "version": "patch_v1",
            "target_plan_id": "p-1",
            "ops": [
                {"op": "insert_after", "after_step_id": "s1",
                 "steps": [{"id": "n1", "tool": "create_layer", "args": {"name": "Dims"}}]},
                {"op": "delete", "step_id": "s2"}
            ]
        });
        let patch: PatchDocument = serde_json::from_value(doc).unwrap();
        assert_eq!(patch.ops.len(), 2);
        let next = apply(&plan(), &patch).unwrap();
        assert_eq!(next.sequence.len(), 3);
    }
}
