//! Structural validation of plan documents
//!
//! The planner is an untrusted LLM, so validation fails closed: an
//! unrecognized top-level field is reported as a violation rather than
//! silently ignored, because it usually signals planner drift from the
//! expected contract.

use serde_json::Value;

use crate::core::error::{EngineError, Result};
use crate::core::types::PLAN_VERSION;
use crate::plan::catalog;
use crate::plan::types::Plan;

/// One structural violation, with a JSON-pointer-ish path for context
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

const KNOWN_TOP_LEVEL: &[&str] = &[
    "version",
    "id",
    "revision",
    "policy",
    "vars",
    "assumptions",
    "sequence",
];

/// Validate a raw plan document; empty result means structurally valid
pub fn validate_plan_doc(doc: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    let Some(obj) = doc.as_object() else {
        violations.push(SchemaViolation::new("/", "plan must be a JSON object"));
        return violations;
    };

    // Fail closed on planner drift.
    for key in obj.keys() {
        if !KNOWN_TOP_LEVEL.contains(&key.as_str()) {
            violations.push(SchemaViolation::new(
                format!("/{key}"),
                "unrecognized top-level field",
            ));
        }
    }

    match obj.get("version").and_then(Value::as_str) {
        Some(v) if v == PLAN_VERSION => {}
        Some(v) => violations.push(SchemaViolation::new(
            "/version",
            format!("unsupported version '{v}' (expected '{PLAN_VERSION}')"),
        )),
        None => violations.push(SchemaViolation::new(
            "/version",
            "missing or non-string version",
        )),
    }

    match obj.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {}
        _ => violations.push(SchemaViolation::new("/id", "missing or empty plan id")),
    }

    if let Some(vars) = obj.get("vars") {
        if !vars.is_object() {
            violations.push(SchemaViolation::new("/vars", "vars must be an object"));
        }
    }

    if let Some(assumptions) = obj.get("assumptions") {
        match assumptions.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        violations.push(SchemaViolation::new(
                            format!("/assumptions/{i}"),
                            "assumption must be a string",
                        ));
                    }
                }
            }
            None => violations.push(SchemaViolation::new(
                "/assumptions",
                "assumptions must be an array",
            )),
        }
    }

    if let Some(policy) = obj.get("policy") {
        if !policy.is_object() {
            violations.push(SchemaViolation::new("/policy", "policy must be an object"));
        }
    }

    match obj.get("sequence").and_then(Value::as_array) {
        Some(steps) => validate_sequence(steps, &mut violations),
        None => violations.push(SchemaViolation::new(
            "/sequence",
            "missing sequence array",
        )),
    }

    violations
}

fn validate_sequence(steps: &[Value], violations: &mut Vec<SchemaViolation>) {
    let mut seen_ids: Vec<&str> = Vec::new();

    for (i, step) in steps.iter().enumerate() {
        let path = format!("/sequence/{i}");
        let Some(obj) = step.as_object() else {
            violations.push(SchemaViolation::new(path, "step must be an object"));
            continue;
        };

        match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {
                if seen_ids.contains(&id) {
                    violations.push(SchemaViolation::new(
                        format!("{path}/id"),
                        format!("duplicate step id '{id}'"),
                    ));
                }
                seen_ids.push(id);
            }
            _ => violations.push(SchemaViolation::new(
                format!("{path}/id"),
                "missing or empty step id",
            )),
        }

        let tool = obj.get("tool");
        let macro_name = obj.get("macro");
        match (tool, macro_name) {
            (Some(t), None) => {
                if !t.is_string() {
                    violations.push(SchemaViolation::new(
                        format!("{path}/tool"),
                        "tool must be a string",
                    ));
                }
            }
            (None, Some(m)) => {
                if !m.is_string() {
                    violations.push(SchemaViolation::new(
                        format!("{path}/macro"),
                        "macro must be a string",
                    ));
                }
            }
            (Some(_), Some(_)) => violations.push(SchemaViolation::new(
                path.clone(),
                "step has both 'tool' and 'macro'",
            )),
            (None, None) => violations.push(SchemaViolation::new(
                path.clone(),
                "step has neither 'tool' nor 'macro'",
            )),
        }

        let args = obj.get("args");
        if let Some(a) = args {
            if !a.is_object() {
                violations.push(SchemaViolation::new(
                    format!("{path}/args"),
                    "args must be an object",
                ));
            }
        }

        // Type-check canonical args for tools the catalog knows about.
        if let Some(tool) = tool.and_then(Value::as_str) {
            let empty = serde_json::Map::new();
            let args = args.and_then(Value::as_object).unwrap_or(&empty);
            if let Some(spec) = catalog::required_args(tool) {
                for (key, expected) in spec {
                    match args.get(*key) {
                        None => violations.push(SchemaViolation::new(
                            format!("{path}/args/{key}"),
                            format!("missing required arg for '{tool}'"),
                        )),
                        // Variable references resolve later; any type may come out.
                        Some(Value::String(s)) if s.starts_with('$') => {}
                        Some(v) if expected.matches(v) => {}
                        Some(_) => violations.push(SchemaViolation::new(
                            format!("{path}/args/{key}"),
                            format!("expected {} for '{tool}'", expected.name()),
                        )),
                    }
                }
            }
        }
    }
}

/// Validate and convert a raw document into a typed [`Plan`]
pub fn parse_plan(doc: &Value) -> Result<Plan> {
    let violations = validate_plan_doc(doc);
    if !violations.is_empty() {
        return Err(EngineError::Schema(violations));
    }
    Ok(serde_json::from_value(doc.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_plan() -> Value {
        json!({
            "version": "plan_v1",
            "id": "p-001",
            "sequence": [
                {"id": "s1", "tool": "create_line",
                 "args": {"start": [0, 0], "end": [1000, 0]}}
            ]
        })
    }

    #[test]
    fn test_minimal_plan_is_valid() {
        assert!(validate_plan_doc(&minimal_plan()).is_empty());
    }

    #[test]
    fn test_unknown_top_level_field_fails_closed() {
        let mut doc = minimal_plan();
        doc["retry_policy"] = json!("aggressive");
        let violations = validate_plan_doc(&doc);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/retry_policy");
    }

    #[test]
    fn test_unsupported_version() {
        let mut doc = minimal_plan();
        doc["version"] = json!("plan_v9");
        let violations = validate_plan_doc(&doc);
        assert!(violations.iter().any(|v| v.path == "/version"));
    }

    #[test]
    fn test_duplicate_step_ids() {
        let mut doc = minimal_plan();
        let step = doc["sequence"][0].clone();
        doc["sequence"].as_array_mut().unwrap().push(step);
        let violations = validate_plan_doc(&doc);
        assert!(violations
            .iter()
            .any(|v| v.message.contains("duplicate step id")));
    }

    #[test]
    fn test_step_with_both_kinds() {
        let mut doc = minimal_plan();
        doc["sequence"][0]["macro"] = json!("row_layout");
        let violations = validate_plan_doc(&doc);
        assert!(violations
            .iter()
            .any(|v| v.message.contains("both 'tool' and 'macro'")));
    }

    #[test]
    fn test_step_with_neither_kind() {
        let doc = json!({
            "version": "plan_v1",
            "id": "p-001",
            "sequence": [{"id": "s1", "args": {}}]
        });
        let violations = validate_plan_doc(&doc);
        assert!(violations
            .iter()
            .any(|v| v.message.contains("neither 'tool' nor 'macro'")));
    }

    #[test]
    fn test_known_tool_arg_typing() {
        let doc = json!({
            "version": "plan_v1",
            "id": "p-001",
            "sequence": [
                {"id": "s1", "tool": "create_circle",
                 "args": {"center": [0, 0], "radius": "big"}}
            ]
        });
        let violations = validate_plan_doc(&doc);
        assert!(violations
            .iter()
            .any(|v| v.path == "/sequence/0/args/radius"));
    }

    #[test]
    fn test_var_reference_satisfies_any_type() {
        let doc = json!({
            "version": "plan_v1",
            "id": "p-001",
            "sequence": [
                {"id": "s1", "tool": "create_circle",
                 "args": {"center": "$origin", "radius": "$r"}}
            ]
        });
        assert!(validate_plan_doc(&doc).is_empty());
    }

    #[test]
    fn test_parse_plan_rejects_invalid() {
        let doc = json!({"version": "plan_v1"});
        let err = parse_plan(&doc).unwrap_err();
        assert!(matches!(err, EngineError::Schema(_)));
    }
}
