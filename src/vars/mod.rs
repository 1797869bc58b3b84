//! Variable store and `$name` resolution
//!
//! The "most recent result" convention is modeled as explicitly named store
//! entries rather than ambient state: `LAST_RESULT` and `LAST_IDS` (plus the
//! `LAST` convenience alias for the first created id) are rewritten after
//! every executed step. A store lives for exactly one execution pass.

use serde_json::Value;
use std::collections::HashMap;

use crate::core::error::{EngineError, Result};
use crate::core::types::JsonMap;

/// Full result of the most recent step
pub const LAST_RESULT: &str = "LAST_RESULT";
/// Created-identifier list of the most recent step
pub const LAST_IDS: &str = "LAST_IDS";
/// First created identifier of the most recent step
pub const LAST: &str = "LAST";

#[derive(Debug, Clone, Default)]
pub struct VarStore {
    values: HashMap<String, Value>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a plan's `vars` map
    pub fn from_vars(vars: &JsonMap) -> Self {
        Self {
            values: vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Recursively replace `"$name"` strings with stored values.
    ///
    /// `"$$name"` escapes to the literal `"$name"` and is never resolved;
    /// a bare `"$"` is treated as a literal. A reference to an absent name
    /// is fatal for the step.
    pub fn resolve(&self, value: &Value, step_id: &str) -> Result<Value> {
        match value {
            Value::String(s) => {
                if let Some(escaped) = s.strip_prefix("$$") {
                    return Ok(Value::String(format!("${escaped}")));
                }
                match s.strip_prefix('$') {
                    Some(name) if !name.is_empty() => match self.values.get(name) {
                        Some(v) => Ok(v.clone()),
                        None => Err(EngineError::UnresolvedVariable {
                            step_id: step_id.to_string(),
                            name: name.to_string(),
                        }),
                    },
                    _ => Ok(value.clone()),
                }
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve(v, step_id))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve(v, step_id)?)))
                .collect::<Result<JsonMap>>()
                .map(Value::Object),
            _ => Ok(value.clone()),
        }
    }

    /// Resolve every value of a step's args object
    pub fn resolve_args(&self, args: &JsonMap, step_id: &str) -> Result<JsonMap> {
        args.iter()
            .map(|(k, v)| Ok((k.clone(), self.resolve(v, step_id)?)))
            .collect()
    }

    /// Rewrite the reserved aliases from a step's result and honor `save_as`
    pub fn record_result(
        &mut self,
        save_as: Option<&str>,
        result: Value,
        created_ids: &[String],
    ) {
        self.set(
            LAST_IDS,
            Value::Array(created_ids.iter().cloned().map(Value::String).collect()),
        );
        if let Some(first) = created_ids.first() {
            self.set(LAST, Value::String(first.clone()));
        }
        if let Some(name) = save_as {
            self.set(name, result.clone());
        }
        self.set(LAST_RESULT, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_simple_reference() {
        let mut store = VarStore::new();
        store.set("gap", json!(300));
        let resolved = store.resolve(&json!("$gap"), "s1").unwrap();
        assert_eq!(resolved, json!(300));
    }

    #[test]
    fn test_resolve_nested() {
        let mut store = VarStore::new();
        store.set("origin", json!([10, 20]));
        let args = json!({"position": "$origin", "meta": {"anchor": "$origin"}});
        let resolved = store.resolve(&args, "s1").unwrap();
        assert_eq!(resolved["position"], json!([10, 20]));
        assert_eq!(resolved["meta"]["anchor"], json!([10, 20]));
    }

    #[test]
    fn test_unresolved_is_fatal() {
        let store = VarStore::new();
        let err = store.resolve(&json!("$missing"), "s7").unwrap_err();
        match err {
            EngineError::UnresolvedVariable { step_id, name } => {
                assert_eq!(step_id, "s7");
                assert_eq!(name, "missing");
            }
            other => panic!("expected UnresolvedVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_escape_convention() {
        let store = VarStore::new();
        let resolved = store.resolve(&json!("$$price"), "s1").unwrap();
        assert_eq!(resolved, json!("$price"));
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        let store = VarStore::new();
        assert_eq!(store.resolve(&json!("$"), "s1").unwrap(), json!("$"));
    }

    #[test]
    fn test_non_strings_untouched() {
        let store = VarStore::new();
        let value = json!({"n": 42, "flag": true, "list": [1, 2]});
        assert_eq!(store.resolve(&value, "s1").unwrap(), value);
    }

    #[test]
    fn test_record_result_updates_aliases() {
        let mut store = VarStore::new();
        store.record_result(
            Some("frame"),
            json!({"ok": true, "entity_ids": ["E1", "E2"]}),
            &["E1".to_string(), "E2".to_string()],
        );
        assert_eq!(store.get(LAST_IDS), Some(&json!(["E1", "E2"])));
        assert_eq!(store.get(LAST), Some(&json!("E1")));
        assert_eq!(store.get("frame"), Some(&json!({"ok": true, "entity_ids": ["E1", "E2"]})));
    }

    #[test]
    fn test_record_result_without_ids_keeps_previous_last() {
        let mut store = VarStore::new();
        store.record_result(None, json!({"ok": true}), &["E1".to_string()]);
        store.record_result(None, json!({"ok": true}), &[]);
        // LAST_IDS reflects the most recent step; LAST keeps the last
        // actually created id.
        assert_eq!(store.get(LAST_IDS), Some(&json!([])));
        assert_eq!(store.get(LAST), Some(&json!("E1")));
    }
}
