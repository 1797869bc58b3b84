//! Built-in QA rules
//!
//! Rules are deterministic predicates over a query snapshot the caller
//! assembles from the drawing tool's inspection calls. Expected snapshot
//! shape (all sections optional, rules tolerate absence):
//!
//! ```json
//! {
//!   "layers": [{"name": "Walls", "entity_count": 12}, ...],
//!   "texts": [{"text": "TBD", "layer": "Notes"}, ...],
//!   "dimensions": [{"value": 1000.0}, ...]
//! }
//! ```

use serde_json::{json, Value};

use crate::qa::report::{CheckResult, QaSeverity};

/// One named QA predicate
///
/// `evaluate` returns the check outcome, or `Err` when the snapshot is too
/// malformed for this rule to judge. The QA engine turns an `Err` into a
/// failed check so one bad rule never loses the rest of the report.
pub trait QaRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, snapshot: &Value) -> Result<CheckResult, String>;
}

fn layers_of(snapshot: &Value) -> Vec<&serde_json::Map<String, Value>> {
    snapshot
        .get("layers")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

/// Every configured layer name must exist in the drawing
pub struct RequiredLayers {
    pub required: Vec<String>,
}

impl QaRule for RequiredLayers {
    fn name(&self) -> &str {
        "required_layers"
    }

    fn evaluate(&self, snapshot: &Value) -> Result<CheckResult, String> {
        let existing: Vec<&str> = layers_of(snapshot)
            .iter()
            .filter_map(|l| l.get("name").and_then(Value::as_str))
            .collect();
        let missing: Vec<&String> = self
            .required
            .iter()
            .filter(|name| !existing.contains(&name.as_str()))
            .collect();
        if missing.is_empty() {
            Ok(CheckResult::pass(self.name()))
        } else {
            Ok(CheckResult::fail(
                self.name(),
                QaSeverity::Error,
                format!("missing required layers: {missing:?}"),
                json!({ "missing": missing }),
            ))
        }
    }
}

/// The named layer (layer "0" by convention) must carry no entities
pub struct NoEntitiesOnLayer {
    pub layer: String,
}

impl QaRule for NoEntitiesOnLayer {
    fn name(&self) -> &str {
        "no_entities_on_layer"
    }

    fn evaluate(&self, snapshot: &Value) -> Result<CheckResult, String> {
        for layer in layers_of(snapshot) {
            if layer.get("name").and_then(Value::as_str) != Some(self.layer.as_str()) {
                continue;
            }
            let count = layer
                .get("entity_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if count > 0 {
                return Ok(CheckResult::fail(
                    self.name(),
                    QaSeverity::Warn,
                    format!("layer '{}' holds {count} entities", self.layer),
                    json!({ "layer": self.layer, "entity_count": count }),
                ));
            }
        }
        Ok(CheckResult::pass(self.name()))
    }
}

/// No text entity may contain a placeholder marker (TBD, ??)
pub struct PlaceholderTexts;

impl QaRule for PlaceholderTexts {
    fn name(&self) -> &str {
        "placeholder_texts"
    }

    fn evaluate(&self, snapshot: &Value) -> Result<CheckResult, String> {
        let texts = snapshot
            .get("texts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let bad: Vec<&Value> = texts
            .iter()
            .filter(|t| {
                let text = t
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_uppercase();
                text.contains("TBD") || text.contains("??")
            })
            .collect();
        if bad.is_empty() {
            Ok(CheckResult::pass(self.name()))
        } else {
            // Cap evidence so a pathological drawing cannot bloat the report.
            let sample: Vec<&&Value> = bad.iter().take(20).collect();
            Ok(CheckResult::fail(
                self.name(),
                QaSeverity::Warn,
                format!("{} placeholder text(s) found", bad.len()),
                json!({ "count": bad.len(), "items": sample }),
            ))
        }
    }
}

/// The drawing must carry at least `min` dimension entities
pub struct MinDimensionCount {
    pub min: usize,
}

impl QaRule for MinDimensionCount {
    fn name(&self) -> &str {
        "min_dimension_count"
    }

    fn evaluate(&self, snapshot: &Value) -> Result<CheckResult, String> {
        let count = snapshot
            .get("dimensions")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if count < self.min {
            Ok(CheckResult::fail(
                self.name(),
                QaSeverity::Warn,
                format!("only {count} dimension(s), expected at least {}", self.min),
                json!({ "count": count, "min": self.min }),
            ))
        } else {
            Ok(CheckResult::pass(self.name()))
        }
    }
}
