//! QA rule engine
//!
//! Consumes a query snapshot the caller assembled from the drawing tool's
//! inspection calls; never calls the boundary itself. Rules run
//! independently so one broken rule cannot take the rest of the report
//! down with it.

pub mod config;
pub mod report;
pub mod rules;

use serde_json::{json, Value};
use tracing::warn;

use crate::core::types::JsonMap;
use crate::patch::{PatchDocument, PatchOp};
use crate::plan::types::{Plan, Step};
use crate::qa::config::QaConfig;
use crate::qa::report::{CheckResult, QaReport, QaSeverity};
use crate::qa::rules::{
    MinDimensionCount, NoEntitiesOnLayer, PlaceholderTexts, QaRule, RequiredLayers,
};

pub struct QaEngine {
    rules: Vec<Box<dyn QaRule>>,
}

impl QaEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Engine with the rules the config enables
    pub fn from_config(config: &QaConfig) -> Self {
        let mut engine = Self::new();
        if !config.required_layers.is_empty() {
            engine = engine.with_rule(Box::new(RequiredLayers {
                required: config.required_layers.clone(),
            }));
        }
        if let Some(layer) = &config.no_entities_on_layer {
            engine = engine.with_rule(Box::new(NoEntitiesOnLayer {
                layer: layer.clone(),
            }));
        }
        if config.placeholder_texts {
            engine = engine.with_rule(Box::new(PlaceholderTexts));
        }
        if let Some(min) = config.min_dimension_count {
            engine = engine.with_rule(Box::new(MinDimensionCount { min }));
        }
        engine
    }

    pub fn with_rule(mut self, rule: Box<dyn QaRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluate every rule against one snapshot.
    ///
    /// A rule returning `Err` becomes a failed check entry; the remaining
    /// rules still run and the report is always complete.
    pub fn evaluate(&self, snapshot: &Value) -> QaReport {
        let checks = self
            .rules
            .iter()
            .map(|rule| match rule.evaluate(snapshot) {
                Ok(check) => check,
                Err(message) => {
                    warn!(rule = rule.name(), %message, "rule evaluation failed");
                    CheckResult::fail(
                        rule.name(),
                        QaSeverity::Error,
                        format!("rule evaluation failed: {message}"),
                        Value::Null,
                    )
                }
            })
            .collect();
        QaReport::new(checks)
    }

    /// Propose a correction patch for the failures that have a mechanical
    /// remedy. Currently only missing required layers: the patch inserts
    /// `create_layer` steps after the plan's first step. Returns `None`
    /// when nothing is remediable or the plan is empty.
    pub fn build_patch(&self, report: &QaReport, plan: &Plan) -> Option<PatchDocument> {
        let first_id = plan.sequence.first().map(|s| s.id.clone())?;

        let mut steps = Vec::new();
        for check in report.failures() {
            if check.rule != "required_layers" {
                continue;
            }
            // Malformed evidence loses this entry's remedy, not the patch.
            let Some(missing) = check.evidence.get("missing").and_then(Value::as_array) else {
                continue;
            };
            for name in missing.iter().filter_map(Value::as_str) {
                let mut args = JsonMap::new();
                args.insert("name".into(), json!(name));
                steps.push(Step::primitive(
                    format!("qa.layer.{name}"),
                    "create_layer",
                    args,
                ));
            }
        }

        if steps.is_empty() {
            return None;
        }
        Some(PatchDocument::new(
            plan.id.clone(),
            vec![PatchOp::InsertAfter {
                after_step_id: first_id,
                steps,
            }],
        ))
    }
}

impl Default for QaEngine {
    fn default() -> Self {
        Self::from_config(&QaConfig::default())
    }
}
