//! Policy validation over the macro-expanded step list
//!
//! Rules are data, not control flow: each rule is a named object behind one
//! trait, registered with the validator. Adding a rule never touches the
//! validator's loop. Only violations block execution; warnings are reported
//! but do not stop a plan.

use serde::{Deserialize, Serialize};

use crate::plan::catalog;
use crate::plan::types::{LayerDiscipline, LayerMatch, Policy, Step, StepKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Violation,
    Warning,
}

/// One policy finding, with enough context to author a corrective patch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub rule: String,
    pub step_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn new(
        rule: &str,
        step_id: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.to_string(),
            step_id: Some(step_id.to_string()),
            severity,
            message: message.into(),
        }
    }
}

/// Outcome of a policy validation pass
#[derive(Debug, Clone, Default)]
pub struct PolicyReport {
    pub findings: Vec<Finding>,
}

impl PolicyReport {
    pub fn violations(&self) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Violation)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .collect()
    }

    /// Whether execution must be blocked
    pub fn is_blocking(&self) -> bool {
        !self.violations().is_empty()
    }

    /// Owned copies of the blocking findings, for error reporting
    pub fn blocking_findings(&self) -> Vec<Finding> {
        self.violations().into_iter().cloned().collect()
    }
}

/// One named policy rule evaluated against the expanded step list
pub trait PolicyRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, steps: &[Step], policy: &Policy) -> Vec<Finding>;
}

/// Forbidden tools are violations, downgraded to warnings when the step
/// carries a non-empty justification.
pub struct ForbiddenToolRule;

impl PolicyRule for ForbiddenToolRule {
    fn name(&self) -> &'static str {
        "forbidden_tool"
    }

    fn evaluate(&self, steps: &[Step], policy: &Policy) -> Vec<Finding> {
        let mut findings = Vec::new();
        for step in steps {
            let Some(StepKind::Tool(tool)) = step.kind() else {
                continue;
            };
            if !policy.forbid_tools.contains(tool) {
                continue;
            }
            let severity = if step.has_justification() {
                Severity::Warning
            } else {
                Severity::Violation
            };
            findings.push(Finding::new(
                self.name(),
                &step.id,
                severity,
                format!("forbidden tool '{tool}'"),
            ));
        }
        findings
    }
}

/// Entity-creation steps must satisfy the selected layer discipline.
pub struct ExplicitLayerRule;

impl ExplicitLayerRule {
    fn layer_arg(step: &Step) -> Option<&str> {
        step.args.get("layer").and_then(|v| v.as_str())
    }
}

impl PolicyRule for ExplicitLayerRule {
    fn name(&self) -> &'static str {
        "explicit_layer"
    }

    fn evaluate(&self, steps: &[Step], policy: &Policy) -> Vec<Finding> {
        if policy.explicit_layer == LayerDiscipline::Off {
            return Vec::new();
        }

        let mut findings = Vec::new();
        // (index, layer name) for every activation seen so far
        let mut activations: Vec<(usize, String)> = Vec::new();

        for (i, step) in steps.iter().enumerate() {
            let Some(StepKind::Tool(tool)) = step.kind() else {
                continue;
            };

            if catalog::is_layer_activation(tool) {
                if let Some(name) = step.args.get("name").and_then(|v| v.as_str()) {
                    activations.push((i, name.to_string()));
                }
                continue;
            }

            if !catalog::is_entity_creation(tool) {
                continue;
            }

            let satisfied = match policy.explicit_layer {
                LayerDiscipline::Off => true,
                LayerDiscipline::LayerArg => Self::layer_arg(step).is_some(),
                LayerDiscipline::ActivationBefore => match Self::layer_arg(step) {
                    // Creation names its layer: a prior activation must match,
                    // either anywhere before it or as the nearest one.
                    Some(wanted) => match policy.layer_match {
                        LayerMatch::AnyPreceding => {
                            activations.iter().any(|(_, name)| name == wanted)
                        }
                        LayerMatch::NearestPreceding => activations
                            .last()
                            .map(|(_, name)| name == wanted)
                            .unwrap_or(false),
                    },
                    // No layer arg: the current layer applies, so any prior
                    // activation satisfies the discipline.
                    None => !activations.is_empty(),
                },
            };

            if !satisfied {
                findings.push(Finding::new(
                    self.name(),
                    &step.id,
                    Severity::Violation,
                    format!("creation step '{tool}' violates the layer discipline"),
                ));
            }
        }
        findings
    }
}

/// Scale-type operations are violations unless the target kind is
/// whitelisted, with the same justification escape as forbidden tools.
pub struct ScaleAvoidanceRule;

impl PolicyRule for ScaleAvoidanceRule {
    fn name(&self) -> &'static str {
        "scale_avoidance"
    }

    fn evaluate(&self, steps: &[Step], policy: &Policy) -> Vec<Finding> {
        if !policy.avoid_scale {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for step in steps {
            let Some(StepKind::Tool(tool)) = step.kind() else {
                continue;
            };
            if !catalog::is_scale_tool(tool) {
                continue;
            }

            let whitelisted = step
                .args
                .get("target_kind")
                .and_then(|v| v.as_str())
                .map(|kind| policy.scale_allow_kinds.contains(kind))
                .unwrap_or(false);
            if whitelisted {
                continue;
            }

            let severity = if step.has_justification() {
                Severity::Warning
            } else {
                Severity::Violation
            };
            findings.push(Finding::new(
                self.name(),
                &step.id,
                severity,
                format!("scale tool '{tool}' without whitelisted target kind"),
            ));
        }
        findings
    }
}

/// Runs every registered rule and collects findings
pub struct PolicyValidator {
    rules: Vec<Box<dyn PolicyRule>>,
}

impl PolicyValidator {
    /// Validator with the built-in rule set
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ForbiddenToolRule),
                Box::new(ExplicitLayerRule),
                Box::new(ScaleAvoidanceRule),
            ],
        }
    }

    /// Register an additional rule
    pub fn with_rule(mut self, rule: Box<dyn PolicyRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluate every rule against the expanded step list
    pub fn validate(&self, steps: &[Step], policy: &Policy) -> PolicyReport {
        let mut report = PolicyReport::default();
        for rule in &self.rules {
            report.findings.extend(rule.evaluate(steps, policy));
        }
        report
    }
}

impl Default for PolicyValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::JsonMap;
    use serde_json::json;

    fn args(v: serde_json::Value) -> JsonMap {
        v.as_object().cloned().unwrap()
    }

    fn step(id: &str, tool: &str, a: serde_json::Value) -> Step {
        Step::primitive(id, tool, args(a))
    }

    #[test]
    fn test_forbidden_tool_is_violation() {
        let policy = Policy {
            forbid_tools: ["erase_all".to_string()].into(),
            ..Default::default()
        };
        let steps = vec![step("s1", "erase_all", json!({}))];
        let report = PolicyValidator::new().validate(&steps, &policy);
        assert!(report.is_blocking());
        assert_eq!(report.violations()[0].rule, "forbidden_tool");
    }

    #[test]
    fn test_justification_downgrades_to_warning() {
        let policy = Policy {
            forbid_tools: ["erase_all".to_string()].into(),
            ..Default::default()
        };
        let mut s = step("s1", "erase_all", json!({}));
        s.justification = Some("clearing scratch layer before redraw".into());
        let report = PolicyValidator::new().validate(&[s], &policy);
        assert!(!report.is_blocking());
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn test_layer_rule_off_by_default() {
        let steps = vec![step("s1", "create_line", json!({"start": [0,0], "end": [1,1]}))];
        let report = PolicyValidator::new().validate(&steps, &Policy::default());
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_layer_activation_any_preceding() {
        let policy = Policy {
            explicit_layer: LayerDiscipline::ActivationBefore,
            ..Default::default()
        };
        let steps = vec![
            step("s1", "set_current_layer", json!({"name": "A-WALL"})),
            step("s2", "set_current_layer", json!({"name": "A-TEXT"})),
            // A-WALL was activated earlier, though not nearest.
            step("s3", "create_line", json!({"start": [0,0], "end": [1,1], "layer": "A-WALL"})),
        ];
        let report = PolicyValidator::new().validate(&steps, &policy);
        assert!(!report.is_blocking());
    }

    #[test]
    fn test_layer_activation_nearest_preceding() {
        let policy = Policy {
            explicit_layer: LayerDiscipline::ActivationBefore,
            layer_match: LayerMatch::NearestPreceding,
            ..Default::default()
        };
        let steps = vec![
            step("s1", "set_current_layer", json!({"name": "A-WALL"})),
            step("s2", "set_current_layer", json!({"name": "A-TEXT"})),
            step("s3", "create_line", json!({"start": [0,0], "end": [1,1], "layer": "A-WALL"})),
        ];
        let report = PolicyValidator::new().validate(&steps, &policy);
        assert!(report.is_blocking());
    }

    #[test]
    fn test_creation_without_any_activation() {
        let policy = Policy {
            explicit_layer: LayerDiscipline::ActivationBefore,
            ..Default::default()
        };
        let steps = vec![step("s1", "create_line", json!({"start": [0,0], "end": [1,1]}))];
        let report = PolicyValidator::new().validate(&steps, &policy);
        assert!(report.is_blocking());
    }

    #[test]
    fn test_layer_arg_discipline() {
        let policy = Policy {
            explicit_layer: LayerDiscipline::LayerArg,
            ..Default::default()
        };
        let ok = step("s1", "create_text",
            json!({"insert": [0,0], "height": 250, "text": "K1", "layer": "A-TEXT"}));
        let bad = step("s2", "create_text",
            json!({"insert": [0,0], "height": 250, "text": "K2"}));
        let report = PolicyValidator::new().validate(&[ok, bad], &policy);
        let violations = report.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].step_id.as_deref(), Some("s2"));
    }

    #[test]
    fn test_scale_whitelist() {
        let policy = Policy {
            scale_allow_kinds: ["symbol".to_string()].into(),
            ..Default::default()
        };
        let allowed = step("s1", "scale_entities",
            json!({"entity_ids": ["E1"], "factor": 2.0, "target_kind": "symbol"}));
        let blocked = step("s2", "scale_entities",
            json!({"entity_ids": ["E2"], "factor": 2.0}));
        let report = PolicyValidator::new().validate(&[allowed, blocked], &policy);
        let violations = report.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].step_id.as_deref(), Some("s2"));
    }

    #[test]
    fn test_avoid_scale_toggle() {
        let policy = Policy {
            avoid_scale: false,
            ..Default::default()
        };
        let steps = vec![step("s1", "scale_region", json!({"factor": 0.5}))];
        let report = PolicyValidator::new().validate(&steps, &policy);
        assert!(report.findings.is_empty());
    }
}
