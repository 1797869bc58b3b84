//! QA report data model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::QA_REPORT_VERSION;

/// Severity attached to a failed check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QaSeverity {
    /// The drawing is wrong and needs correction
    Error,
    /// Worth reviewing, not blocking
    Warn,
}

/// Outcome of evaluating one rule against one snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub rule: String,
    pub passed: bool,
    pub severity: QaSeverity,
    pub message: String,
    /// Rule-specific detail, consumed by patch building
    #[serde(default)]
    pub evidence: Value,
}

impl CheckResult {
    pub fn pass(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            passed: true,
            severity: QaSeverity::Warn,
            message: String::new(),
            evidence: Value::Null,
        }
    }

    pub fn fail(
        rule: impl Into<String>,
        severity: QaSeverity,
        message: impl Into<String>,
        evidence: Value,
    ) -> Self {
        Self {
            rule: rule.into(),
            passed: false,
            severity,
            message: message.into(),
            evidence,
        }
    }
}

/// One evaluation pass over a query snapshot (`qa-report-v1`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaReport {
    pub version: String,
    pub checks: Vec<CheckResult>,
}

impl QaReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        Self {
            version: QA_REPORT_VERSION.to_string(),
            checks,
        }
    }

    /// No failed checks at all
    pub fn is_clean(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// Failed checks at error severity
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.severity == QaSeverity::Error)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_report() {
        let report = QaReport::new(vec![CheckResult::pass("required_layers")]);
        assert!(report.is_clean());
        assert!(report.errors().is_empty());
        assert_eq!(report.version, QA_REPORT_VERSION);
    }

    #[test]
    fn test_errors_exclude_warnings() {
        let report = QaReport::new(vec![
            CheckResult::fail("required_layers", QaSeverity::Error, "missing", json!({})),
            CheckResult::fail("placeholder_texts", QaSeverity::Warn, "TBD found", json!({})),
        ]);
        assert!(!report.is_clean());
        assert_eq!(report.failures().len(), 2);
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.errors()[0].rule, "required_layers");
    }
}
