//! Engine facade
//!
//! Ties the pipeline together in its fixed order: schema validation, macro
//! expansion, post-expansion checks, policy validation, execution. Each
//! stage fails closed; nothing reaches the boundary until the whole
//! expanded sequence has been vetted.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::adapter::ArgsAdapter;
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::exec::boundary::ToolBoundary;
use crate::exec::executor::{ExecMode, ExecutionReport, Executor};
use crate::macros::{builtin_registry, MacroRegistry};
use crate::plan::policy::PolicyValidator;
use crate::plan::schema::{parse_plan, SchemaViolation};
use crate::plan::types::{Plan, Step};

/// A plan that has passed every pre-execution stage
#[derive(Debug)]
pub struct PreparedPlan {
    pub plan: Plan,
    /// Fully expanded primitive sequence, in execution order
    pub steps: Vec<Step>,
}

pub struct Engine {
    config: EngineConfig,
    macros: MacroRegistry,
    policy: PolicyValidator,
    executor: Executor,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        adapter: Arc<ArgsAdapter>,
        boundary: Arc<dyn ToolBoundary>,
    ) -> Self {
        Self {
            config: config.clone(),
            macros: builtin_registry(),
            policy: PolicyValidator::new(),
            executor: Executor::new(config, adapter, boundary),
        }
    }

    /// Replace the built-in macro registry
    pub fn with_macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = macros;
        self
    }

    /// Replace the built-in policy rule set
    pub fn with_policy(mut self, policy: PolicyValidator) -> Self {
        self.policy = policy;
        self
    }

    /// Validate and expand a raw plan document
    pub fn prepare_doc(&self, doc: &Value) -> Result<PreparedPlan> {
        let plan = parse_plan(doc)?;
        self.prepare(plan)
    }

    /// Validate and expand an already-parsed plan
    pub fn prepare(&self, plan: Plan) -> Result<PreparedPlan> {
        let steps = self.macros.expand_sequence(&plan.sequence)?;

        if steps.len() > self.config.max_expanded_steps {
            return Err(EngineError::PlanTooLarge {
                count: steps.len(),
                max: self.config.max_expanded_steps,
            });
        }

        // Macro child ids could collide with planner-written ids; patches
        // and reports address steps by id, so collisions are fatal.
        let mut seen = std::collections::HashSet::new();
        let mut violations = Vec::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                violations.push(SchemaViolation {
                    path: format!("/sequence/{}", step.id),
                    message: format!("duplicate step id '{}' after expansion", step.id),
                });
            }
        }
        if !violations.is_empty() {
            return Err(EngineError::Schema(violations));
        }

        let report = self.policy.validate(&steps, &plan.policy);
        for finding in report.warnings() {
            let step_id = finding.step_id.as_deref().unwrap_or("-");
            debug!(rule = %finding.rule, %step_id, "policy warning: {}", finding.message);
        }
        if report.is_blocking() {
            return Err(EngineError::Policy(report.blocking_findings()));
        }

        info!(plan_id = %plan.id, revision = plan.revision, steps = steps.len(), "plan prepared");
        Ok(PreparedPlan { plan, steps })
    }

    /// Full pipeline on a raw document
    pub async fn run_doc(&self, doc: &Value, mode: ExecMode) -> Result<ExecutionReport> {
        let prepared = self.prepare_doc(doc)?;
        Ok(self.run_prepared(&prepared, mode).await)
    }

    /// Full pipeline on a parsed plan
    pub async fn run_plan(&self, plan: Plan, mode: ExecMode) -> Result<ExecutionReport> {
        let prepared = self.prepare(plan)?;
        Ok(self.run_prepared(&prepared, mode).await)
    }

    /// Execute a plan that already passed `prepare`
    pub async fn run_prepared(&self, prepared: &PreparedPlan, mode: ExecMode) -> ExecutionReport {
        self.executor
            .run(&prepared.plan.vars, &prepared.steps, mode)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::boundary::{BoundaryError, ToolResult};
    use crate::core::types::JsonMap;
    use async_trait::async_trait;
    use serde_json::json;

    struct OkBoundary;

    #[async_trait]
    impl ToolBoundary for OkBoundary {
        async fn invoke(
            &self,
            _tool: &str,
            _args: &JsonMap,
        ) -> std::result::Result<ToolResult, BoundaryError> {
            Ok(ToolResult::from_response(json!({"entity_ids": ["E1"]})))
        }
    }

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(ArgsAdapter::identity()),
            Arc::new(OkBoundary),
        )
    }

    fn plan_doc(sequence: serde_json::Value) -> Value {
        json!({
            "version": "plan_v1",
            "id": "p-test",
            "sequence": sequence
        })
    }

    #[test]
    fn test_prepare_expands_macros() {
        let doc = plan_doc(json!([
            {"id": "m1", "macro": "setup_layers",
             "args": {"layers": [{"name": "Walls"}, {"name": "Dims"}]}},
            {"id": "s1", "tool": "zoom_extents", "args": {}}
        ]));
        let prepared = engine().prepare_doc(&doc).unwrap();
        assert_eq!(prepared.steps.len(), 3);
        assert_eq!(prepared.steps[0].id, "m1.L1");
        assert_eq!(prepared.steps[2].id, "s1");
    }

    #[test]
    fn test_prepare_rejects_forbidden_tool() {
        let doc = json!({
            "version": "plan_v1",
            "id": "p-test",
            "policy": {"forbid_tools": ["create_circle"]},
            "sequence": [
                {"id": "s1", "tool": "create_circle",
                 "args": {"center": [0, 0], "radius": 5}}
            ]
        });
        let err = engine().prepare_doc(&doc).unwrap_err();
        assert!(matches!(err, EngineError::Policy(_)));
    }

    #[test]
    fn test_prepare_reports_warnings_without_blocking() {
        let doc = json!({
            "version": "plan_v1",
            "id": "p-test",
            "policy": {"forbid_tools": ["scale_region"]},
            "sequence": [
                {"id": "s1", "tool": "scale_region",
                 "args": {"factor": 0.5},
                 "justification": "detail view at half scale"}
            ]
        });
        let prepared = engine().prepare_doc(&doc).unwrap();
        assert_eq!(prepared.steps.len(), 1);
    }

    #[test]
    fn test_prepare_rejects_duplicate_ids_after_expansion() {
        let doc = plan_doc(json!([
            {"id": "m1", "macro": "setup_layers", "args": {"layers": [{"name": "A"}]}},
            {"id": "m1.L1", "tool": "zoom_extents", "args": {}}
        ]));
        let err = engine().prepare_doc(&doc).unwrap_err();
        assert!(matches!(err, EngineError::Schema(_)));
    }

    #[test]
    fn test_prepare_enforces_size_limit() {
        let config = EngineConfig {
            max_expanded_steps: 2,
            ..Default::default()
        };
        let engine = Engine::new(
            config,
            Arc::new(ArgsAdapter::identity()),
            Arc::new(OkBoundary),
        );
        let doc = plan_doc(json!([
            {"id": "m1", "macro": "setup_layers",
             "args": {"layers": [{"name": "A"}, {"name": "B"}, {"name": "C"}]}}
        ]));
        let err = engine.prepare_doc(&doc).unwrap_err();
        match err {
            EngineError::PlanTooLarge { count, max } => {
                assert_eq!(count, 3);
                assert_eq!(max, 2);
            }
            other => panic!("expected PlanTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_doc_commit() {
        let doc = plan_doc(json!([
            {"id": "s1", "tool": "create_line",
             "args": {"start": [0, 0], "end": [100, 0]}, "save_as": "base"},
            {"id": "s2", "tool": "offset_entity",
             "args": {"entity_ids": "$LAST_IDS", "distance": 50}}
        ]));
        let report = engine().run_doc(&doc, ExecMode::Commit).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.calls.len(), 2);
        assert_eq!(
            report.calls[1].args.get("entity_ids"),
            Some(&json!(["E1"]))
        );
    }
}
