//! Sequential plan execution
//!
//! The executor walks a fully expanded, policy-valid step list in strict
//! order: resolve variables, adapt args, call the boundary (or record the
//! would-be call in dry mode), update the reserved aliases. Steps have
//! ordering dependencies through the variable store, so there is no
//! parallelism and no reordering. The executor never retries with altered
//! parameters; corrections belong to the planner/QA loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapter::ArgsAdapter;
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::types::JsonMap;
use crate::exec::boundary::{ToolBoundary, ToolResult};
use crate::plan::types::{OnError, Step, StepKind};
use crate::vars::VarStore;

/// Whether boundary calls are actually issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Record would-be calls without touching the boundary
    Dry,
    /// Issue real calls and capture results
    Commit,
}

/// Executor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Pending,
    Running(usize),
    Succeeded,
    Failed(usize),
}

/// Outcome of one step, shared between dry and committing modes
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    DryRun,
    Success { result: ToolResult },
    Failed { error: String },
}

/// One entry of the ordered call log
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallRecord {
    pub step_id: String,
    pub tool: String,
    /// Args after variable resolution and adaptation (what the boundary
    /// sees, or would see in dry mode)
    pub args: JsonMap,
    pub outcome: CallOutcome,
}

/// Result of one execution pass
#[derive(Debug)]
pub struct ExecutionReport {
    pub pass_id: Uuid,
    pub mode: ExecMode,
    pub state: ExecState,
    pub calls: Vec<CallRecord>,
    /// Error that halted the pass, if any
    pub error: Option<EngineError>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.state == ExecState::Succeeded
    }
}

/// Step failure plus the args known at the point of failure
///
/// Resolution and adaptation failures have no adapted args yet; a boundary
/// failure keeps them so the call log shows what the tool was actually
/// asked to do.
struct StepFailure {
    error: EngineError,
    args: JsonMap,
}

impl StepFailure {
    fn early(error: EngineError) -> Self {
        Self {
            error,
            args: JsonMap::new(),
        }
    }
}

pub struct Executor {
    config: EngineConfig,
    adapter: Arc<ArgsAdapter>,
    boundary: Arc<dyn ToolBoundary>,
}

impl Executor {
    pub fn new(
        config: EngineConfig,
        adapter: Arc<ArgsAdapter>,
        boundary: Arc<dyn ToolBoundary>,
    ) -> Self {
        Self {
            config,
            adapter,
            boundary,
        }
    }

    /// Run an expanded step list against the boundary.
    ///
    /// `vars` seeds the pass-scoped variable store; the store is discarded
    /// when the pass ends.
    pub async fn run(&self, vars: &JsonMap, steps: &[Step], mode: ExecMode) -> ExecutionReport {
        let mut report = ExecutionReport {
            pass_id: Uuid::new_v4(),
            mode,
            state: ExecState::Pending,
            calls: Vec::with_capacity(steps.len()),
            error: None,
        };
        let mut store = VarStore::from_vars(vars);
        info!(pass_id = %report.pass_id, steps = steps.len(), ?mode, "execution pass started");

        for (i, step) in steps.iter().enumerate() {
            report.state = ExecState::Running(i);

            let Some(StepKind::Tool(tool)) = step.kind() else {
                // Expansion happens before execution; hitting a macro here
                // means the caller skipped it.
                report.state = ExecState::Failed(i);
                report.error = Some(EngineError::UnknownMacro {
                    step_id: step.id.clone(),
                    name: step.macro_name.clone().unwrap_or_default(),
                });
                return report;
            };
            let tool = tool.to_string();

            let step_result = self.run_step(&mut store, step, &tool, mode).await;
            match step_result {
                Ok(record) => {
                    info!(step_id = %step.id, tool = %tool, "step completed");
                    report.calls.push(record);
                }
                Err(failure) => {
                    let err = failure.error;
                    let message = err.to_string();
                    report.calls.push(CallRecord {
                        step_id: step.id.clone(),
                        tool: tool.clone(),
                        args: failure.args,
                        outcome: CallOutcome::Failed {
                            error: message.clone(),
                        },
                    });
                    if step.on_error == Some(OnError::Continue) {
                        warn!(step_id = %step.id, %message, "step failed, continuing per on_error");
                        store.record_result(None, serde_json::Value::Null, &[]);
                        continue;
                    }
                    error!(step_id = %step.id, %message, "step failed, halting");
                    report.state = ExecState::Failed(i);
                    report.error = Some(err);
                    return report;
                }
            }
        }

        report.state = ExecState::Succeeded;
        report
    }

    async fn run_step(
        &self,
        store: &mut VarStore,
        step: &Step,
        tool: &str,
        mode: ExecMode,
    ) -> Result<CallRecord, StepFailure> {
        let resolved = store
            .resolve_args(&step.args, &step.id)
            .map_err(StepFailure::early)?;
        let adapted = self
            .adapter
            .adapt(tool, &resolved)
            .map_err(StepFailure::early)?;

        let outcome = match mode {
            ExecMode::Dry => {
                // Reserved aliases still advance so later references
                // resolve deterministically, just to empty values.
                let synthetic = ToolResult::empty();
                store.record_result(
                    step.save_as.as_deref(),
                    synthetic.payload.clone(),
                    &synthetic.entity_ids,
                );
                CallOutcome::DryRun
            }
            ExecMode::Commit => {
                let result = self
                    .invoke_with_timeout(step, tool, &adapted)
                    .await
                    .map_err(|error| StepFailure {
                        error,
                        args: adapted.clone(),
                    })?;
                store.record_result(
                    step.save_as.as_deref(),
                    result.payload.clone(),
                    &result.entity_ids,
                );
                CallOutcome::Success { result }
            }
        };

        Ok(CallRecord {
            step_id: step.id.clone(),
            tool: tool.to_string(),
            args: adapted,
            outcome,
        })
    }

    async fn invoke_with_timeout(
        &self,
        step: &Step,
        tool: &str,
        args: &JsonMap,
    ) -> Result<ToolResult, EngineError> {
        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        let boundary_error = |message: String| EngineError::Boundary {
            step_id: step.id.clone(),
            tool: tool.to_string(),
            message,
        };

        let result = tokio::time::timeout(timeout, self.boundary.invoke(tool, args))
            .await
            .map_err(|_| {
                boundary_error(format!("timed out after {}ms", self.config.call_timeout_ms))
            })?
            .map_err(|e| boundary_error(e.to_string()))?;

        if !result.ok {
            return Err(boundary_error("tool reported failure".into()));
        }
        Ok(result)
    }
}
