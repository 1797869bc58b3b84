//! Engine configuration with documented constants
//!
//! All tunable limits are collected here with explanations of their purpose.

/// Configuration for one execution engine instance
///
/// These values bound a single execution pass against one drawing document.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-call timeout for the external tool boundary (milliseconds)
    ///
    /// A call that exceeds this is treated exactly like a failed call:
    /// the step fails and the sequence halts (unless the step opted into
    /// `on_error = "continue"`).
    pub call_timeout_ms: u64,

    /// Upper bound on the step count after macro expansion
    ///
    /// Plans come from an untrusted planner; a macro with absurd repeat
    /// counts should be rejected before the first boundary call rather
    /// than ground through thousands of tool invocations.
    pub max_expanded_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            max_expanded_steps: 10_000,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.call_timeout_ms == 0 {
            return Err("call_timeout_ms must be positive".into());
        }
        if self.max_expanded_steps == 0 {
            return Err("max_expanded_steps must be positive".into());
        }
        Ok(())
    }
}
