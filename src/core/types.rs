//! Shared aliases and wire-format version tags

use serde_json::Value;

/// JSON object used for step args, tool results and query snapshots
pub type JsonMap = serde_json::Map<String, Value>;

/// Supported plan document version
pub const PLAN_VERSION: &str = "plan_v1";

/// Supported args-map document version
pub const ARGS_MAP_VERSION: &str = "args-map-v1";

/// QA report document version
pub const QA_REPORT_VERSION: &str = "qa-report-v1";

/// Patch document version
pub const PATCH_VERSION: &str = "patch_v1";
