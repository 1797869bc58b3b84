//! Catalog of known drawing tools
//!
//! Canonical argument declarations for the tools the planner is expected to
//! use. The schema validator type-checks args only for tools listed here;
//! unknown tools pass structural validation (the boundary decides whether it
//! can serve them) but still go through policy checks.

/// Expected JSON type of a canonical argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Number,
    String,
    Bool,
    Array,
    Object,
}

impl ArgType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ArgType::Number => value.is_number(),
            ArgType::String => value.is_string(),
            ArgType::Bool => value.is_boolean(),
            ArgType::Array => value.is_array(),
            ArgType::Object => value.is_object(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArgType::Number => "number",
            ArgType::String => "string",
            ArgType::Bool => "bool",
            ArgType::Array => "array",
            ArgType::Object => "object",
        }
    }
}

/// Required canonical args for a known tool, or `None` for unknown tools
///
/// A `"$var"` string satisfies any declared type since it resolves later.
pub fn required_args(tool: &str) -> Option<&'static [(&'static str, ArgType)]> {
    match tool {
        "create_line" => Some(&[("start", ArgType::Array), ("end", ArgType::Array)]),
        "create_polyline" => Some(&[("points", ArgType::Array)]),
        "create_circle" => Some(&[("center", ArgType::Array), ("radius", ArgType::Number)]),
        "create_arc" => Some(&[
            ("center", ArgType::Array),
            ("radius", ArgType::Number),
            ("start_angle_deg", ArgType::Number),
            ("end_angle_deg", ArgType::Number),
        ]),
        "create_rectangle" => Some(&[("p1", ArgType::Array), ("p2", ArgType::Array)]),
        "create_text" => Some(&[
            ("insert", ArgType::Array),
            ("height", ArgType::Number),
            ("text", ArgType::String),
        ]),
        "create_dimension" => Some(&[]),
        "create_layer" => Some(&[("name", ArgType::String)]),
        "set_current_layer" => Some(&[("name", ArgType::String)]),
        "insert_block" => Some(&[("name", ArgType::String), ("position", ArgType::Array)]),
        "offset_entity" => Some(&[("entity_ids", ArgType::Array), ("distance", ArgType::Number)]),
        "scale_entities" => Some(&[("entity_ids", ArgType::Array), ("factor", ArgType::Number)]),
        "scale_region" => Some(&[("factor", ArgType::Number)]),
        "zoom_extents" => Some(&[]),
        "capture_dxf_view" => Some(&[]),
        "save_dxf" => Some(&[("path", ArgType::String)]),
        _ => None,
    }
}

/// Tools that create drawing entities (subject to the explicit-layer rule)
pub fn is_entity_creation(tool: &str) -> bool {
    (tool.starts_with("create_") && tool != "create_layer") || tool == "insert_block"
}

/// Tools that activate a layer for subsequent creation steps
pub fn is_layer_activation(tool: &str) -> bool {
    tool == "set_current_layer"
}

/// Scale-type tools subject to the scale-avoidance rule
pub fn is_scale_tool(tool: &str) -> bool {
    matches!(tool, "scale_entities" | "scale_region")
}
