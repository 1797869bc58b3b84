//! Built-in macro library
//!
//! Macros fix the repetitive, regular parts of a drafting plan so the
//! planner only supplies parameters. All child args are in canonical form;
//! the args adapter reshapes them for the real tool afterwards.

use serde_json::{json, Value};

use crate::core::error::{EngineError, Result};
use crate::core::types::JsonMap;
use crate::macros::registry::{MacroDef, MacroRegistry, ParamSpec};
use crate::plan::types::Step;

/// Registry preloaded with every built-in macro
pub fn builtin_registry() -> MacroRegistry {
    let mut registry = MacroRegistry::new();
    registry.register(Box::new(SetupLayers));
    registry.register(Box::new(RowLayout));
    registry.register(Box::new(TerminalGrid));
    registry.register(Box::new(ScheduleTable));
    registry.register(Box::new(QaSnapshot));
    registry.register(Box::new(FitAndSave));
    registry
}

fn bad_args(step_id: &str, message: impl Into<String>) -> EngineError {
    EngineError::MacroArgs {
        step_id: step_id.to_string(),
        message: message.into(),
    }
}

fn obj(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

fn f64_arg(args: &JsonMap, key: &str, step_id: &str) -> Result<f64> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| bad_args(step_id, format!("'{key}' must be a number")))
}

fn f64_or(args: &JsonMap, key: &str, default: f64, step_id: &str) -> Result<f64> {
    match args.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| bad_args(step_id, format!("'{key}' must be a number"))),
    }
}

fn usize_arg(args: &JsonMap, key: &str, step_id: &str) -> Result<usize> {
    args.get(key)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| bad_args(step_id, format!("'{key}' must be a non-negative integer")))
}

fn str_arg<'a>(args: &'a JsonMap, key: &str, step_id: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_args(step_id, format!("'{key}' must be a string")))
}

fn array_arg<'a>(args: &'a JsonMap, key: &str, step_id: &str) -> Result<&'a [Value]> {
    args.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| bad_args(step_id, format!("'{key}' must be an array")))
}

/// `[x, y]` coordinate pair
fn pair_arg(args: &JsonMap, key: &str, step_id: &str) -> Result<(f64, f64)> {
    let items = array_arg(args, key, step_id)?;
    match items {
        [x, y] => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(bad_args(step_id, format!("'{key}' must be [x, y] numbers"))),
        },
        _ => Err(bad_args(step_id, format!("'{key}' must be [x, y]"))),
    }
}

fn set_layer_step(step_id: &str, layer: &str) -> Step {
    Step::primitive(
        format!("{step_id}.SCL"),
        "set_current_layer",
        obj(json!({"name": layer})),
    )
}

/// `setup_layers`: one `create_layer` per declared layer object
pub struct SetupLayers;

impl MacroDef for SetupLayers {
    fn name(&self) -> &'static str {
        "setup_layers"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("layers")];
        PARAMS
    }

    fn expand(&self, args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let layers = array_arg(args, "layers", step_id)?;
        let mut steps = Vec::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            let Some(layer) = layer.as_object() else {
                return Err(bad_args(step_id, "each layer must be an object"));
            };
            if !layer.get("name").map(Value::is_string).unwrap_or(false) {
                return Err(bad_args(step_id, "each layer needs a string 'name'"));
            }
            steps.push(Step::primitive(
                format!("{step_id}.L{}", i + 1),
                "create_layer",
                layer.clone(),
            ));
        }
        Ok(steps)
    }
}

/// `row_layout`: `count` block insertions spaced along one axis
pub struct RowLayout;

impl MacroDef for RowLayout {
    fn name(&self) -> &'static str {
        "row_layout"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("block"),
            ParamSpec::required("count"),
            ParamSpec::required("spacing"),
            ParamSpec::optional("axis"),
            ParamSpec::optional("origin"),
            ParamSpec::optional("layer"),
        ];
        PARAMS
    }

    fn expand(&self, args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let block = str_arg(args, "block", step_id)?;
        let count = usize_arg(args, "count", step_id)?;
        let spacing = f64_arg(args, "spacing", step_id)?;
        let axis = match args.get("axis") {
            None => "x",
            Some(v) => match v.as_str() {
                Some(a @ ("x" | "y")) => a,
                _ => return Err(bad_args(step_id, "'axis' must be \"x\" or \"y\"")),
            },
        };
        let (ox, oy) = match args.get("origin") {
            None => (0.0, 0.0),
            Some(_) => pair_arg(args, "origin", step_id)?,
        };

        let mut steps = Vec::with_capacity(count + 1);
        if let Some(layer) = args.get("layer") {
            let Some(layer) = layer.as_str() else {
                return Err(bad_args(step_id, "'layer' must be a string"));
            };
            steps.push(set_layer_step(step_id, layer));
        }

        for i in 0..count {
            let offset = i as f64 * spacing;
            let position = if axis == "x" {
                json!([ox + offset, oy])
            } else {
                json!([ox, oy + offset])
            };
            steps.push(Step::primitive(
                format!("{step_id}.I{}", i + 1),
                "insert_block",
                obj(json!({"name": block, "position": position})),
            ));
        }
        Ok(steps)
    }
}

/// `terminal_grid`: rows × columns of numbered terminal blocks
///
/// Logical numbering runs down each column: column 1 holds 1..rows,
/// column 2 holds rows+1..2*rows, and so on.
pub struct TerminalGrid;

impl MacroDef for TerminalGrid {
    fn name(&self) -> &'static str {
        "terminal_grid"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("block"),
            ParamSpec::required("origin"),
            ParamSpec::required("spacing"),
            ParamSpec::required("rows"),
            ParamSpec::required("columns"),
            ParamSpec::optional("layer"),
            ParamSpec::optional("label_height"),
            ParamSpec::optional("label_offset"),
            ParamSpec::optional("start_number"),
        ];
        PARAMS
    }

    fn expand(&self, args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let block = str_arg(args, "block", step_id)?;
        let (ox, oy) = pair_arg(args, "origin", step_id)?;
        let (sx, sy) = pair_arg(args, "spacing", step_id)?;
        let rows = usize_arg(args, "rows", step_id)?;
        let columns = usize_arg(args, "columns", step_id)?;
        let label_height = f64_or(args, "label_height", 0.15, step_id)?;
        let (lx, ly) = match args.get("label_offset") {
            None => (-0.5, 0.1),
            Some(_) => pair_arg(args, "label_offset", step_id)?,
        };
        let start = match args.get("start_number") {
            None => 1,
            Some(_) => usize_arg(args, "start_number", step_id)?,
        };

        let mut steps = Vec::with_capacity(rows * columns * 2 + 1);
        if let Some(layer) = args.get("layer").and_then(Value::as_str) {
            steps.push(set_layer_step(step_id, layer));
        }

        for col in 0..columns {
            for row in 0..rows {
                let x = ox + col as f64 * sx;
                let y = oy - row as f64 * sy;
                let unit = start + col * rows + row;
                let suffix = format!("{step_id}.C{}.R{}", col + 1, row + 1);
                steps.push(Step::primitive(
                    format!("{suffix}.B"),
                    "insert_block",
                    obj(json!({"name": block, "position": [x, y]})),
                ));
                steps.push(Step::primitive(
                    format!("{suffix}.T"),
                    "create_text",
                    obj(json!({
                        "insert": [x + lx, y + ly],
                        "height": label_height,
                        "text": unit.to_string(),
                        "align": "LEFT"
                    })),
                ));
            }
        }
        Ok(steps)
    }
}

/// `schedule_table`: bordered header/rows table built from lines and text
pub struct ScheduleTable;

impl MacroDef for ScheduleTable {
    fn name(&self) -> &'static str {
        "schedule_table"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("origin"),
            ParamSpec::required("col_w"),
            ParamSpec::optional("row_h"),
            ParamSpec::optional("headers"),
            ParamSpec::optional("rows"),
            ParamSpec::optional("text_height"),
            ParamSpec::optional("layer"),
        ];
        PARAMS
    }

    fn expand(&self, args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let (x0, y0) = pair_arg(args, "origin", step_id)?;
        let col_w: Vec<f64> = array_arg(args, "col_w", step_id)?
            .iter()
            .map(|v| v.as_f64())
            .collect::<Option<_>>()
            .ok_or_else(|| bad_args(step_id, "'col_w' must be an array of numbers"))?;
        if col_w.is_empty() {
            return Err(bad_args(step_id, "'col_w' must not be empty"));
        }
        let row_h = f64_or(args, "row_h", 300.0, step_id)?;
        let text_height = f64_or(args, "text_height", 200.0, step_id)?;
        let empty = Vec::new();
        let headers = args
            .get("headers")
            .and_then(Value::as_array)
            .unwrap_or(&empty);
        let rows = args.get("rows").and_then(Value::as_array).unwrap_or(&empty);

        let ncols = col_w.len();
        let nrows = 1 + rows.len();
        let width: f64 = col_w.iter().sum();
        let height = nrows as f64 * row_h;

        let mut steps = Vec::new();
        if let Some(layer) = args.get("layer").and_then(Value::as_str) {
            steps.push(set_layer_step(step_id, layer));
        }

        steps.push(Step::primitive(
            format!("{step_id}.OUT"),
            "create_rectangle",
            obj(json!({"p1": [x0, y0], "p2": [x0 + width, y0 - height]})),
        ));

        let mut x = x0;
        for (ci, w) in col_w.iter().take(ncols - 1).enumerate() {
            x += w;
            steps.push(Step::primitive(
                format!("{step_id}.V{}", ci + 1),
                "create_line",
                obj(json!({"start": [x, y0], "end": [x, y0 - height]})),
            ));
        }

        let mut y = y0;
        for ri in 0..nrows - 1 {
            y -= row_h;
            steps.push(Step::primitive(
                format!("{step_id}.H{}", ri + 1),
                "create_line",
                obj(json!({"start": [x0, y], "end": [x0 + width, y]})),
            ));
        }

        let cell_text = |value: &Value| -> String {
            match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        };

        let mut cx = x0;
        for (ci, header) in headers.iter().enumerate().take(ncols) {
            let w = col_w[ci];
            steps.push(Step::primitive(
                format!("{step_id}.HT{}", ci + 1),
                "create_text",
                obj(json!({
                    "insert": [cx + w / 2.0, y0 - row_h / 2.0],
                    "height": text_height,
                    "text": cell_text(header),
                    "align": "CENTER"
                })),
            ));
            cx += w;
        }

        for (ri, row) in rows.iter().enumerate() {
            let Some(cells) = row.as_array() else {
                return Err(bad_args(step_id, "each row must be an array"));
            };
            let cy = y0 - row_h * (ri as f64 + 1.0) - row_h / 2.0;
            let mut cx = x0;
            for (ci, w) in col_w.iter().enumerate() {
                let cell = cells.get(ci).map(cell_text).unwrap_or_default();
                steps.push(Step::primitive(
                    format!("{step_id}.T{}.{}", ri + 1, ci + 1),
                    "create_text",
                    obj(json!({
                        "insert": [cx + w / 2.0, cy],
                        "height": text_height,
                        "text": cell,
                        "align": "CENTER"
                    })),
                ));
                cx += w;
            }
        }
        Ok(steps)
    }
}

/// `qa_snapshot`: zoom to extents and capture a view, bound to `$snapshot`
pub struct QaSnapshot;

impl MacroDef for QaSnapshot {
    fn name(&self) -> &'static str {
        "qa_snapshot"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[];
        PARAMS
    }

    fn expand(&self, _args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let mut capture = Step::primitive(
            format!("{step_id}.CAP"),
            "capture_dxf_view",
            obj(json!({"format": "png_base64"})),
        );
        capture.save_as = Some("snapshot".into());
        Ok(vec![
            Step::primitive(format!("{step_id}.ZE"), "zoom_extents", JsonMap::new()),
            capture,
        ])
    }
}

/// `fit_and_save`: zoom to extents then save the drawing
pub struct FitAndSave;

impl MacroDef for FitAndSave {
    fn name(&self) -> &'static str {
        "fit_and_save"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::optional("path")];
        PARAMS
    }

    fn expand(&self, args: &JsonMap, step_id: &str) -> Result<Vec<Step>> {
        let path = match args.get("path") {
            None => "out.dxf",
            Some(v) => v
                .as_str()
                .ok_or_else(|| bad_args(step_id, "'path' must be a string"))?,
        };
        Ok(vec![
            Step::primitive(format!("{step_id}.ZE"), "zoom_extents", JsonMap::new()),
            Step::primitive(
                format!("{step_id}.SAVE"),
                "save_dxf",
                obj(json!({"path": path})),
            ),
        ])
    }
}
