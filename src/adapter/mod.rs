//! Canonical-to-native argument adaptation
//!
//! Plans are written against canonical arg names; the real drawing tool may
//! want different keys or shapes. An args map is an ordered list of
//! declarative rules per tool (plus a global list applied first). Rules are
//! applied in declaration order, so a later rule can act on a key an earlier
//! rule introduced. The identity map reproduces its input unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::error::{EngineError, Result};
use crate::core::types::{JsonMap, ARGS_MAP_VERSION};

/// Args-map document (`args-map-v1`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgsMapDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Rules applied to every tool, before the per-tool rules
    #[serde(default)]
    pub global: Vec<MapRule>,
    /// Per-tool ordered rule lists; an absent tool means identity
    #[serde(default)]
    pub tools: HashMap<String, Vec<MapRule>>,
}

/// One declarative mapping rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapRule {
    /// Move `from` to `to`; a no-op when `from` is absent or `to` exists
    Rename { from: String, to: String },
    /// Inject a fixed value, overwriting any prior value under `key`
    Const { key: String, value: Value },
    /// Remove `key` if present
    Drop { key: String },
    /// Apply the registered pure function `name` to the value under `key`
    Transform { key: String, name: String },
}

/// Pure value transformation; must not depend on anything but its input
pub type TransformFn = fn(&Value) -> std::result::Result<Value, String>;

/// Named transform functions referenced by `MapRule::Transform`
#[derive(Debug)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Registry with the built-in coordinate/angle transforms
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("point_to_xy", point_to_xy);
        registry.register("xy_to_point", xy_to_point);
        registry.register("deg_to_rad", deg_to_rad);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, transform: TransformFn) {
        self.transforms.insert(name.into(), transform);
    }

    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `[x, y]` → `{"x": x, "y": y}`
fn point_to_xy(value: &Value) -> std::result::Result<Value, String> {
    let pair = value
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| format!("expected [x, y], got {value}"))?;
    match (pair[0].as_f64(), pair[1].as_f64()) {
        (Some(x), Some(y)) => Ok(serde_json::json!({"x": x, "y": y})),
        _ => Err(format!("expected numeric [x, y], got {value}")),
    }
}

/// `{"x": x, "y": y}` → `[x, y]`
fn xy_to_point(value: &Value) -> std::result::Result<Value, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("expected {{x, y}}, got {value}"))?;
    match (
        obj.get("x").and_then(Value::as_f64),
        obj.get("y").and_then(Value::as_f64),
    ) {
        (Some(x), Some(y)) => Ok(serde_json::json!([x, y])),
        _ => Err(format!("expected numeric {{x, y}}, got {value}")),
    }
}

/// Degrees → radians
fn deg_to_rad(value: &Value) -> std::result::Result<Value, String> {
    let degrees = value
        .as_f64()
        .ok_or_else(|| format!("expected a number, got {value}"))?;
    Ok(serde_json::json!(degrees * std::f64::consts::PI / 180.0))
}

/// Applies an args map to canonical step args
///
/// Construction validates every transform reference eagerly, so a
/// misconfigured map surfaces before any execution begins.
#[derive(Debug)]
pub struct ArgsAdapter {
    doc: ArgsMapDoc,
    transforms: TransformRegistry,
}

impl ArgsAdapter {
    pub fn new(doc: ArgsMapDoc, transforms: TransformRegistry) -> Result<Self> {
        if let Some(version) = &doc.version {
            if version != ARGS_MAP_VERSION {
                return Err(EngineError::ArgsMap(format!(
                    "unsupported version '{version}' (expected '{ARGS_MAP_VERSION}')"
                )));
            }
        }

        let global_refs = doc.global.iter().map(|rule| ("*", rule));
        let tool_refs = doc
            .tools
            .iter()
            .flat_map(|(tool, rules)| rules.iter().map(move |rule| (tool.as_str(), rule)));

        for (tool, rule) in global_refs.chain(tool_refs) {
            if let MapRule::Transform { name, .. } = rule {
                if transforms.get(name).is_none() {
                    return Err(EngineError::UnknownTransform {
                        tool: tool.to_string(),
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(Self { doc, transforms })
    }

    /// Identity adapter (no rules, built-in transforms)
    pub fn identity() -> Self {
        Self {
            doc: ArgsMapDoc::default(),
            transforms: TransformRegistry::builtin(),
        }
    }

    /// Adapt canonical args for `tool`
    pub fn adapt(&self, tool: &str, args: &JsonMap) -> Result<JsonMap> {
        let mut out = args.clone();
        for rule in &self.doc.global {
            self.apply(rule, &mut out)?;
        }
        if let Some(rules) = self.doc.tools.get(tool) {
            for rule in rules {
                self.apply(rule, &mut out)?;
            }
        }
        Ok(out)
    }

    fn apply(&self, rule: &MapRule, args: &mut JsonMap) -> Result<()> {
        match rule {
            MapRule::Rename { from, to } => {
                if !args.contains_key(to) {
                    if let Some(value) = args.remove(from) {
                        args.insert(to.clone(), value);
                    }
                }
            }
            MapRule::Const { key, value } => {
                args.insert(key.clone(), value.clone());
            }
            MapRule::Drop { key } => {
                args.remove(key);
            }
            MapRule::Transform { key, name } => {
                if let Some(value) = args.get(key) {
                    // Validated at construction time.
                    let transform = self.transforms.get(name).ok_or_else(|| {
                        EngineError::UnknownTransform {
                            tool: String::new(),
                            name: name.clone(),
                        }
                    })?;
                    let replaced =
                        transform(value).map_err(|message| EngineError::TransformFailed {
                            name: name.clone(),
                            message,
                        })?;
                    args.insert(key.clone(), replaced);
                }
            }
        }
        Ok(())
    }
}
