//! QA rule configuration loaded from TOML
//!
//! ```toml
//! required_layers = ["Walls", "Dims", "Title"]
//! no_entities_on_layer = "0"
//! placeholder_texts = true
//! min_dimension_count = 1
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core::error::Result;

/// Which rules run and with what parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QaConfig {
    /// Layers that must exist; empty list disables the rule
    #[serde(default)]
    pub required_layers: Vec<String>,
    /// Layer that must carry no entities; absent disables the rule
    #[serde(default = "default_bare_layer")]
    pub no_entities_on_layer: Option<String>,
    #[serde(default = "default_true")]
    pub placeholder_texts: bool,
    /// Minimum dimension entity count; absent disables the rule
    #[serde(default = "default_min_dimensions")]
    pub min_dimension_count: Option<usize>,
}

fn default_bare_layer() -> Option<String> {
    Some("0".to_string())
}

fn default_true() -> bool {
    true
}

fn default_min_dimensions() -> Option<usize> {
    Some(1)
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            required_layers: Vec::new(),
            no_entities_on_layer: default_bare_layer(),
            placeholder_texts: true,
            min_dimension_count: default_min_dimensions(),
        }
    }
}

impl QaConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_toml(&fs::read_to_string(path)?)
    }
}
