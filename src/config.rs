//! Generator configuration
//!
//! Read from the optional `config` mapping of the schema document:
//!
//! ```yaml
//! config:
//!   derive: [Debug, Clone, PartialEq]
//!   visibility: pub
//!   strict: true
//! ```
//!
//! Unknown keys are warned about and ignored.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Configuration carried alongside the parsed schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Identifiers pasted into a `#[derive(...)]` attribute on every type.
    /// No attribute is emitted when empty.
    #[serde(default)]
    pub derive: Vec<String>,

    /// Visibility prepended to every declaration and every record field
    #[serde(default = "default_visibility")]
    pub visibility: String,

    /// Error on dangling type references instead of accepting them silently
    #[serde(default)]
    pub strict: bool,
}

fn default_visibility() -> String {
    "pub".to_string()
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            derive: Vec::new(),
            visibility: default_visibility(),
            strict: false,
        }
    }
}

impl CodegenConfig {
    /// Decode from the raw `config` mapping of the schema document.
    ///
    /// Recognized keys: `derive`, `visibility`, `strict`.
    pub fn from_value(value: &serde_yaml::Value) -> Result<Self> {
        if let Some(mapping) = value.as_mapping() {
            for (key, _) in mapping {
                if let Some(name) = key.as_str() {
                    if !matches!(name, "derive" | "visibility" | "strict") {
                        warn!(key = name, "ignoring unknown config key");
                    }
                }
            }
        }
        let config: CodegenConfig = serde_yaml::from_value(value.clone())?;
        Ok(config)
    }

    /// The derive attribute line, or None when no derives are configured
    pub fn derive_attr(&self) -> Option<String> {
        if self.derive.is_empty() {
            None
        } else {
            Some(format!("#[derive({})]", self.derive.join(", ")))
        }
    }
}
