//! On-disk formats for checkpoints and weights

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File format, normally picked from the path extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Json,
    Yaml,
    /// Binary, model weights only
    SafeTensors,
}

impl ModelFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Json => "json",
            ModelFormat::Yaml => "yaml",
            ModelFormat::SafeTensors => "safetensors",
        }
    }

    /// Case-insensitive; `yml` is accepted for YAML
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ModelFormat::Json),
            "yaml" | "yml" => Some(ModelFormat::Yaml),
            "safetensors" => Some(ModelFormat::SafeTensors),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the format can hold a full checkpoint
    pub fn is_text(&self) -> bool {
        matches!(self, ModelFormat::Json | ModelFormat::Yaml)
    }
}

/// How a checkpoint is written
#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub format: ModelFormat,
    /// Indent JSON; YAML output is always block style
    pub pretty: bool,
}

impl SaveConfig {
    pub fn new(format: ModelFormat) -> Self {
        Self {
            format,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self::new(ModelFormat::Json)
    }
}
