//! Trainer configuration

use crate::io::{ModelFormat, SaveConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trainer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Seed for the trainer RNG (dataset shuffling)
    pub seed: u64,

    /// Pretty-print text checkpoints
    pub pretty_checkpoints: bool,

    /// Format used by `Trainer::save` when the path has no known extension
    pub checkpoint_format: ModelFormat,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            pretty_checkpoints: true,
            checkpoint_format: ModelFormat::Json,
        }
    }
}

impl TrainerConfig {
    /// Create a new trainer configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_pretty_checkpoints(mut self, pretty: bool) -> Self {
        self.pretty_checkpoints = pretty;
        self
    }

    pub fn with_checkpoint_format(mut self, format: ModelFormat) -> Self {
        self.checkpoint_format = format;
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("invalid trainer config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.checkpoint_format.is_text() {
            return Err(Error::Config(
                "checkpoints are written as json or yaml; safetensors holds weights only".into(),
            ));
        }
        Ok(())
    }

    /// Save settings for a checkpoint written to `path`
    ///
    /// The extension picks the format when it names a text format.
    pub fn save_config_for(&self, path: &Path) -> SaveConfig {
        let format = ModelFormat::from_path(path)
            .filter(ModelFormat::is_text)
            .unwrap_or(self.checkpoint_format);
        SaveConfig::new(format).with_pretty(self.pretty_checkpoints)
    }
}
