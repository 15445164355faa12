//! Trainer checkpoints
//!
//! A checkpoint is one record holding the counters, model parameters,
//! optimizer states and optimizer active flags. Restoring validates the whole
//! record against the live configuration first, so a mismatch leaves the
//! trainer untouched.

use super::format::{ModelFormat, SaveConfig};
use crate::optim::{OptimizerState, ScheduleProgress};
use crate::train::{MetricsSnapshot, TrainerContext};
use crate::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One named parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Serializable trainer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub global_iteration: usize,
    pub model_state: Vec<ParameterState>,
    pub optimizers_states: Vec<OptimizerState>,
    pub optimizers_flags: Vec<bool>,
    /// Learning-rate schedule step counts per optimizer; absent in older files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedules: Vec<ScheduleProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_metric: Option<f64>,
}

impl Checkpoint {
    /// Snapshot the restorable parts of `ctx`
    pub fn capture(ctx: &TrainerContext) -> Self {
        let model_state = ctx
            .model
            .as_ref()
            .map(|model| {
                model
                    .borrow()
                    .parameters()
                    .into_iter()
                    .map(|(name, tensor)| ParameterState {
                        name,
                        shape: vec![tensor.len()],
                        data: tensor.to_vec(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            epoch: ctx.epoch,
            global_iteration: ctx.global_iteration,
            model_state,
            optimizers_states: ctx.optimizers.iter().map(|b| b.state()).collect(),
            optimizers_flags: ctx.optimizers.iter().map(|b| b.is_active()).collect(),
            schedules: ctx
                .optimizers
                .iter()
                .map(|b| b.schedule_progress())
                .collect(),
            metrics: (!ctx.metrics.is_empty()).then(|| ctx.metrics.clone()),
            best_metric: ctx.best_metric,
        }
    }

    /// Check that this checkpoint fits `ctx` without changing anything
    pub fn validate(&self, ctx: &TrainerContext) -> Result<()> {
        let live = match &ctx.model {
            Some(model) => model.borrow().parameters(),
            None if self.model_state.is_empty() => Vec::new(),
            None => {
                return Err(Error::CheckpointMismatch(
                    "checkpoint has model parameters but no model is installed".into(),
                ))
            }
        };

        if live.len() != self.model_state.len() {
            return Err(Error::CheckpointMismatch(format!(
                "model has {} parameters, checkpoint has {}",
                live.len(),
                self.model_state.len()
            )));
        }
        for ((name, tensor), saved) in live.iter().zip(&self.model_state) {
            if *name != saved.name {
                return Err(Error::CheckpointMismatch(format!(
                    "expected parameter '{name}', found '{}'",
                    saved.name
                )));
            }
            let numel: usize = saved.shape.iter().product();
            if numel != tensor.len() || saved.data.len() != tensor.len() {
                return Err(Error::CheckpointMismatch(format!(
                    "parameter '{name}' has {} values, checkpoint has shape {:?} with {} values",
                    tensor.len(),
                    saved.shape,
                    saved.data.len()
                )));
            }
        }

        let n = ctx.optimizers.len();
        if self.optimizers_states.len() != n || self.optimizers_flags.len() != n {
            return Err(Error::CheckpointMismatch(format!(
                "{n} optimizers configured, checkpoint has {} states and {} flags",
                self.optimizers_states.len(),
                self.optimizers_flags.len()
            )));
        }
        for (binding, state) in ctx.optimizers.iter().zip(&self.optimizers_states) {
            binding.validate_state(state)?;
        }

        if !self.schedules.is_empty() {
            if self.schedules.len() != n {
                return Err(Error::CheckpointMismatch(format!(
                    "{n} optimizers configured, checkpoint has {} schedule records",
                    self.schedules.len()
                )));
            }
            for (binding, progress) in ctx.optimizers.iter().zip(&self.schedules) {
                binding.validate_schedule_progress(progress)?;
            }
        }

        Ok(())
    }

    /// Apply this checkpoint to `ctx`
    pub fn restore(self, ctx: &mut TrainerContext) -> Result<()> {
        self.validate(ctx)?;

        if let Some(model) = &ctx.model {
            let live = model.borrow().parameters();
            for ((_, tensor), saved) in live.iter().zip(self.model_state) {
                tensor.set_data(Array1::from(saved.data))?;
            }
        }

        for ((binding, state), flag) in ctx
            .optimizers
            .iter_mut()
            .zip(self.optimizers_states)
            .zip(self.optimizers_flags)
        {
            binding.load_state(state)?;
            binding.set_active(flag);
        }
        for (binding, progress) in ctx.optimizers.iter_mut().zip(&self.schedules) {
            binding.load_schedule_progress(progress)?;
        }

        ctx.epoch = self.epoch;
        ctx.global_iteration = self.global_iteration;
        ctx.status.set("epoch", self.epoch);
        ctx.status.set("iteration", self.global_iteration);
        if let Some(metrics) = self.metrics {
            ctx.metrics = metrics;
        }
        ctx.best_metric = self.best_metric;

        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `checkpoint` to `path`
///
/// The data goes to a sibling temporary file first and is renamed into
/// place, so readers never see a partial checkpoint.
pub fn save_checkpoint(
    checkpoint: &Checkpoint,
    path: impl AsRef<Path>,
    config: &SaveConfig,
) -> Result<()> {
    let path = path.as_ref();

    let data = match config.format {
        ModelFormat::Json => {
            let encoded = if config.pretty {
                serde_json::to_string_pretty(checkpoint)
            } else {
                serde_json::to_string(checkpoint)
            };
            encoded.map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
        }
        ModelFormat::Yaml => serde_yaml::to_string(checkpoint)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
        ModelFormat::SafeTensors => {
            return Err(Error::Serialization(
                "SafeTensors holds weights only; use save_weights".to_string(),
            ))
        }
    };

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    debug!(path = %path.display(), epoch = checkpoint.epoch, "checkpoint written");
    Ok(())
}

/// Read a checkpoint, detecting the format from the extension
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Serialization("File has no extension".to_string()))?;
    let format = ModelFormat::from_extension(ext)
        .ok_or_else(|| Error::Serialization(format!("Unsupported file extension: {ext}")))?;

    if !format.is_text() {
        return Err(Error::Serialization(
            "SafeTensors files hold weights only; use load_weights".to_string(),
        ));
    }

    let content = std::fs::read_to_string(path)?;
    match format {
        ModelFormat::Yaml => serde_yaml::from_str(&content)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}"))),
        _ => serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}"))),
    }
}
