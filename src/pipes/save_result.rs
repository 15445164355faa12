//! Per-sample results of evaluation epochs

use crate::train::{Pipe, TrainerContext};
use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Maps one input row and its output row to the stored result
pub type ResultFn = Box<dyn Fn(&[f32], &[f32]) -> Value>;

/// Writes one JSON file per sample during non-train epochs
///
/// Each file is `<dir>/<epoch>/<id>.json`, where `id` is the row identifier
/// from the dataset view, so a prediction can be traced back to its source
/// item. By default the file holds the output row; [`SaveResult::with_fn`]
/// stores `f(input_row, output_row)` instead.
///
/// Runs at batch end with priority 0, before [`ModelHandler`] drops the
/// output.
///
/// [`ModelHandler`]: super::ModelHandler
pub struct SaveResult {
    dir: PathBuf,
    f: Option<ResultFn>,
    written: usize,
}

impl SaveResult {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            f: None,
            written: 0,
        }
    }

    pub fn with_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&[f32], &[f32]) -> Value + 'static,
    {
        self.f = Some(Box::new(f));
        self
    }

    /// Directory holding the results of `epoch`
    pub fn epoch_dir(&self, epoch: usize) -> PathBuf {
        self.dir.join(epoch.to_string())
    }

    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Pipe for SaveResult {
    fn on_init(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn on_epoch_begin(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        self.written = 0;
        if !ctx.is_train() {
            std::fs::create_dir_all(self.epoch_dir(ctx.epoch))?;
        }
        Ok(())
    }

    fn on_batch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if ctx.is_train() {
            return Ok(());
        }
        let batch = ctx.input()?;
        let rows = batch.size();
        if rows == 0 {
            return Ok(());
        }

        let inputs = batch.inputs.to_vec();
        let outputs = ctx.output()?.to_vec();
        if inputs.len() % rows != 0 || outputs.len() % rows != 0 {
            return Err(Error::ShapeMismatch {
                expected: vec![rows],
                got: vec![inputs.len(), outputs.len()],
            });
        }

        let dir = self.epoch_dir(ctx.epoch);
        let input_rows = inputs.chunks(inputs.len() / rows);
        let output_rows = outputs.chunks(outputs.len() / rows);
        for ((id, input), output) in batch.ids.iter().zip(input_rows).zip(output_rows) {
            let value = match &self.f {
                Some(f) => f(input, output),
                None => Value::from(output.to_vec()),
            };
            self.write(&dir.join(format!("{id}.json")), &value)?;
        }

        self.written += rows;
        debug!(rows, subset = %ctx.subset, "results saved");
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if !ctx.is_train() {
            info!(
                samples = self.written,
                dir = %self.epoch_dir(ctx.epoch).display(),
                "epoch results saved"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "SaveResult"
    }
}
