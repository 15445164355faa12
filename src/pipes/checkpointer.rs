//! Periodic checkpointing

use crate::io::{save_checkpoint, Checkpoint, ModelFormat, SaveConfig};
use crate::train::{Pipe, PriorityMap, Stage, TrainerContext};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes trainer checkpoints at epoch end
///
/// After every train epoch `<dir>/<name>_latest.<ext>` is rewritten. When a
/// metric is watched, every epoch over the watched subset that improves on
/// [`TrainerContext::best_metric`] also writes `<dir>/<name>_best.<ext>`.
pub struct Checkpointer {
    dir: PathBuf,
    name: String,
    save_config: SaveConfig,
    watch: Option<(String, String)>,
    higher_is_better: bool,
}

impl Checkpointer {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            save_config: SaveConfig::default(),
            watch: None,
            higher_is_better: false,
        }
    }

    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.save_config.format = format;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.save_config.pretty = pretty;
        self
    }

    /// Keep a `_best` checkpoint for `metric` on `subset`
    pub fn watching(mut self, subset: impl Into<String>, metric: impl Into<String>) -> Self {
        self.watch = Some((subset.into(), metric.into()));
        self
    }

    pub fn maximize(mut self) -> Self {
        self.higher_is_better = true;
        self
    }

    pub fn latest_path(&self) -> PathBuf {
        self.path_for("latest")
    }

    pub fn best_path(&self) -> PathBuf {
        self.path_for("best")
    }

    fn path_for(&self, tag: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{tag}.{}",
            self.name,
            self.save_config.format.extension()
        ))
    }

    fn write(&self, ctx: &TrainerContext, path: &Path) -> Result<()> {
        save_checkpoint(&Checkpoint::capture(ctx), path, &self.save_config)?;
        info!(path = %path.display(), epoch = ctx.epoch, "checkpoint written");
        Ok(())
    }

    fn improves(&self, value: f64, best: Option<f64>) -> bool {
        match best {
            None => true,
            Some(best) if self.higher_is_better => value > best,
            Some(best) => value < best,
        }
    }
}

impl Pipe for Checkpointer {
    fn on_init(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        if !self.save_config.format.is_text() {
            return Err(Error::Config(format!(
                "checkpointer '{}' needs a json or yaml format",
                self.name
            )));
        }
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if ctx.is_train() {
            self.write(ctx, &self.latest_path())?;
        }

        let Some((subset, metric)) = &self.watch else {
            return Ok(());
        };
        if &ctx.subset != subset {
            return Ok(());
        }
        let Some(value) = ctx.metric(subset, metric) else {
            return Ok(());
        };
        if self.improves(value, ctx.best_metric) {
            ctx.best_metric = Some(value);
            self.write(ctx, &self.best_path())?;
        }
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::from_stages([(Stage::EpochEnd, -50)])
    }

    fn name(&self) -> &str {
        "Checkpointer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_checkpoint;
    use crate::train::Mode;

    fn record(ctx: &mut TrainerContext, subset: &str, value: f64) {
        ctx.mode = Mode::Valid;
        ctx.subset = subset.into();
        ctx.metrics
            .entry(subset.into())
            .or_default()
            .insert("mse".into(), value);
    }

    #[test]
    fn test_init_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/checkpoints");
        let mut pipe = Checkpointer::new(&target, "run");

        pipe.on_init(&mut TrainerContext::new(0)).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_safetensors_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipe = Checkpointer::new(dir.path(), "run").with_format(ModelFormat::SafeTensors);
        assert!(matches!(
            pipe.on_init(&mut TrainerContext::new(0)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_latest_written_after_train_epochs_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipe = Checkpointer::new(dir.path(), "run").with_format(ModelFormat::Yaml);
        let mut ctx = TrainerContext::new(0);
        pipe.on_init(&mut ctx).unwrap();

        ctx.mode = Mode::Valid;
        pipe.on_epoch_end(&mut ctx).unwrap();
        assert!(!pipe.latest_path().exists());

        ctx.mode = Mode::Train;
        ctx.epoch = 4;
        pipe.on_epoch_end(&mut ctx).unwrap();
        assert!(pipe.latest_path().ends_with("run_latest.yaml"));
        assert_eq!(load_checkpoint(pipe.latest_path()).unwrap().epoch, 4);
    }

    #[test]
    fn test_best_tracks_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipe = Checkpointer::new(dir.path(), "run").watching("valid", "mse");
        let mut ctx = TrainerContext::new(0);
        pipe.on_init(&mut ctx).unwrap();

        ctx.epoch = 1;
        record(&mut ctx, "valid", 0.5);
        pipe.on_epoch_end(&mut ctx).unwrap();
        assert_eq!(ctx.best_metric, Some(0.5));

        ctx.epoch = 2;
        record(&mut ctx, "valid", 0.7);
        pipe.on_epoch_end(&mut ctx).unwrap();
        assert_eq!(ctx.best_metric, Some(0.5));
        assert_eq!(load_checkpoint(pipe.best_path()).unwrap().epoch, 1);

        ctx.epoch = 3;
        record(&mut ctx, "valid", 0.2);
        pipe.on_epoch_end(&mut ctx).unwrap();
        let best = load_checkpoint(pipe.best_path()).unwrap();
        assert_eq!(best.epoch, 3);
        assert_eq!(best.best_metric, Some(0.2));
    }

    #[test]
    fn test_other_subsets_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipe = Checkpointer::new(dir.path(), "run").watching("valid", "mse");
        let mut ctx = TrainerContext::new(0);
        pipe.on_init(&mut ctx).unwrap();

        record(&mut ctx, "train", 0.1);
        pipe.on_epoch_end(&mut ctx).unwrap();
        assert!(ctx.best_metric.is_none());
        assert!(!pipe.best_path().exists());
    }
}
