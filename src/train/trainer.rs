//! Trainer: epoch/batch loop driven through the pipe dispatcher

use super::{Mode, Pipe, PipeManager, Stage, Status, TrainerConfig, TrainerContext};
use crate::io::{load_checkpoint, save_checkpoint, Checkpoint};
use crate::optim::OptimizerState;
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, info, info_span};

/// Outcome of one epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochSummary {
    pub mode: Mode,
    pub subset: String,
    /// Batches started
    pub iterations: usize,
    /// A pipe set `stop_epoch`; `on_epoch_end` did not fire
    pub stopped_early: bool,
}

/// Runs epochs by firing lifecycle stages on registered pipes
///
/// The trainer only keeps counters and fires stages. Data loading, the
/// forward pass, loss, optimization, metrics and persistence all live in
/// pipes, which talk to each other through the [`TrainerContext`].
///
/// # Example
///
/// ```
/// use setka::train::{Mode, Pipe, Trainer, TrainerContext};
/// use setka::Result;
///
/// struct FixedLength(usize);
///
/// impl Pipe for FixedLength {
///     fn on_epoch_begin(&mut self, ctx: &mut TrainerContext) -> Result<()> {
///         ctx.n_iterations = Some(self.0);
///         Ok(())
///     }
/// }
///
/// let mut trainer = Trainer::new(vec![Box::new(FixedLength(10))]).unwrap();
/// trainer.one_epoch(Mode::Train, "train").unwrap();
/// trainer.one_epoch(Mode::Train, "train").unwrap();
/// assert_eq!(trainer.epoch(), 2);
/// assert_eq!(trainer.global_iteration(), 20);
/// ```
pub struct Trainer {
    config: TrainerConfig,
    pipes: PipeManager,
    ctx: TrainerContext,
}

impl Trainer {
    /// Create a trainer with the default configuration
    pub fn new(pipes: Vec<Box<dyn Pipe>>) -> Result<Self> {
        Self::with_config(TrainerConfig::default(), pipes)
    }

    /// Register `pipes` in order and fire `on_init`
    pub fn with_config(config: TrainerConfig, pipes: Vec<Box<dyn Pipe>>) -> Result<Self> {
        config.validate()?;

        let mut manager = PipeManager::new();
        for pipe in pipes {
            manager.add_boxed(pipe);
        }

        let mut ctx = TrainerContext::new(config.seed);
        manager.run_stage(Stage::Init, &mut ctx)?;
        info!(pipes = manager.len(), seed = config.seed, "trainer initialized");

        Ok(Self {
            config,
            pipes: manager,
            ctx,
        })
    }

    /// Run one full epoch of `mode` over `subset`
    pub fn one_epoch(&mut self, mode: impl Into<Mode>, subset: &str) -> Result<EpochSummary> {
        self.run_epoch(mode, subset, None)
    }

    /// Run one epoch of at most `n_iterations` batches
    ///
    /// The count supplied by the dataset pipe still bounds the epoch. Without
    /// a dataset pipe, `n_iterations` alone sets the length.
    pub fn run_epoch(
        &mut self,
        mode: impl Into<Mode>,
        subset: &str,
        n_iterations: Option<usize>,
    ) -> Result<EpochSummary> {
        let mode = mode.into();
        let ctx = &mut self.ctx;

        ctx.status.set("mode", mode.as_str());
        ctx.mode = mode.clone();
        ctx.status.set("subset", subset);
        ctx.subset = subset.to_string();

        let train = mode.is_train();
        if train {
            ctx.epoch += 1;
            ctx.status.set("epoch", ctx.epoch);
        }

        let span = info_span!("epoch", mode = %mode, subset, epoch = ctx.epoch);
        let _enter = span.enter();

        ctx.epoch_iteration = 0;
        ctx.stop_epoch = false;

        self.pipes.run_stage(Stage::EpochBegin, ctx)?;

        let total = match (n_iterations, ctx.n_iterations) {
            (Some(cap), Some(supplied)) => cap.min(supplied),
            (Some(cap), None) => cap,
            (None, Some(supplied)) => supplied,
            (None, None) => {
                return Err(Error::MissingIterationCount {
                    mode: mode.to_string(),
                    subset: subset.to_string(),
                })
            }
        };
        debug!(iterations = total, "epoch started");

        for _ in 0..total {
            if train {
                ctx.global_iteration += 1;
                ctx.status.set("iteration", ctx.global_iteration);
            }
            ctx.epoch_iteration += 1;

            self.pipes.run_stage(Stage::BatchBegin, ctx)?;
            self.pipes.run_stage(Stage::BatchRun, ctx)?;
            self.pipes.run_stage(Stage::BatchEnd, ctx)?;

            if ctx.stop_epoch {
                ctx.stop_epoch = false;
                debug!(iteration = ctx.epoch_iteration, "epoch stopped early");
                return Ok(EpochSummary {
                    mode,
                    subset: subset.to_string(),
                    iterations: ctx.epoch_iteration,
                    stopped_early: true,
                });
            }
        }

        self.pipes.run_stage(Stage::EpochEnd, ctx)?;

        Ok(EpochSummary {
            mode,
            subset: subset.to_string(),
            iterations: ctx.epoch_iteration,
            stopped_early: false,
        })
    }

    /// Train for `n_epochs`, evaluating after each
    ///
    /// Every round runs `train` on the train subset, then `valid` on the
    /// train subset and on the valid subset.
    pub fn run_train(&mut self, n_epochs: usize) -> Result<Vec<EpochSummary>> {
        let mut summaries = Vec::with_capacity(n_epochs * 3);
        for _ in 0..n_epochs {
            summaries.push(self.one_epoch(Mode::Train, "train")?);
            summaries.push(self.one_epoch(Mode::Valid, "train")?);
            summaries.push(self.one_epoch(Mode::Valid, "valid")?);
        }
        Ok(summaries)
    }

    pub fn get_optimizers_states(&self) -> Vec<OptimizerState> {
        self.ctx.optimizers.iter().map(|b| b.state()).collect()
    }

    /// Restore every optimizer; nothing is applied unless all states fit
    pub fn set_optimizers_states(&mut self, states: Vec<OptimizerState>) -> Result<()> {
        if states.len() != self.ctx.optimizers.len() {
            return Err(Error::CheckpointMismatch(format!(
                "{} optimizers configured, got {} states",
                self.ctx.optimizers.len(),
                states.len()
            )));
        }
        for (binding, state) in self.ctx.optimizers.iter().zip(&states) {
            binding.validate_state(state)?;
        }
        for (binding, state) in self.ctx.optimizers.iter_mut().zip(states) {
            binding.load_state(state)?;
        }
        Ok(())
    }

    pub fn get_optimizers_flags(&self) -> Vec<bool> {
        self.ctx.optimizers.iter().map(|b| b.is_active()).collect()
    }

    pub fn set_optimizers_flags(&mut self, flags: &[bool]) -> Result<()> {
        if flags.len() != self.ctx.optimizers.len() {
            return Err(Error::CheckpointMismatch(format!(
                "{} optimizers configured, got {} flags",
                self.ctx.optimizers.len(),
                flags.len()
            )));
        }
        for (binding, &flag) in self.ctx.optimizers.iter_mut().zip(flags) {
            binding.set_active(flag);
        }
        Ok(())
    }

    /// Write a checkpoint; the extension picks JSON or YAML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let checkpoint = Checkpoint::capture(&self.ctx);
        save_checkpoint(&checkpoint, path, &self.config.save_config_for(path))?;
        info!(path = %path.display(), epoch = self.ctx.epoch, "trainer saved");
        Ok(())
    }

    /// Restore counters, parameters and optimizers from a checkpoint
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        load_checkpoint(path)?.restore(&mut self.ctx)?;
        info!(path = %path.display(), epoch = self.ctx.epoch, "trainer restored");
        Ok(())
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn pipes(&self) -> &PipeManager {
        &self.pipes
    }

    pub fn context(&self) -> &TrainerContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut TrainerContext {
        &mut self.ctx
    }

    pub fn status(&self) -> &Status {
        &self.ctx.status
    }

    pub fn epoch(&self) -> usize {
        self.ctx.epoch
    }

    pub fn global_iteration(&self) -> usize {
        self.ctx.global_iteration
    }

    pub fn epoch_iteration(&self) -> usize {
        self.ctx.epoch_iteration
    }
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field("pipes", &self.pipes)
            .field("ctx", &self.ctx)
            .finish()
    }
}
