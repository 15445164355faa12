//! Pipe trait and priority-ordered stage dispatch
//!
//! A pipe hooks into any subset of the lifecycle stages:
//! - `on_init`
//! - `on_epoch_begin` / `on_epoch_end`
//! - `on_batch_begin` / `on_batch_run` / `on_batch_end`
//!
//! # Example
//!
//! ```
//! use setka::train::{Pipe, PriorityMap, Stage, TrainerContext};
//! use setka::Result;
//!
//! struct CountBatches(usize);
//!
//! impl Pipe for CountBatches {
//!     fn on_batch_end(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//!
//!     fn priority(&self) -> PriorityMap {
//!         PriorityMap::from_stages([(Stage::BatchEnd, -50)])
//!     }
//! }
//! ```

use super::{PriorityMap, Stage, TrainerContext};
use crate::Result;
use tracing::{debug, trace};

/// A pluggable participant in the training loop
///
/// Every stage method defaults to a no-op, so a pipe implements only the
/// stages it cares about. Errors returned from a stage abort the remaining
/// pipes of that stage and the enclosing epoch.
pub trait Pipe {
    fn on_init(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        Ok(())
    }

    fn on_batch_begin(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        Ok(())
    }

    fn on_batch_run(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        Ok(())
    }

    fn on_batch_end(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        Ok(())
    }

    /// Ordering weight per stage; higher runs first
    ///
    /// Read once, when the pipe is registered.
    fn priority(&self) -> PriorityMap {
        PriorityMap::default()
    }

    /// Get pipe name for logging
    fn name(&self) -> &str {
        "Pipe"
    }
}

/// Call the hook of `pipe` for `stage`
pub fn dispatch(pipe: &mut dyn Pipe, stage: Stage, ctx: &mut TrainerContext) -> Result<()> {
    match stage {
        Stage::Init => pipe.on_init(ctx),
        Stage::EpochBegin => pipe.on_epoch_begin(ctx),
        Stage::BatchBegin => pipe.on_batch_begin(ctx),
        Stage::BatchRun => pipe.on_batch_run(ctx),
        Stage::BatchEnd => pipe.on_batch_end(ctx),
        Stage::EpochEnd => pipe.on_epoch_end(ctx),
    }
}

struct Registered {
    pipe: Box<dyn Pipe>,
    priority: PriorityMap,
}

/// Holds registered pipes and runs them stage by stage
///
/// For each stage, pipes run by descending priority. Equal priorities keep
/// registration order. Orders are computed on registration, not per call.
#[derive(Default)]
pub struct PipeManager {
    pipes: Vec<Registered>,
    orders: [Vec<usize>; Stage::ALL.len()],
}

impl PipeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipe and normalize its priority
    pub fn add<P: Pipe + 'static>(&mut self, pipe: P) {
        self.add_boxed(Box::new(pipe));
    }

    pub fn add_boxed(&mut self, pipe: Box<dyn Pipe>) {
        let priority = pipe.priority();
        debug!(pipe = pipe.name(), ?priority, "registered pipe");
        self.pipes.push(Registered { pipe, priority });
        self.rebuild_orders();
    }

    fn rebuild_orders(&mut self) {
        for stage in Stage::ALL {
            let mut order: Vec<usize> = (0..self.pipes.len()).collect();
            // stable: ties keep registration order
            order.sort_by_key(|&i| std::cmp::Reverse(self.pipes[i].priority.get(stage)));
            self.orders[stage.index()] = order;
        }
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Pipe names in the order they run for `stage`
    pub fn order(&self, stage: Stage) -> Vec<&str> {
        self.orders[stage.index()]
            .iter()
            .map(|&i| self.pipes[i].pipe.name())
            .collect()
    }

    /// Run `stage` on every pipe, stopping at the first error
    pub fn run_stage(&mut self, stage: Stage, ctx: &mut TrainerContext) -> Result<()> {
        trace!(%stage, "running stage");
        for &i in &self.orders[stage.index()] {
            dispatch(self.pipes[i].pipe.as_mut(), stage, ctx)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PipeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.pipes.iter().map(|r| r.pipe.name()))
            .finish()
    }
}
