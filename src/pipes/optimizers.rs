//! Optimization coordinator

use crate::optim::OptimizerBinding;
use crate::train::{Pipe, TrainerContext};
use crate::{Error, Result};
use std::ops::Range;
use tracing::debug;

/// Drives the optimizer bindings through each training batch
///
/// At `on_init` the bindings move into [`TrainerContext::optimizers`], where
/// the trainer and other pipes can reach them. In train mode:
/// - `on_batch_begin`: every active binding clears its gradients and puts its
///   module into training behavior with trainable parameters
/// - `on_batch_end`: every active binding applies one update, then the whole
///   model returns to evaluation behavior with frozen parameters, and every
///   per-iteration schedule advances
/// - `on_epoch_begin` from the second epoch on: every per-epoch schedule
///   advances
///
/// The active flag is read fresh on each batch.
pub struct OneStepOptimizers {
    pending: Vec<OptimizerBinding>,
    range: Range<usize>,
}

impl OneStepOptimizers {
    pub fn new(bindings: Vec<OptimizerBinding>) -> Self {
        Self {
            pending: bindings,
            range: 0..0,
        }
    }

    fn bindings<'a>(&self, ctx: &'a mut TrainerContext) -> Result<&'a mut [OptimizerBinding]> {
        let len = ctx.optimizers.len();
        ctx.optimizers
            .get_mut(self.range.clone())
            .ok_or_else(|| {
                Error::callback(
                    "OneStepOptimizers",
                    format!(
                        "bindings {:?} missing, context holds {len}",
                        self.range
                    ),
                )
            })
    }
}

impl Pipe for OneStepOptimizers {
    fn on_init(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let start = ctx.optimizers.len();
        ctx.optimizers.append(&mut self.pending);
        self.range = start..ctx.optimizers.len();
        debug!(bindings = self.range.len(), "optimizers installed");
        Ok(())
    }

    fn on_epoch_begin(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if ctx.is_train() && ctx.epoch > 1 {
            for binding in self.bindings(ctx)? {
                binding.step_epoch_schedulers();
            }
        }
        Ok(())
    }

    fn on_batch_begin(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if ctx.is_train() {
            for binding in self.bindings(ctx)? {
                if binding.is_active() {
                    binding.prepare();
                }
            }
        }
        Ok(())
    }

    fn on_batch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let train = ctx.is_train();
        if train {
            for binding in self.bindings(ctx)? {
                if binding.is_active() {
                    binding.step();
                }
            }
        }

        if let Some(model) = &ctx.model {
            let mut model = model.borrow_mut();
            model.set_training(false);
            model.set_requires_grad(false);
        }

        if train && ctx.global_iteration > 0 {
            for binding in self.bindings(ctx)? {
                binding.step_iter_schedulers();
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "OneStepOptimizers"
    }
}
