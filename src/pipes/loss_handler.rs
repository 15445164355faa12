//! Computes the loss and backpropagates it

use crate::autograd::backward;
use crate::train::{LossFn, Pipe, PriorityMap, Stage, TrainerContext};
use crate::Result;

/// Scores the model output against the batch targets
///
/// Runs after the model on `on_batch_run`. In train mode the loss is
/// backpropagated so optimizer pipes find gradients on the trainable
/// parameters. The value is reported as `loss` in the status.
pub struct LossHandler<L: LossFn> {
    loss_fn: L,
}

impl<L: LossFn> LossHandler<L> {
    pub fn new(loss_fn: L) -> Self {
        Self { loss_fn }
    }
}

impl<L: LossFn + 'static> Pipe for LossHandler<L> {
    fn on_batch_run(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let output = ctx.output()?.clone();
        let targets = ctx.input()?.targets.clone();

        let loss = self.loss_fn.forward(&output, &targets)?;
        if ctx.is_train() {
            backward(&loss, None);
        }

        let value = loss.data()[0];
        ctx.status.set("loss", value);
        ctx.loss = Some(loss);
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::from_stages([(Stage::BatchRun, 5)])
    }

    fn name(&self) -> &str {
        "LossHandler"
    }
}
