//! Runs the model on each batch

use crate::nn::SharedModule;
use crate::train::{Pipe, PriorityMap, Stage, TrainerContext};
use crate::Result;

/// Installs the model and calls it on every batch
///
/// Outside train mode the model is forced into evaluation behavior before
/// the forward pass. The output is dropped at the end of each batch.
pub struct ModelHandler {
    model: SharedModule,
}

impl ModelHandler {
    pub fn new(model: SharedModule) -> Self {
        Self { model }
    }
}

impl Pipe for ModelHandler {
    fn on_init(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        self.model.borrow_mut().set_training(false);
        ctx.model = Some(self.model.clone());
        Ok(())
    }

    fn on_epoch_begin(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        self.model.borrow_mut().set_training(false);
        Ok(())
    }

    fn on_batch_run(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if !ctx.is_train() {
            self.model.borrow_mut().set_training(false);
        }
        let output = self.model.borrow().forward(&ctx.input()?.inputs)?;
        ctx.output = Some(output);
        Ok(())
    }

    fn on_batch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        ctx.output = None;
        ctx.loss = None;
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::from_stages([(Stage::BatchRun, 10), (Stage::BatchEnd, -10)])
    }

    fn name(&self) -> &str {
        "ModelHandler"
    }
}
