//! Progressive unfreezing

use crate::train::{Mode, Pipe, PriorityMap, Stage, TrainerContext};
use crate::Result;
use tracing::info;

/// Activates the next frozen optimizer binding when a metric plateaus
///
/// Watches `metric` on validation epochs over `subset`. After `patience`
/// epochs without improvement, the first inactive binding in
/// [`TrainerContext::optimizers`] is switched on and the wait restarts.
///
/// Runs late in `on_epoch_end` so the metrics pipe has already written the
/// epoch averages.
pub struct UnfreezeOnPlateau {
    metric: String,
    subset: String,
    patience: usize,
    higher_is_better: bool,
    best: Option<f64>,
    waited: usize,
}

impl UnfreezeOnPlateau {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            subset: "valid".to_string(),
            patience: 3,
            higher_is_better: false,
            best: None,
            waited: 0,
        }
    }

    pub fn with_subset(mut self, subset: impl Into<String>) -> Self {
        self.subset = subset.into();
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience.max(1);
        self
    }

    /// Treat higher metric values as improvements
    pub fn maximize(mut self) -> Self {
        self.higher_is_better = true;
        self
    }

    fn improves(&self, value: f64) -> bool {
        match self.best {
            None => true,
            Some(best) if self.higher_is_better => value > best,
            Some(best) => value < best,
        }
    }
}

impl Pipe for UnfreezeOnPlateau {
    fn on_epoch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if ctx.mode != Mode::Valid || ctx.subset != self.subset {
            return Ok(());
        }
        let Some(value) = ctx.metric(&self.subset, &self.metric) else {
            return Ok(());
        };

        if self.improves(value) {
            self.best = Some(value);
            self.waited = 0;
            return Ok(());
        }

        self.waited += 1;
        if self.waited < self.patience {
            return Ok(());
        }
        self.waited = 0;

        if let Some((index, binding)) = ctx
            .optimizers
            .iter_mut()
            .enumerate()
            .find(|(_, b)| !b.is_active())
        {
            binding.set_active(true);
            info!(
                binding = index,
                metric = %self.metric,
                best = self.best.unwrap_or(value),
                "plateau reached, unfreezing next optimizer"
            );
        }
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::from_stages([(Stage::EpochEnd, -10)])
    }

    fn name(&self) -> &str {
        "UnfreezeOnPlateau"
    }
}
