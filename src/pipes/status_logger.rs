//! Progress reporting through `tracing`

use crate::train::{Pipe, PriorityMap, TrainerContext};
use crate::Result;
use tracing::{debug, info};

/// Reports the run status after every batch and epoch
///
/// Batch lines go out at `debug` with the epoch progress; epoch lines at
/// `info`. Runs after every other pipe so it sees the final status.
#[derive(Debug, Default)]
pub struct StatusLogger;

impl StatusLogger {
    pub fn new() -> Self {
        Self
    }
}

fn progress(ctx: &TrainerContext) -> f64 {
    match ctx.n_iterations {
        Some(total) if total > 0 => 100.0 * ctx.epoch_iteration as f64 / total as f64,
        _ => 0.0,
    }
}

impl Pipe for StatusLogger {
    fn on_batch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        debug!(
            "[{:>5.1}%] {}/{} {}",
            progress(ctx),
            ctx.epoch_iteration,
            ctx.n_iterations.unwrap_or(0),
            ctx.status.render()
        );
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        info!("{}", ctx.status.render());
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::uniform(-100)
    }

    fn name(&self) -> &str {
        "StatusLogger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::Stage;

    #[test]
    fn test_progress() {
        let mut ctx = TrainerContext::new(0);
        assert_eq!(progress(&ctx), 0.0);

        ctx.n_iterations = Some(4);
        ctx.epoch_iteration = 1;
        assert_eq!(progress(&ctx), 25.0);
    }

    #[test]
    fn test_runs_last_and_never_fails() {
        let mut logger = StatusLogger::new();
        assert_eq!(logger.priority().get(Stage::BatchEnd), -100);

        let mut ctx = TrainerContext::new(0);
        logger.on_batch_end(&mut ctx).unwrap();
        logger.on_epoch_end(&mut ctx).unwrap();
    }
}
