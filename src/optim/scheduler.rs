//! Learning rate schedules
//!
//! A schedule is a pure function of how many times it has been stepped.
//! [`OptimizerBinding`](super::OptimizerBinding) steps its schedules once per
//! batch or once per epoch and pushes the result into its optimizer.

use super::Optimizer;
use std::f32::consts::PI;

/// Learning rate as a function of elapsed steps
pub trait LRScheduler {
    /// Learning rate at the current step
    fn get_lr(&self) -> f32;

    /// Advance by one iteration or epoch, depending on where it is bound
    fn step(&mut self);

    /// Steps taken so far
    fn elapsed(&self) -> usize;

    /// Jump to `elapsed` steps, as when resuming from a checkpoint
    fn set_elapsed(&mut self, elapsed: usize);

    fn apply(&self, optimizer: &mut dyn Optimizer) {
        optimizer.set_lr(self.get_lr());
    }
}

/// Half-cosine decay from `lr_max` to `lr_min` over `t_max` steps
///
/// Holds at `lr_min` once `t_max` steps have elapsed.
pub struct CosineAnnealingLR {
    lr_max: f32,
    lr_min: f32,
    t_max: usize,
    elapsed: usize,
}

impl CosineAnnealingLR {
    pub fn new(lr_max: f32, t_max: usize, lr_min: f32) -> Self {
        Self {
            lr_max,
            lr_min,
            t_max: t_max.max(1),
            elapsed: 0,
        }
    }

    /// Decay all the way to zero
    pub fn to_zero(lr_max: f32, t_max: usize) -> Self {
        Self::new(lr_max, t_max, 0.0)
    }
}

impl LRScheduler for CosineAnnealingLR {
    fn get_lr(&self) -> f32 {
        let t = self.elapsed.min(self.t_max) as f32 / self.t_max as f32;
        let weight = (1.0 + (PI * t).cos()) / 2.0;
        self.lr_min + weight * (self.lr_max - self.lr_min)
    }

    fn step(&mut self) {
        self.elapsed = self.elapsed.saturating_add(1);
    }

    fn elapsed(&self) -> usize {
        self.elapsed
    }

    fn set_elapsed(&mut self, elapsed: usize) {
        self.elapsed = elapsed;
    }
}

/// Multiplies the learning rate by `gamma` every `step_size` steps
pub struct StepLR {
    initial_lr: f32,
    step_size: usize,
    gamma: f32,
    elapsed: usize,
}

impl StepLR {
    pub fn new(initial_lr: f32, step_size: usize, gamma: f32) -> Self {
        Self {
            initial_lr,
            step_size: step_size.max(1),
            gamma,
            elapsed: 0,
        }
    }
}

impl LRScheduler for StepLR {
    fn get_lr(&self) -> f32 {
        let decays = (self.elapsed / self.step_size) as i32;
        self.initial_lr * self.gamma.powi(decays)
    }

    fn step(&mut self) {
        self.elapsed = self.elapsed.saturating_add(1);
    }

    fn elapsed(&self) -> usize {
        self.elapsed
    }

    fn set_elapsed(&mut self, elapsed: usize) {
        self.elapsed = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn trace(scheduler: &mut dyn LRScheduler, steps: usize) -> Vec<f32> {
        (0..steps)
            .map(|_| {
                let lr = scheduler.get_lr();
                scheduler.step();
                lr
            })
            .collect()
    }

    #[test]
    fn test_cosine_midpoint_and_floor() {
        let mut cosine = CosineAnnealingLR::new(1.0, 10, 0.2);
        let lrs = trace(&mut cosine, 12);

        assert_abs_diff_eq!(lrs[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(lrs[5], 0.6, epsilon = 1e-5);
        assert_abs_diff_eq!(lrs[10], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(lrs[11], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_never_increases() {
        let lrs = trace(&mut CosineAnnealingLR::to_zero(0.5, 16), 20);
        assert!(lrs.windows(2).all(|w| w[1] <= w[0]));
        assert_abs_diff_eq!(lrs[19], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_step_lr_decays_in_stairs() {
        let lrs = trace(&mut StepLR::new(1.0, 2, 0.5), 5);
        assert_eq!(lrs, vec![1.0, 1.0, 0.5, 0.5, 0.25]);
    }

    #[test]
    fn test_set_elapsed_resumes_schedule() {
        let mut fresh = StepLR::new(1.0, 2, 0.5);
        fresh.set_elapsed(4);
        assert_eq!(fresh.elapsed(), 4);
        assert_abs_diff_eq!(fresh.get_lr(), 0.25, epsilon = 1e-6);

        let mut cosine = CosineAnnealingLR::to_zero(1.0, 10);
        let expected = trace(&mut CosineAnnealingLR::to_zero(1.0, 10), 8);
        cosine.set_elapsed(5);
        assert_abs_diff_eq!(cosine.get_lr(), expected[5], epsilon = 1e-6);
    }

    #[test]
    fn test_apply_sets_optimizer_lr() {
        use crate::optim::SGD;

        let mut optimizer = SGD::new(1.0, 0.0);
        let mut scheduler = StepLR::new(1.0, 1, 0.1);
        scheduler.step();
        scheduler.apply(&mut optimizer);
        assert_abs_diff_eq!(optimizer.lr(), 0.1, epsilon = 1e-6);
    }
}
