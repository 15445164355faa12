//! Optimizer bound to a (sub-)module with an active flag

use super::{LRScheduler, Optimizer, OptimizerState};
use crate::nn::{parameter_tensors, SharedModule};
use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};

/// Step counts of a binding's schedules, in the order they were added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleProgress {
    pub iter: Vec<usize>,
    pub epoch: Vec<usize>,
}

/// Pairs a module with the optimizer that updates it
///
/// Inactive bindings are skipped by the optimization pipe: their module is not
/// switched to training mode, their gradients are not cleared and no update is
/// applied. Toggling `active` between batches is how staged fine-tuning
/// freezes and unfreezes parts of a model.
pub struct OptimizerBinding {
    target: SharedModule,
    optimizer: Box<dyn Optimizer>,
    active: bool,
    iter_schedulers: Vec<Box<dyn LRScheduler>>,
    epoch_schedulers: Vec<Box<dyn LRScheduler>>,
}

impl OptimizerBinding {
    /// Bind `optimizer` to `target`; the binding starts active
    pub fn new<O: Optimizer + 'static>(target: SharedModule, optimizer: O) -> Self {
        Self {
            target,
            optimizer: Box::new(optimizer),
            active: true,
            iter_schedulers: Vec::new(),
            epoch_schedulers: Vec::new(),
        }
    }

    /// Set the initial active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Add a schedule stepped once per training iteration
    pub fn with_iter_scheduler<S: LRScheduler + 'static>(mut self, scheduler: S) -> Self {
        self.iter_schedulers.push(Box::new(scheduler));
        self
    }

    /// Add a schedule stepped once per training epoch
    pub fn with_epoch_scheduler<S: LRScheduler + 'static>(mut self, scheduler: S) -> Self {
        self.epoch_schedulers.push(Box::new(scheduler));
        self
    }

    pub fn target(&self) -> &SharedModule {
        &self.target
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    /// Current parameter handles of the target, read fresh on every call
    pub fn params(&self) -> Vec<Tensor> {
        parameter_tensors(&*self.target.borrow())
    }

    /// Clear gradients, enable training behavior and mark parameters trainable
    pub fn prepare(&mut self) {
        let params = self.params();
        self.optimizer.zero_grad(&params);

        let mut target = self.target.borrow_mut();
        target.set_training(true);
        target.set_requires_grad(true);
    }

    /// Apply one update from the stored gradients
    pub fn step(&mut self) {
        let params = self.params();
        self.optimizer.step(&params);
    }

    /// Advance per-iteration schedules and apply the resulting learning rate
    pub fn step_iter_schedulers(&mut self) {
        for scheduler in &mut self.iter_schedulers {
            scheduler.step();
            scheduler.apply(self.optimizer.as_mut());
        }
    }

    /// Advance per-epoch schedules and apply the resulting learning rate
    pub fn step_epoch_schedulers(&mut self) {
        for scheduler in &mut self.epoch_schedulers {
            scheduler.step();
            scheduler.apply(self.optimizer.as_mut());
        }
    }

    pub fn state(&self) -> OptimizerState {
        self.optimizer.state()
    }

    pub fn schedule_progress(&self) -> ScheduleProgress {
        ScheduleProgress {
            iter: self.iter_schedulers.iter().map(|s| s.elapsed()).collect(),
            epoch: self.epoch_schedulers.iter().map(|s| s.elapsed()).collect(),
        }
    }

    /// Check that `progress` has one count per schedule
    pub fn validate_schedule_progress(&self, progress: &ScheduleProgress) -> Result<()> {
        if progress.iter.len() != self.iter_schedulers.len()
            || progress.epoch.len() != self.epoch_schedulers.len()
        {
            return Err(Error::CheckpointMismatch(format!(
                "binding has {} iteration and {} epoch schedules, checkpoint has {} and {}",
                self.iter_schedulers.len(),
                self.epoch_schedulers.len(),
                progress.iter.len(),
                progress.epoch.len()
            )));
        }
        Ok(())
    }

    /// Move every schedule to its recorded step count
    ///
    /// The learning rate is left alone; it travels with the optimizer state.
    pub fn load_schedule_progress(&mut self, progress: &ScheduleProgress) -> Result<()> {
        self.validate_schedule_progress(progress)?;
        for (scheduler, &elapsed) in self.iter_schedulers.iter_mut().zip(&progress.iter) {
            scheduler.set_elapsed(elapsed);
        }
        for (scheduler, &elapsed) in self.epoch_schedulers.iter_mut().zip(&progress.epoch) {
            scheduler.set_elapsed(elapsed);
        }
        Ok(())
    }

    /// Check that `state` fits this binding without applying it
    pub fn validate_state(&self, state: &OptimizerState) -> Result<()> {
        let own_kind = self.optimizer.state().kind();
        if state.kind() != own_kind {
            return Err(Error::CheckpointMismatch(format!(
                "optimizer is {own_kind}, state is {}",
                state.kind()
            )));
        }
        let lens: Vec<usize> = self.params().iter().map(Tensor::len).collect();
        state.check_slots(&lens)
    }

    /// Restore optimizer state after validating it against the target
    pub fn load_state(&mut self, state: OptimizerState) -> Result<()> {
        self.validate_state(&state)?;
        self.optimizer.load_state(state)
    }
}

impl std::fmt::Debug for OptimizerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizerBinding")
            .field("target", &self.target.borrow().name())
            .field("optimizer", &self.optimizer.name())
            .field("active", &self.active)
            .field("lr", &self.optimizer.lr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{shared, Linear, Module};
    use crate::optim::{Adam, StepLR, SGD};
    use ndarray::Array1;

    fn layer() -> std::rc::Rc<std::cell::RefCell<Linear>> {
        shared(Linear::from_parts(vec![1.0, 2.0], vec![0.0], 2, 1).unwrap())
    }

    #[test]
    fn test_prepare_clears_grads_and_enables_training() {
        let layer = layer();
        let mut binding = OptimizerBinding::new(layer.clone(), SGD::new(0.1, 0.0));
        layer.borrow().weight().set_grad(Array1::from(vec![1.0, 1.0]));

        binding.prepare();

        let l = layer.borrow();
        assert!(l.weight().grad().is_none());
        assert!(l.is_training());
        assert!(l.weight().requires_grad());
    }

    #[test]
    fn test_step_updates_shared_target() {
        let layer = layer();
        let mut binding = OptimizerBinding::new(layer.clone(), SGD::new(0.5, 0.0));
        layer.borrow().weight().set_grad(Array1::from(vec![1.0, 1.0]));

        binding.step();
        assert_eq!(layer.borrow().weight().to_vec(), vec![0.5, 1.5]);
    }

    #[test]
    fn test_schedulers_drive_lr() {
        let mut binding = OptimizerBinding::new(layer(), SGD::new(1.0, 0.0))
            .with_iter_scheduler(StepLR::new(1.0, 1, 0.5))
            .with_epoch_scheduler(StepLR::new(1.0, 1, 0.1));

        binding.step_iter_schedulers();
        assert!((binding.lr() - 0.5).abs() < 1e-6);

        binding.step_epoch_schedulers();
        assert!((binding.lr() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_validate_state_rejects_other_kind() {
        let binding = OptimizerBinding::new(layer(), SGD::new(0.1, 0.0));
        let adam = Adam::default_params(0.1).state();
        assert!(matches!(
            binding.validate_state(&adam),
            Err(Error::CheckpointMismatch(_))
        ));
    }

    #[test]
    fn test_load_state_rejects_wrong_slot_count() {
        let mut binding = OptimizerBinding::new(layer(), SGD::new(0.1, 0.9));
        let state = OptimizerState::Sgd {
            lr: 0.3,
            momentum: 0.9,
            weight_decay: 0.0,
            velocities: vec![Some(vec![0.0, 0.0])],
        };
        assert!(binding.load_state(state).is_err());
        assert!((binding.lr() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_schedule_progress_round_trip() {
        let mut source = OptimizerBinding::new(layer(), SGD::new(1.0, 0.0))
            .with_iter_scheduler(StepLR::new(1.0, 1, 0.5))
            .with_epoch_scheduler(StepLR::new(1.0, 1, 0.1));
        source.step_iter_schedulers();
        source.step_iter_schedulers();
        source.step_epoch_schedulers();

        let progress = source.schedule_progress();
        assert_eq!(progress, ScheduleProgress { iter: vec![2], epoch: vec![1] });

        let mut target = OptimizerBinding::new(layer(), SGD::new(1.0, 0.0))
            .with_iter_scheduler(StepLR::new(1.0, 1, 0.5))
            .with_epoch_scheduler(StepLR::new(1.0, 1, 0.1));
        target.load_schedule_progress(&progress).unwrap();
        assert_eq!(target.schedule_progress(), progress);

        source.step_iter_schedulers();
        target.step_iter_schedulers();
        assert!((source.lr() - target.lr()).abs() < 1e-9);
    }

    #[test]
    fn test_schedule_progress_count_mismatch() {
        let mut binding = OptimizerBinding::new(layer(), SGD::new(1.0, 0.0))
            .with_iter_scheduler(StepLR::new(1.0, 1, 0.5));
        let progress = ScheduleProgress {
            iter: vec![3, 1],
            epoch: vec![],
        };
        assert!(matches!(
            binding.load_schedule_progress(&progress),
            Err(Error::CheckpointMismatch(_))
        ));
        assert_eq!(binding.schedule_progress().iter, vec![0]);
    }

    #[test]
    fn test_active_flag() {
        let mut binding = OptimizerBinding::new(layer(), SGD::new(0.1, 0.0)).with_active(false);
        assert!(!binding.is_active());
        binding.set_active(true);
        assert!(binding.is_active());
        assert!(format!("{binding:?}").contains("Linear"));
    }
}
