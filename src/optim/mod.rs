//! Optimizers, learning-rate schedules and optimizer bindings

mod adam;
mod binding;
mod optimizer;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use binding::{OptimizerBinding, ScheduleProgress};
pub use optimizer::{Optimizer, OptimizerState};
pub use scheduler::{CosineAnnealingLR, LRScheduler, StepLR};
pub use sgd::SGD;
