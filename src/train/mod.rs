//! Training loop orchestration
//!
//! - [`Trainer`] keeps the run counters and fires lifecycle stages
//! - [`Pipe`] is the hook surface every participant implements
//! - [`PipeManager`] orders pipes per stage by priority
//! - [`TrainerContext`] is the mutable state every stage receives
//!
//! # Example
//!
//! ```no_run
//! use setka::data::InMemoryDataSet;
//! use setka::nn::{shared, Linear};
//! use setka::optim::{OptimizerBinding, SGD};
//! use setka::pipes::{DatasetHandler, LossHandler, ModelHandler, OneStepOptimizers};
//! use setka::train::{MSELoss, Trainer};
//! use std::rc::Rc;
//!
//! # let dataset = Rc::new(InMemoryDataSet::new());
//! let mut rng = rand::rng();
//! let model = shared(Linear::new(4, 1, &mut rng));
//!
//! let mut trainer = Trainer::new(vec![
//!     Box::new(DatasetHandler::new(dataset, 32)),
//!     Box::new(ModelHandler::new(model.clone())),
//!     Box::new(LossHandler::new(MSELoss)),
//!     Box::new(OneStepOptimizers::new(vec![OptimizerBinding::new(
//!         model,
//!         SGD::new(0.01, 0.9),
//!     )])),
//! ])
//! .unwrap();
//!
//! trainer.run_train(10).unwrap();
//! ```

mod config;
mod context;
mod loss;
mod metrics;
mod pipe;
mod stage;
mod trainer;


pub use config::TrainerConfig;
pub use context::{MetricsSnapshot, Mode, Status, StatusValue, TrainerContext};
pub use loss::{LossFn, MSELoss};
pub use metrics::{FnMetric, MeanAbsoluteError, MeanSquaredError, Metric};
pub use pipe::{dispatch, Pipe, PipeManager};
pub use stage::{PriorityMap, Stage};
pub use trainer::{EpochSummary, Trainer};
