//! Ready-made pipes for a supervised training run
//!
//! A typical trainer registers them in this order:
//!
//! | pipe | stages | priority |
//! |------|--------|----------|
//! | [`DatasetHandler`] | epoch begin, batch begin | batch begin 10 |
//! | [`ModelHandler`] | init, batch run, batch end | batch run 10, batch end -10 |
//! | [`LossHandler`] | batch run | 5 |
//! | [`OneStepOptimizers`] | init, epoch begin, batch begin, batch end | 0 |
//! | [`ComputeMetrics`] | epoch begin, batch end, epoch end | batch end 5 |
//! | [`UnfreezeOnPlateau`] | epoch end | -10 |
//! | [`SaveResult`] | init, epoch begin, batch end, epoch end | 0 |
//! | [`Checkpointer`] | init, epoch end | epoch end -50 |
//! | [`StatusLogger`] | batch end, epoch end | -100 |

mod checkpointer;
mod dataset_handler;
mod loss_handler;
mod metrics;
mod model_handler;
mod optimizers;
mod save_result;
mod status_logger;
mod unfreeze;

pub use checkpointer::Checkpointer;
pub use dataset_handler::DatasetHandler;
pub use loss_handler::LossHandler;
pub use metrics::ComputeMetrics;
pub use model_handler::ModelHandler;
pub use optimizers::OneStepOptimizers;
pub use save_result::{ResultFn, SaveResult};
pub use status_logger::StatusLogger;
pub use unfreeze::UnfreezeOnPlateau;
