//! # Setka: Pipe-driven training loops
//!
//! Setka runs the epoch/batch loop of a training job and leaves every
//! concrete concern to pluggable pipes. The trainer keeps counters and fires
//! lifecycle stages; pipes load data, run the model, compute the loss, step
//! optimizers, track metrics and write checkpoints.
//!
//! ## Architecture
//!
//! - **train**: Trainer, pipe dispatcher, stages and shared context
//! - **pipes**: Dataset, model, loss, optimizer, metric and checkpoint pipes
//! - **data**: Dataset contract, shuffled views and batch collation
//! - **optim**: Optimizers, schedulers and optimizer bindings
//! - **nn**: Model contract and small layers
//! - **autograd**: Minimal reverse-mode differentiation
//! - **io**: Checkpoints (JSON, YAML) and weights (SafeTensors)
//! - **logging**: `tracing` subscriber setup

pub mod autograd;
pub mod data;
pub mod io;
pub mod logging;
pub mod nn;
pub mod optim;
pub mod pipes;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
pub use train::{Mode, Pipe, PipeManager, Stage, Trainer, TrainerContext};
