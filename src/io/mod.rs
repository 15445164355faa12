//! Checkpoint and weight I/O
//!
//! Checkpoints (counters, parameters, optimizer states and flags) are written
//! as JSON or YAML; model weights alone can also be exported as SafeTensors.

mod checkpoint;
mod format;
mod weights;

#[cfg(test)]
mod tests;

pub use checkpoint::{load_checkpoint, save_checkpoint, Checkpoint, ParameterState};
pub use format::{ModelFormat, SaveConfig};
pub use weights::{load_weights, save_weights};
