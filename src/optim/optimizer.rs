//! Optimizer trait and its serializable state

use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};

/// Per-parameter buffer list; `None` until the parameter first gets a gradient
pub type SlotBuffers = Vec<Option<Vec<f32>>>;

/// Trait for optimization algorithms
///
/// Optimizers keep one buffer slot per parameter, in the order the parameters
/// are passed to [`Optimizer::step`].
pub trait Optimizer {
    /// Apply one update using the gradients already stored on `params`
    ///
    /// Parameters without a gradient are left untouched.
    fn step(&mut self, params: &[Tensor]);

    /// Drop accumulated gradients
    fn zero_grad(&mut self, params: &[Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Snapshot hyper-parameters and buffers
    fn state(&self) -> OptimizerState;

    /// Restore a snapshot taken from the same kind of optimizer
    fn load_state(&mut self, state: OptimizerState) -> Result<()>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Serializable optimizer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerState {
    Sgd {
        lr: f32,
        momentum: f32,
        weight_decay: f32,
        velocities: SlotBuffers,
    },
    Adam {
        lr: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        t: u64,
        m: SlotBuffers,
        v: SlotBuffers,
    },
}

impl OptimizerState {
    /// Short tag of the optimizer kind
    pub fn kind(&self) -> &'static str {
        match self {
            OptimizerState::Sgd { .. } => "sgd",
            OptimizerState::Adam { .. } => "adam",
        }
    }

    /// Learning rate stored in the snapshot
    pub fn lr(&self) -> f32 {
        match self {
            OptimizerState::Sgd { lr, .. } | OptimizerState::Adam { lr, .. } => *lr,
        }
    }

    /// Every per-parameter buffer list in the snapshot
    pub fn buffers(&self) -> Vec<&SlotBuffers> {
        match self {
            OptimizerState::Sgd { velocities, .. } => vec![velocities],
            OptimizerState::Adam { m, v, .. } => vec![m, v],
        }
    }

    /// Check the buffers against the lengths of the parameters they belong to
    ///
    /// Empty buffer lists are accepted: the optimizer has not stepped yet.
    pub fn check_slots(&self, param_lens: &[usize]) -> Result<()> {
        for buffers in self.buffers() {
            if buffers.is_empty() {
                continue;
            }
            if buffers.len() != param_lens.len() {
                return Err(Error::CheckpointMismatch(format!(
                    "{} state has {} parameter slots, target has {} parameters",
                    self.kind(),
                    buffers.len(),
                    param_lens.len()
                )));
            }
            for (i, (slot, &len)) in buffers.iter().zip(param_lens).enumerate() {
                if let Some(values) = slot {
                    if values.len() != len {
                        return Err(Error::CheckpointMismatch(format!(
                            "{} slot {i} holds {} values, parameter has {len}",
                            self.kind(),
                            values.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn kind_mismatch(expected: &str, got: &OptimizerState) -> Error {
    Error::CheckpointMismatch(format!(
        "expected {expected} optimizer state, got {}",
        got.kind()
    ))
}
