//! Stochastic Gradient Descent optimizer

use super::optimizer::{kind_mismatch, SlotBuffers};
use super::{Optimizer, OptimizerState};
use crate::{Result, Tensor};
use ndarray::Array1;

/// SGD with optional momentum and L2 weight decay
///
/// `g = grad + weight_decay * p`, `v = momentum * v + g`, `p -= lr * v`
pub struct SGD {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            weight_decay: 0.0,
            velocities: Vec::new(),
        }
    }

    /// Set L2 weight decay
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    fn ensure_velocities(&mut self, params: &[Tensor]) {
        if self.velocities.len() != params.len() {
            self.velocities.resize(params.len(), None);
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &[Tensor]) {
        self.ensure_velocities(params);

        for (i, param) in params.iter().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };

            let grad = if self.weight_decay != 0.0 {
                &grad + &(&*param.data() * self.weight_decay)
            } else {
                grad
            };

            let update = if self.momentum > 0.0 {
                let velocity = match &self.velocities[i] {
                    Some(v) => v * self.momentum + &grad,
                    None => grad,
                };
                self.velocities[i] = Some(velocity.clone());
                velocity
            } else {
                grad
            };

            let lr = self.lr;
            param.update_data(|data| data.scaled_add(-lr, &update));
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Sgd {
            lr: self.lr,
            momentum: self.momentum,
            weight_decay: self.weight_decay,
            velocities: to_slots(&self.velocities),
        }
    }

    fn load_state(&mut self, state: OptimizerState) -> Result<()> {
        match state {
            OptimizerState::Sgd {
                lr,
                momentum,
                weight_decay,
                velocities,
            } => {
                self.lr = lr;
                self.momentum = momentum;
                self.weight_decay = weight_decay;
                self.velocities = from_slots(velocities);
                Ok(())
            }
            other => Err(kind_mismatch("sgd", &other)),
        }
    }

    fn name(&self) -> &str {
        "SGD"
    }
}

pub(crate) fn to_slots(buffers: &[Option<Array1<f32>>]) -> SlotBuffers {
    buffers
        .iter()
        .map(|b| b.as_ref().map(|a| a.to_vec()))
        .collect()
}

pub(crate) fn from_slots(slots: SlotBuffers) -> Vec<Option<Array1<f32>>> {
    slots.into_iter().map(|s| s.map(Array1::from)).collect()
}
