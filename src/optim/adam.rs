//! Adam optimizer

use super::optimizer::kind_mismatch;
use super::sgd::{from_slots, to_slots};
use super::{Optimizer, OptimizerState};
use crate::{Result, Tensor};
use ndarray::Array1;

/// Adam optimizer (Adaptive Moment Estimation)
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with default parameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    fn ensure_moments(&mut self, params: &[Tensor]) {
        if self.m.len() != params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &[Tensor]) {
        self.ensure_moments(params);
        self.t += 1;

        // Bias correction folded into the step size
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };

            let m_prev = self.m[i].take().unwrap_or_else(|| Array1::zeros(grad.len()));
            let v_prev = self.v[i].take().unwrap_or_else(|| Array1::zeros(grad.len()));

            let m = &m_prev * self.beta1 + &grad * (1.0 - self.beta1);
            let v = &v_prev * self.beta2 + &grad.mapv(|g| g * g) * (1.0 - self.beta2);

            let epsilon = self.epsilon;
            let update = m
                .iter()
                .zip(v.iter())
                .map(|(m, v)| lr_t * m / (v.sqrt() + epsilon))
                .collect::<Array1<f32>>();
            param.update_data(|data| *data -= &update);

            self.m[i] = Some(m);
            self.v[i] = Some(v);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Adam {
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            t: self.t,
            m: to_slots(&self.m),
            v: to_slots(&self.v),
        }
    }

    fn load_state(&mut self, state: OptimizerState) -> Result<()> {
        match state {
            OptimizerState::Adam {
                lr,
                beta1,
                beta2,
                epsilon,
                t,
                m,
                v,
            } => {
                self.lr = lr;
                self.beta1 = beta1;
                self.beta2 = beta2;
                self.epsilon = epsilon;
                self.t = t;
                self.m = from_slots(m);
                self.v = from_slots(v);
                Ok(())
            }
            other => Err(kind_mismatch("adam", &other)),
        }
    }

    fn name(&self) -> &str {
        "Adam"
    }
}
