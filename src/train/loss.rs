//! Loss functions for training

use crate::autograd::BackwardOp;
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Trait for loss functions
pub trait LossFn {
    /// Compute a scalar loss
    ///
    /// When `predictions` tracks gradients the returned tensor carries a
    /// backward op reaching back through the prediction graph.
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor>;

    /// Name of the loss function
    fn name(&self) -> &str;
}

/// Mean Squared Error Loss
///
/// L = mean((predictions - targets)²)
///
/// # Example
///
/// ```
/// use setka::train::{LossFn, MSELoss};
/// use setka::Tensor;
///
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = Tensor::from_vec(vec![1.5, 2.5, 3.5], false);
///
/// let loss = MSELoss.forward(&pred, &target).unwrap();
/// assert!((loss.data()[0] - 0.25).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss;

impl LossFn for MSELoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        if predictions.len() != targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![targets.len()],
                got: vec![predictions.len()],
            });
        }
        if predictions.is_empty() {
            return Err(Error::MissingBatch("empty predictions".into()));
        }

        let diff = &*predictions.data() - &*targets.data();
        let mse = diff.mapv(|d| d * d).mean().unwrap_or(0.0);

        let requires_grad = predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![mse], requires_grad);

        if requires_grad {
            // d(MSE)/d(pred) = 2 * (pred - target) / n
            let n = predictions.len() as f32;
            let result_grad = loss.grad_cell();
            loss.set_backward_op(Rc::new(MSEBackward {
                predictions: predictions.clone(),
                local_grad: diff * (2.0 / n),
                result_grad,
            }));
        }

        Ok(loss)
    }

    fn name(&self) -> &str {
        "MSE"
    }
}

struct MSEBackward {
    predictions: Tensor,
    local_grad: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MSEBackward {
    fn backward(&self) {
        let upstream = match self.result_grad.borrow().as_ref() {
            Some(grad) => grad[0],
            None => return,
        };
        self.predictions
            .accumulate_grad(&self.local_grad * upstream);

        if let Some(op) = self.predictions.backward_op() {
            op.backward();
        }
    }
}
