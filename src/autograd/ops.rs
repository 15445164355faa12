//! Differentiable operations
//!
//! Every operation computes its output eagerly. When any input tracks
//! gradients the output gets a backward op holding the inputs and a handle
//! to the output's gradient cell.

use super::{BackwardOp, Tensor};
use crate::{Error, Result};
use ndarray::{Array1, ArrayView2, Axis};
use std::cell::RefCell;
use std::rc::Rc;

type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Wrap `data` in a tensor, attaching the op built by `op` when tracked
fn record<F>(data: Array1<f32>, requires_grad: bool, op: F) -> Tensor
where
    F: FnOnce(GradCell) -> Rc<dyn BackwardOp>,
{
    let mut result = Tensor::new(data, requires_grad);
    if requires_grad {
        let backward_op = op(result.grad_cell());
        result.set_backward_op(backward_op);
    }
    result
}

fn propagate(input: &Tensor) {
    if let Some(op) = input.backward_op() {
        op.backward();
    }
}

fn push(input: &Tensor, grad: Array1<f32>) {
    if input.requires_grad() {
        input.accumulate_grad(grad);
    }
}

fn matrix(data: &Array1<f32>, rows: usize, cols: usize) -> Result<ArrayView2<'_, f32>> {
    data.view()
        .into_shape_with_order((rows, cols))
        .map_err(|_| Error::ShapeMismatch {
            expected: vec![rows, cols],
            got: vec![data.len()],
        })
}

fn flatten(values: impl IntoIterator<Item = f32>) -> Array1<f32> {
    values.into_iter().collect()
}

/// Element-wise sum of two equally sized tensors
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() + &*b.data();
    record(data, a.requires_grad() || b.requires_grad(), |result_grad| {
        Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad,
        })
    })
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        push(&self.a, grad.clone());
        push(&self.b, grad);
        propagate(&self.a);
        propagate(&self.b);
    }
}

/// Element-wise product of two equally sized tensors
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() * &*b.data();
    record(data, a.requires_grad() || b.requires_grad(), |result_grad| {
        Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad,
        })
    })
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        let grad_a = &grad * &*self.b.data();
        let grad_b = &grad * &*self.a.data();
        push(&self.a, grad_a);
        push(&self.b, grad_b);
        propagate(&self.a);
        propagate(&self.b);
    }
}

/// Multiply every element by `factor`
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = &*a.data() * factor;
    record(data, a.requires_grad(), |result_grad| {
        Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad,
        })
    })
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        push(&self.a, grad * self.factor);
        propagate(&self.a);
    }
}

/// `max(x, 0)` element-wise
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    record(data, a.requires_grad(), |result_grad| {
        Rc::new(ReluBackward {
            a: a.clone(),
            result_grad,
        })
    })
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        let gated = {
            let input = self.a.data();
            flatten(
                grad.iter()
                    .zip(input.iter())
                    .map(|(&g, &x)| if x > 0.0 { g } else { 0.0 }),
            )
        };
        push(&self.a, gated);
        propagate(&self.a);
    }
}

/// Reduce to a one-element tensor
pub fn sum(a: &Tensor) -> Tensor {
    let total = a.data().sum();
    record(Array1::from_elem(1, total), a.requires_grad(), |result_grad| {
        Rc::new(SumBackward {
            a: a.clone(),
            result_grad,
        })
    })
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        push(&self.a, Array1::from_elem(self.a.len(), grad[0]));
        propagate(&self.a);
    }
}

/// `C = A @ B` with A `m×k`, B `k×n`, all flattened row-major
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Result<Tensor> {
    let product = {
        let a_data = a.data();
        let b_data = b.data();
        let product = matrix(&a_data, m, k)?.dot(&matrix(&b_data, k, n)?);
        product
    };

    Ok(record(
        flatten(product.iter().copied()),
        a.requires_grad() || b.requires_grad(),
        |result_grad| {
            Rc::new(MatmulBackward {
                a: a.clone(),
                b: b.clone(),
                dims: (m, k, n),
                result_grad,
            })
        },
    ))
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    dims: (usize, usize, usize),
    result_grad: GradCell,
}

impl MatmulBackward {
    /// (dA, dB) = (dC @ Bᵀ, Aᵀ @ dC)
    fn input_grads(&self, grad: &Array1<f32>) -> Result<(Array1<f32>, Array1<f32>)> {
        let (m, k, n) = self.dims;
        let a_data = self.a.data();
        let b_data = self.b.data();
        let dc = matrix(grad, m, n)?;

        let grad_a = dc.dot(&matrix(&b_data, k, n)?.t());
        let grad_b = matrix(&a_data, m, k)?.t().dot(&dc);
        Ok((
            flatten(grad_a.iter().copied()),
            flatten(grad_b.iter().copied()),
        ))
    }
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        // shapes were checked in the forward pass
        let Ok((grad_a, grad_b)) = self.input_grads(&grad) else {
            return;
        };
        push(&self.a, grad_a);
        push(&self.b, grad_b);
        propagate(&self.a);
        propagate(&self.b);
    }
}

/// Add the row vector `bias` to each of the `rows` rows of `x`
pub fn add_bias(x: &Tensor, bias: &Tensor, rows: usize) -> Result<Tensor> {
    let cols = bias.len();
    let data = {
        let x_data = x.data();
        let bias_data = bias.data();
        let shifted = &matrix(&x_data, rows, cols)? + &bias_data.view();
        flatten(shifted.iter().copied())
    };

    Ok(record(
        data,
        x.requires_grad() || bias.requires_grad(),
        |result_grad| {
            Rc::new(AddBiasBackward {
                x: x.clone(),
                bias: bias.clone(),
                rows,
                result_grad,
            })
        },
    ))
}

struct AddBiasBackward {
    x: Tensor,
    bias: Tensor,
    rows: usize,
    result_grad: GradCell,
}

impl BackwardOp for AddBiasBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        if self.bias.requires_grad() {
            if let Ok(per_row) = matrix(&grad, self.rows, self.bias.len()) {
                self.bias.accumulate_grad(per_row.sum_axis(Axis(0)));
            }
        }
        push(&self.x, grad);
        propagate(&self.x);
        propagate(&self.bias);
    }
}
