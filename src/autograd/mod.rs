//! Minimal reverse-mode autograd
//!
//! Parameters and activations are [`Tensor`] handles. Each operation records a
//! [`BackwardOp`] that pushes its output gradient into its inputs and then
//! recurses. Graphs are expected to be trees: every intermediate tensor is
//! consumed by exactly one downstream operation, which holds for the layer
//! stacks in [`crate::nn`].

mod backward;
mod ops;
mod tensor;


pub use backward::BackwardOp;
pub use ops::*;
pub use tensor::Tensor;

/// Run the backward pass from `tensor`
///
/// With `grad_output = None` the seed gradient is all ones, which is what a
/// scalar loss needs.
pub fn backward(tensor: &Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    let seed = grad_output.unwrap_or_else(|| ndarray::Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
