//! Tensor handle with gradient tracking

use super::BackwardOp;
use crate::{Error, Result};
use ndarray::Array1;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

/// One-dimensional tensor with shared storage
///
/// Cloning a `Tensor` yields another handle to the same data, gradient and
/// `requires_grad` flag. Modules hand out such handles as their parameters, so
/// an optimizer stepping a handle updates the module in place.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<RefCell<Array1<f32>>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: Rc<Cell<bool>>,
}

impl Tensor {
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad: Rc::new(Cell::new(requires_grad)),
        }
    }

    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    pub fn zeros(size: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(size), requires_grad)
    }

    pub fn ones(size: usize, requires_grad: bool) -> Self {
        Self::new(Array1::ones(size), requires_grad)
    }

    pub fn data(&self) -> Ref<'_, Array1<f32>> {
        self.data.borrow()
    }

    /// Copy the data out
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.borrow().to_vec()
    }

    /// Replace the data, keeping the length fixed
    pub fn set_data(&self, data: Array1<f32>) -> Result<()> {
        let len = self.len();
        if data.len() != len {
            return Err(Error::ShapeMismatch {
                expected: vec![len],
                got: vec![data.len()],
            });
        }
        *self.data.borrow_mut() = data;
        Ok(())
    }

    /// Mutate the data in place
    pub fn update_data<F>(&self, f: F)
    where
        F: FnOnce(&mut Array1<f32>),
    {
        f(&mut self.data.borrow_mut());
    }

    /// Copy of the accumulated gradient, `None` before any backward pass
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add `grad` to the stored gradient
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut slot = self.grad.borrow_mut();
        match slot.as_mut() {
            Some(existing) => *existing += &grad,
            None => *slot = Some(grad),
        }
    }

    /// Drop the accumulated gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad.get()
    }

    /// Mark the tensor as trainable or frozen
    ///
    /// Applies to every handle sharing this tensor.
    pub fn set_requires_grad(&self, flag: bool) {
        self.requires_grad.set(flag);
    }

    /// Shared gradient slot, read by the op that consumes this tensor's output
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        self.grad.clone()
    }

    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Independent copy with no gradient history
    pub fn detach(&self) -> Tensor {
        Tensor::new(self.data.borrow().clone(), false)
    }

    /// Whether two handles point at the same storage
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("data", &self.data.borrow())
            .field("grad", &self.grad.borrow())
            .field("requires_grad", &self.requires_grad.get())
            .finish()
    }
}
