//! Model collaborator contract and a few small layers
//!
//! The trainer never looks inside a model. It needs to call it, to enumerate
//! its parameters, and to switch it between training and evaluation behavior.
//! [`Module`] is exactly that surface.

mod linear;
mod sequential;

pub use linear::{Linear, Relu};
pub use sequential::Sequential;

use crate::{Result, Tensor};
use std::cell::RefCell;
use std::rc::Rc;

/// A trainable model or sub-model
pub trait Module {
    /// Run the module on a flattened batch
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Named parameter handles
    ///
    /// The returned tensors share storage with the module, so updating them
    /// updates the module.
    fn parameters(&self) -> Vec<(String, Tensor)>;

    /// Switch between training and evaluation behavior
    fn set_training(&mut self, training: bool);

    /// Whether the module is in training mode
    fn is_training(&self) -> bool;

    /// Mark every parameter trainable or frozen
    fn set_requires_grad(&self, flag: bool) {
        for (_, param) in self.parameters() {
            param.set_requires_grad(flag);
        }
    }

    /// Name used in logs
    fn name(&self) -> &str {
        "Module"
    }
}

/// A module shared between the model handler and optimizer bindings
pub type SharedModule = Rc<RefCell<dyn Module>>;

/// Wrap a module for sharing
///
/// Keep the typed handle for direct access; it coerces to [`SharedModule`]
/// with `.clone()`.
pub fn shared<M: Module + 'static>(module: M) -> Rc<RefCell<M>> {
    Rc::new(RefCell::new(module))
}

/// Parameter handles without names
pub fn parameter_tensors(module: &dyn Module) -> Vec<Tensor> {
    module.parameters().into_iter().map(|(_, t)| t).collect()
}
