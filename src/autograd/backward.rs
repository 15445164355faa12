//! Backward operation trait

/// A recorded operation that can propagate gradients to its inputs
pub trait BackwardOp {
    /// Push the output gradient into the inputs and recurse
    fn backward(&self);
}
