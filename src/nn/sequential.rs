//! Ordered container of shared sub-modules

use super::{Module, SharedModule};
use crate::{Result, Tensor};

/// Runs its layers in order
///
/// Layers are [`SharedModule`]s so an optimizer binding can target a single
/// layer while the model handler drives the whole stack.
#[derive(Default)]
pub struct Sequential {
    layers: Vec<(String, SharedModule)>,
    training: bool,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named layer
    pub fn add(mut self, name: impl Into<String>, layer: SharedModule) -> Self {
        self.layers.push((name.into(), layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer handle by name
    pub fn layer(&self, name: &str) -> Option<SharedModule> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l.clone())
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (_, layer) in &self.layers {
            x = layer.borrow().forward(&x)?;
        }
        Ok(x)
    }

    fn parameters(&self) -> Vec<(String, Tensor)> {
        self.layers
            .iter()
            .flat_map(|(prefix, layer)| {
                layer
                    .borrow()
                    .parameters()
                    .into_iter()
                    .map(move |(name, t)| (format!("{prefix}.{name}"), t))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for (_, layer) in &self.layers {
            layer.borrow_mut().set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn name(&self) -> &str {
        "Sequential"
    }
}
