//! Fully connected layer and ReLU

use super::Module;
use crate::autograd::{add_bias, matmul, relu};
use crate::{Error, Result, Tensor};
use rand::Rng;

/// Fully connected layer: `y = x @ W + b`
///
/// `W` is stored row-major as `in_features × out_features`, the input is a
/// flattened `batch × in_features` matrix.
pub struct Linear {
    weight: Tensor,
    bias: Tensor,
    in_features: usize,
    out_features: usize,
    training: bool,
}

impl Linear {
    /// Create a layer with weights drawn from `U(-1/sqrt(in), 1/sqrt(in))`
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight: Vec<f32> = (0..in_features * out_features)
            .map(|_| rng.random_range(-bound..=bound))
            .collect();
        let bias: Vec<f32> = (0..out_features)
            .map(|_| rng.random_range(-bound..=bound))
            .collect();

        Self {
            weight: Tensor::from_vec(weight, false),
            bias: Tensor::from_vec(bias, false),
            in_features,
            out_features,
            training: false,
        }
    }

    /// Create a layer from explicit weights
    pub fn from_parts(
        weight: Vec<f32>,
        bias: Vec<f32>,
        in_features: usize,
        out_features: usize,
    ) -> Result<Self> {
        if weight.len() != in_features * out_features {
            return Err(Error::ShapeMismatch {
                expected: vec![in_features * out_features],
                got: vec![weight.len()],
            });
        }
        if bias.len() != out_features {
            return Err(Error::ShapeMismatch {
                expected: vec![out_features],
                got: vec![bias.len()],
            });
        }

        Ok(Self {
            weight: Tensor::from_vec(weight, false),
            bias: Tensor::from_vec(bias, false),
            in_features,
            out_features,
            training: false,
        })
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if self.in_features == 0 || input.len() % self.in_features != 0 {
            return Err(Error::ShapeMismatch {
                expected: vec![self.in_features],
                got: vec![input.len()],
            });
        }
        let rows = input.len() / self.in_features;

        let projected = matmul(
            input,
            &self.weight,
            rows,
            self.in_features,
            self.out_features,
        )?;
        add_bias(&projected, &self.bias, rows)
    }

    fn parameters(&self) -> Vec<(String, Tensor)> {
        vec![
            ("weight".to_string(), self.weight.clone()),
            ("bias".to_string(), self.bias.clone()),
        ]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn name(&self) -> &str {
        "Linear"
    }
}

/// Element-wise ReLU, no parameters
#[derive(Debug, Default)]
pub struct Relu {
    training: bool,
}

impl Relu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Relu {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(relu(input))
    }

    fn parameters(&self) -> Vec<(String, Tensor)> {
        Vec::new()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn name(&self) -> &str {
        "Relu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{backward, sum};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_forward_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Linear::new(3, 2, &mut rng);

        let out = layer
            .forward(&Tensor::from_vec(vec![1.0, 0.0, -1.0, 0.5, 0.5, 0.5], false))
            .unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_linear_rejects_ragged_input() {
        let layer = Linear::from_parts(vec![1.0; 6], vec![0.0; 2], 3, 2).unwrap();
        let err = layer.forward(&Tensor::zeros(4, false));
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_linear_from_parts_validates() {
        assert!(Linear::from_parts(vec![1.0; 5], vec![0.0; 2], 3, 2).is_err());
        assert!(Linear::from_parts(vec![1.0; 6], vec![0.0; 3], 3, 2).is_err());
    }

    #[test]
    fn test_linear_known_output() {
        // W = [[1, 2], [3, 4]], b = [0.5, -0.5]
        let layer = Linear::from_parts(vec![1.0, 2.0, 3.0, 4.0], vec![0.5, -0.5], 2, 2).unwrap();
        let out = layer
            .forward(&Tensor::from_vec(vec![1.0, 1.0], false))
            .unwrap();
        assert_eq!(out.to_vec(), vec![4.5, 5.5]);
    }

    #[test]
    fn test_requires_grad_gates_parameter_gradients() {
        let layer = Linear::from_parts(vec![1.0, 2.0], vec![0.0], 2, 1).unwrap();

        let loss = sum(&layer.forward(&Tensor::from_vec(vec![1.0, 1.0], false)).unwrap());
        backward(&loss, None);
        assert!(layer.weight().grad().is_none());

        layer.set_requires_grad(true);
        let loss = sum(&layer.forward(&Tensor::from_vec(vec![1.0, 1.0], false)).unwrap());
        backward(&loss, None);
        assert_eq!(layer.weight().grad().unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(layer.bias().grad().unwrap().to_vec(), vec![1.0]);
    }

    #[test]
    fn test_training_flag() {
        let mut relu = Relu::new();
        assert!(!relu.is_training());
        relu.set_training(true);
        assert!(relu.is_training());
        assert!(relu.parameters().is_empty());
    }
}
