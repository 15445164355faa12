//! Batch metrics averaged over an epoch by the metrics pipe

use crate::{Error, Result, Tensor};

/// Trait for evaluation metrics
pub trait Metric {
    /// Compute the metric for one batch
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32>;

    /// Name of the metric, used as the status and snapshot key
    fn name(&self) -> &str;

    /// Whether higher values are better (true) or lower (false)
    fn higher_is_better(&self) -> bool {
        false
    }
}

fn check_lengths(predictions: &Tensor, targets: &Tensor) -> Result<()> {
    if predictions.len() != targets.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![targets.len()],
            got: vec![predictions.len()],
        });
    }
    Ok(())
}

/// Mean Squared Error
///
/// # Example
///
/// ```
/// use setka::train::{MeanSquaredError, Metric};
/// use setka::Tensor;
///
/// let pred = Tensor::from_vec(vec![1.0, 2.0], false);
/// let target = Tensor::from_vec(vec![1.0, 4.0], false);
/// assert_eq!(MeanSquaredError.compute(&pred, &target).unwrap(), 2.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Metric for MeanSquaredError {
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32> {
        check_lengths(predictions, targets)?;
        if predictions.is_empty() {
            return Ok(0.0);
        }

        let sum: f32 = predictions
            .data()
            .iter()
            .zip(targets.data().iter())
            .map(|(&p, &t)| (p - t).powi(2))
            .sum();
        Ok(sum / predictions.len() as f32)
    }

    fn name(&self) -> &str {
        "mse"
    }
}

/// Mean Absolute Error
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl Metric for MeanAbsoluteError {
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32> {
        check_lengths(predictions, targets)?;
        if predictions.is_empty() {
            return Ok(0.0);
        }

        let sum: f32 = predictions
            .data()
            .iter()
            .zip(targets.data().iter())
            .map(|(&p, &t)| (p - t).abs())
            .sum();
        Ok(sum / predictions.len() as f32)
    }

    fn name(&self) -> &str {
        "mae"
    }
}

type MetricFn = dyn Fn(&Tensor, &Tensor) -> Result<f32>;

/// Metric backed by a closure
pub struct FnMetric {
    name: String,
    higher_is_better: bool,
    f: Box<MetricFn>,
}

impl FnMetric {
    /// Lower values are better unless [`FnMetric::maximize`] is called
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Tensor, &Tensor) -> Result<f32> + 'static,
    {
        Self {
            name: name.into(),
            higher_is_better: false,
            f: Box::new(f),
        }
    }

    pub fn maximize(mut self) -> Self {
        self.higher_is_better = true;
        self
    }
}

impl Metric for FnMetric {
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32> {
        (self.f)(predictions, targets)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn higher_is_better(&self) -> bool {
        self.higher_is_better
    }
}

impl std::fmt::Debug for FnMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMetric")
            .field("name", &self.name)
            .field("higher_is_better", &self.higher_is_better)
            .finish_non_exhaustive()
    }
}
