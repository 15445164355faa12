//! Epoch-level metric accumulation

use crate::train::{Metric, Pipe, PriorityMap, Stage, TrainerContext};
use crate::Result;
use tracing::debug;

/// Averages batch metrics over an epoch
///
/// Each batch's output is scored against its targets before the model
/// handler drops it. At epoch end the averages land in
/// [`TrainerContext::metrics`] under the current subset and in the status.
pub struct ComputeMetrics {
    metrics: Vec<Box<dyn Metric>>,
    sums: Vec<f64>,
    batches: usize,
}

impl ComputeMetrics {
    pub fn new(metrics: Vec<Box<dyn Metric>>) -> Self {
        let sums = vec![0.0; metrics.len()];
        Self {
            metrics,
            sums,
            batches: 0,
        }
    }

    /// Running averages for the current epoch
    pub fn averages(&self) -> Vec<(&str, f64)> {
        if self.batches == 0 {
            return Vec::new();
        }
        self.metrics
            .iter()
            .zip(&self.sums)
            .map(|(m, sum)| (m.name(), sum / self.batches as f64))
            .collect()
    }
}

impl Pipe for ComputeMetrics {
    fn on_epoch_begin(&mut self, _ctx: &mut TrainerContext) -> Result<()> {
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        self.batches = 0;
        Ok(())
    }

    fn on_batch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let output = ctx.output()?;
        let targets = &ctx.input()?.targets;
        for (metric, sum) in self.metrics.iter().zip(self.sums.iter_mut()) {
            *sum += f64::from(metric.compute(output, targets)?);
        }
        self.batches += 1;
        Ok(())
    }

    fn on_epoch_end(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        let averages: Vec<(String, f64)> = self
            .averages()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        if averages.is_empty() {
            return Ok(());
        }

        let entry = ctx.metrics.entry(ctx.subset.clone()).or_default();
        for (name, value) in &averages {
            entry.insert(name.clone(), *value);
        }
        for (name, value) in averages {
            debug!(subset = %ctx.subset, metric = %name, value, "epoch metric");
            ctx.status.set(format!("{}_{name}", ctx.subset), value);
        }
        Ok(())
    }

    fn priority(&self) -> PriorityMap {
        PriorityMap::from_stages([(Stage::BatchEnd, 5)])
    }

    fn name(&self) -> &str {
        "ComputeMetrics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Batch, Sample};
    use crate::train::{FnMetric, MeanAbsoluteError, MeanSquaredError, Mode, StatusValue};
    use crate::Tensor;
    use approx::assert_abs_diff_eq;

    fn pipe() -> ComputeMetrics {
        ComputeMetrics::new(vec![Box::new(MeanSquaredError), Box::new(MeanAbsoluteError)])
    }

    fn feed(pipe: &mut ComputeMetrics, ctx: &mut TrainerContext, output: f32, target: f32) {
        ctx.input = Some(
            Batch::collate(vec![(Sample::new(vec![0.0], vec![target]), "d_0".into())]).unwrap(),
        );
        ctx.output = Some(Tensor::from_vec(vec![output], false));
        pipe.on_batch_end(ctx).unwrap();
    }

    #[test]
    fn test_epoch_average_written_per_subset() {
        let mut pipe = pipe();
        let mut ctx = TrainerContext::new(0);
        ctx.mode = Mode::Valid;
        ctx.subset = "valid".into();

        pipe.on_epoch_begin(&mut ctx).unwrap();
        feed(&mut pipe, &mut ctx, 1.0, 0.0);
        feed(&mut pipe, &mut ctx, 3.0, 0.0);
        pipe.on_epoch_end(&mut ctx).unwrap();

        assert_abs_diff_eq!(ctx.metric("valid", "mse").unwrap(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ctx.metric("valid", "mae").unwrap(), 2.0, epsilon = 1e-9);
        assert_eq!(ctx.status.get("valid_mae"), Some(&StatusValue::Float(2.0)));
        assert!(ctx.metric("train", "mse").is_none());
    }

    #[test]
    fn test_epoch_begin_resets_sums() {
        let mut pipe = pipe();
        let mut ctx = TrainerContext::new(0);
        ctx.subset = "train".into();

        feed(&mut pipe, &mut ctx, 10.0, 0.0);
        pipe.on_epoch_begin(&mut ctx).unwrap();
        feed(&mut pipe, &mut ctx, 1.0, 0.0);
        pipe.on_epoch_end(&mut ctx).unwrap();

        assert_abs_diff_eq!(ctx.metric("train", "mae").unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_epoch_records_nothing() {
        let mut pipe = pipe();
        let mut ctx = TrainerContext::new(0);
        ctx.subset = "train".into();

        pipe.on_epoch_begin(&mut ctx).unwrap();
        pipe.on_epoch_end(&mut ctx).unwrap();
        assert!(ctx.metrics.is_empty());
    }

    #[test]
    fn test_custom_metric_errors_propagate() {
        let failing = FnMetric::new("broken", |_, _| {
            Err(crate::Error::callback("broken", "cannot score"))
        });
        let mut pipe = ComputeMetrics::new(vec![Box::new(failing)]);
        let mut ctx = TrainerContext::new(0);
        ctx.input = Some(
            Batch::collate(vec![(Sample::new(vec![0.0], vec![0.0]), "d_0".into())]).unwrap(),
        );
        ctx.output = Some(Tensor::from_vec(vec![0.0], false));

        assert!(pipe.on_batch_end(&mut ctx).is_err());
    }
}
