//! Samples and collated batches

use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};

/// One input/target pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub input: Vec<f32>,
    pub target: Vec<f32>,
}

impl Sample {
    pub fn new(input: Vec<f32>, target: Vec<f32>) -> Self {
        Self { input, target }
    }
}

/// Row-major stack of samples, ready for a model
#[derive(Debug, Clone)]
pub struct Batch {
    /// `size × input_width`, flattened
    pub inputs: Tensor,
    /// `size × target_width`, flattened
    pub targets: Tensor,
    /// Identifiers of the rows, as produced by a dataset view
    pub ids: Vec<String>,
}

impl Batch {
    pub fn new(inputs: Tensor, targets: Tensor, ids: Vec<String>) -> Self {
        Self {
            inputs,
            targets,
            ids,
        }
    }

    /// Stack identified samples into one batch
    ///
    /// All samples must share input and target widths.
    pub fn collate(items: Vec<(Sample, String)>) -> Result<Self> {
        let Some((first, _)) = items.first() else {
            return Err(Error::MissingBatch("cannot collate an empty batch".into()));
        };
        let input_width = first.input.len();
        let target_width = first.target.len();

        let mut inputs = Vec::with_capacity(items.len() * input_width);
        let mut targets = Vec::with_capacity(items.len() * target_width);
        let mut ids = Vec::with_capacity(items.len());

        for (sample, id) in items {
            if sample.input.len() != input_width || sample.target.len() != target_width {
                return Err(Error::ShapeMismatch {
                    expected: vec![input_width, target_width],
                    got: vec![sample.input.len(), sample.target.len()],
                });
            }
            inputs.extend_from_slice(&sample.input);
            targets.extend_from_slice(&sample.target);
            ids.push(id);
        }

        Ok(Self {
            inputs: Tensor::from_vec(inputs, false),
            targets: Tensor::from_vec(targets, false),
            ids,
        })
    }

    /// Number of rows
    pub fn size(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collate_stacks_rows() {
        let batch = Batch::collate(vec![
            (Sample::new(vec![1.0, 2.0], vec![0.0]), "a_0".into()),
            (Sample::new(vec![3.0, 4.0], vec![1.0]), "a_1".into()),
        ])
        .unwrap();

        assert_eq!(batch.size(), 2);
        assert_eq!(batch.inputs.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(batch.targets.to_vec(), vec![0.0, 1.0]);
        assert_eq!(batch.ids, vec!["a_0", "a_1"]);
    }

    #[test]
    fn test_collate_rejects_ragged_rows() {
        let result = Batch::collate(vec![
            (Sample::new(vec![1.0, 2.0], vec![0.0]), "a_0".into()),
            (Sample::new(vec![3.0], vec![1.0]), "a_1".into()),
        ]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_collate_empty_is_error() {
        assert!(Batch::collate(Vec::new()).is_err());
    }
}
