//! Mutable run state shared by the trainer and its pipes

use crate::data::Batch;
use crate::nn::SharedModule;
use crate::optim::OptimizerBinding;
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What an epoch is for
///
/// Pipes read the mode to decide whether to compute gradients, update
/// parameters or only record outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Train,
    #[default]
    Valid,
    Predict,
    Custom(String),
}

impl Mode {
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Train => "train",
            Mode::Valid => "valid",
            Mode::Predict => "predict",
            Mode::Custom(name) => name,
        }
    }

    pub fn is_train(&self) -> bool {
        matches!(self, Mode::Train)
    }
}

impl From<&str> for Mode {
    fn from(s: &str) -> Self {
        match s {
            "train" => Mode::Train,
            "valid" => Mode::Valid,
            "predict" => Mode::Predict,
            other => Mode::Custom(other.to_string()),
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        Mode::from(s.as_str())
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

impl FromStr for Mode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Mode::from(s))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl StatusValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatusValue::Int(v) => Some(*v as f64),
            StatusValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StatusValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Int(v) => write!(f, "{v:5}"),
            StatusValue::Float(v) => write!(f, "{v:.2e}"),
            StatusValue::Bool(v) => write!(f, "{v}"),
            StatusValue::Text(v) => write!(f, "{v:5}"),
        }
    }
}

impl From<i64> for StatusValue {
    fn from(v: i64) -> Self {
        StatusValue::Int(v)
    }
}

impl From<usize> for StatusValue {
    fn from(v: usize) -> Self {
        StatusValue::Int(v as i64)
    }
}

impl From<f64> for StatusValue {
    fn from(v: f64) -> Self {
        StatusValue::Float(v)
    }
}

impl From<f32> for StatusValue {
    fn from(v: f32) -> Self {
        StatusValue::Float(f64::from(v))
    }
}

impl From<bool> for StatusValue {
    fn from(v: bool) -> Self {
        StatusValue::Bool(v)
    }
}

impl From<&str> for StatusValue {
    fn from(v: &str) -> Self {
        StatusValue::Text(v.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(v: String) -> Self {
        StatusValue::Text(v)
    }
}

/// Insertion-ordered key/value report
///
/// Any pipe may write any key during any stage. Overwriting a key keeps its
/// original position, so display order is the order keys first appeared.
/// Nothing is removed unless a pipe asks for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    entries: Vec<(String, StatusValue)>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StatusValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&StatusValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<StatusValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatusValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `key: value` pairs separated by two spaces, in insertion order
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Epoch metric averages keyed by subset, then by metric name
pub type MetricsSnapshot = BTreeMap<String, BTreeMap<String, f64>>;

/// Everything a stage can read or change
///
/// The trainer owns one context and passes it by `&mut` into every stage
/// call. Counters are maintained by the trainer; the working set below them
/// is the channel pipes use to hand data to each other.
pub struct TrainerContext {
    /// Train epochs started so far
    pub epoch: usize,
    /// Train batches started so far, across epochs
    pub global_iteration: usize,
    /// Batches started in the current epoch
    pub epoch_iteration: usize,
    pub mode: Mode,
    pub subset: String,
    pub status: Status,
    /// Set by a pipe to end the epoch after the current batch
    pub stop_epoch: bool,

    /// Batch count for the current epoch, supplied by a dataset pipe
    pub n_iterations: Option<usize>,
    pub model: Option<SharedModule>,
    /// Bindings installed by optimization pipes, in installation order
    pub optimizers: Vec<OptimizerBinding>,
    pub input: Option<Batch>,
    pub output: Option<Tensor>,
    pub loss: Option<Tensor>,
    pub metrics: MetricsSnapshot,
    pub best_metric: Option<f64>,
    pub rng: StdRng,
}

impl TrainerContext {
    pub fn new(seed: u64) -> Self {
        let mut status = Status::new();
        status.set("epoch", 0usize);
        status.set("iteration", 0usize);

        Self {
            epoch: 0,
            global_iteration: 0,
            epoch_iteration: 0,
            mode: Mode::default(),
            subset: String::new(),
            status,
            stop_epoch: false,
            n_iterations: None,
            model: None,
            optimizers: Vec::new(),
            input: None,
            output: None,
            loss: None,
            metrics: MetricsSnapshot::new(),
            best_metric: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_train(&self) -> bool {
        self.mode.is_train()
    }

    /// The installed model
    pub fn model(&self) -> Result<SharedModule> {
        self.model.clone().ok_or(Error::MissingModel)
    }

    /// The current batch
    pub fn input(&self) -> Result<&Batch> {
        self.input
            .as_ref()
            .ok_or_else(|| Error::MissingBatch("no input batch for this iteration".into()))
    }

    /// The model output for the current batch
    pub fn output(&self) -> Result<&Tensor> {
        self.output
            .as_ref()
            .ok_or_else(|| Error::MissingBatch("no model output for this iteration".into()))
    }

    /// Epoch average of `metric` on `subset`, if recorded
    pub fn metric(&self, subset: &str, metric: &str) -> Option<f64> {
        self.metrics.get(subset)?.get(metric).copied()
    }
}

impl fmt::Debug for TrainerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainerContext")
            .field("epoch", &self.epoch)
            .field("global_iteration", &self.global_iteration)
            .field("epoch_iteration", &self.epoch_iteration)
            .field("mode", &self.mode)
            .field("subset", &self.subset)
            .field("n_iterations", &self.n_iterations)
            .field("optimizers", &self.optimizers)
            .field("stop_epoch", &self.stop_epoch)
            .finish_non_exhaustive()
    }
}
