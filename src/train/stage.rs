//! Lifecycle stages and per-stage priorities

use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A lifecycle hook fired by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Once, when the trainer is built
    Init,
    /// Before the first batch of an epoch
    EpochBegin,
    /// Batch preparation
    BatchBegin,
    /// Model invocation
    BatchRun,
    /// Batch bookkeeping and updates
    BatchEnd,
    /// After the last batch of an epoch that was not stopped early
    EpochEnd,
}

impl Stage {
    /// All stages in firing order
    pub const ALL: [Stage; 6] = [
        Stage::Init,
        Stage::EpochBegin,
        Stage::BatchBegin,
        Stage::BatchRun,
        Stage::BatchEnd,
        Stage::EpochEnd,
    ];

    /// Name of the hook method, e.g. `on_batch_begin`
    pub fn hook_name(&self) -> &'static str {
        match self {
            Stage::Init => "on_init",
            Stage::EpochBegin => "on_epoch_begin",
            Stage::BatchBegin => "on_batch_begin",
            Stage::BatchRun => "on_batch_run",
            Stage::BatchEnd => "on_batch_end",
            Stage::EpochEnd => "on_epoch_end",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hook_name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    /// Accepts hook names, bare names and the `before_*`/`after_*` aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_init" | "init" => Ok(Stage::Init),
            "on_epoch_begin" | "epoch_begin" | "before_epoch" => Ok(Stage::EpochBegin),
            "on_batch_begin" | "batch_begin" | "before_batch" => Ok(Stage::BatchBegin),
            "on_batch_run" | "batch_run" => Ok(Stage::BatchRun),
            "on_batch_end" | "batch_end" | "after_batch" => Ok(Stage::BatchEnd),
            "on_epoch_end" | "epoch_end" | "after_epoch" => Ok(Stage::EpochEnd),
            other => Err(Error::Config(format!("unknown stage '{other}'"))),
        }
    }
}

/// Effective priority of a pipe for every stage
///
/// A pipe declares either one priority for all stages or priorities for some
/// stages; both forms normalize to this map. Stages without an entry use
/// `default`, which is 0 unless a scalar priority was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityMap {
    #[serde(default)]
    default: i32,
    #[serde(default)]
    stages: BTreeMap<Stage, i32>,
}

impl PriorityMap {
    /// Same priority for every stage
    pub fn uniform(priority: i32) -> Self {
        Self {
            default: priority,
            stages: BTreeMap::new(),
        }
    }

    /// Set the priority of one stage
    pub fn with(mut self, stage: Stage, priority: i32) -> Self {
        self.stages.insert(stage, priority);
        self
    }

    /// Build from `(stage, priority)` pairs; unlisted stages get 0
    pub fn from_stages<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Stage, i32)>,
    {
        Self {
            default: 0,
            stages: entries.into_iter().collect(),
        }
    }

    /// Build from hook names, as written in config files
    pub fn from_named<I, S>(entries: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (S, i32)>,
        S: AsRef<str>,
    {
        let mut map = Self::default();
        for (name, priority) in entries {
            map.stages.insert(name.as_ref().parse()?, priority);
        }
        Ok(map)
    }

    pub fn get(&self, stage: Stage) -> i32 {
        self.stages.get(&stage).copied().unwrap_or(self.default)
    }
}

impl From<i32> for PriorityMap {
    fn from(priority: i32) -> Self {
        Self::uniform(priority)
    }
}
