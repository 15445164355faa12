//! Error types for Setka

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No pipe supplied an iteration count for mode '{mode}' on subset '{subset}'")]
    MissingIterationCount { mode: String, subset: String },

    #[error("No model installed in the trainer context")]
    MissingModel,

    #[error("Missing batch data: {0}")]
    MissingBatch(String),

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Checkpoint does not match the current configuration: {0}")]
    CheckpointMismatch(String),

    #[error("Pipe '{pipe}' failed: {message}")]
    Callback { pipe: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a pipe failure
    pub fn callback(pipe: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Callback {
            pipe: pipe.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
