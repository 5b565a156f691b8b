//! Error types for runstats
//!
//! Every variant carries enough context (run `<name>-<id>` or file path) to
//! locate the offending input files without re-running the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// runstats error types
#[derive(Error, Debug)]
pub enum Error {
    /// A CSV/JSON pair is missing required columns/keys or cannot be parsed
    #[error("Malformed input for run {run}: {reason}")]
    MalformedInput {
        /// Run key (`<name>-<id>`)
        run: String,
        /// What was wrong with the files
        reason: String,
    },

    /// Success or aggregation queried on a run that never finished loading
    #[error("Run {run} has not been loaded\nThis is a programming error. Please report this issue.")]
    NotLoaded {
        /// Run key (`<name>-<id>`)
        run: String,
    },

    /// Successful runs of the same experiment carry different parameters
    #[error("Mismatched params in experiment '{run_name}': run {run_id} differs from run {reference_id}\nInspect the data batch for misnamed or overwritten params files.")]
    ParamMismatch {
        /// Experiment name shared by both runs
        run_name: String,
        /// Offending run id
        run_id: String,
        /// First successful run id of the group (the reference params)
        reference_id: String,
    },

    /// Experiment group with zero runs reached the success-rate computation
    #[error("Experiment '{0}' has no runs; cannot compute a success rate\nThis is an internal consistency error. Please report this issue.")]
    DivideByZero(String),

    /// Input file could not be opened or read
    #[error("Failed to read {}: {source}", path.display())]
    ReadFailed {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Chart backend failure
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid caller-supplied argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::MalformedInput`].
    pub fn malformed(run: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            run: run.into(),
            reason: reason.into(),
        }
    }
}
