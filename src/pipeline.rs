//! End-to-end batch: load → verify → report → aggregate
//!
//! Either the whole batch analyzes cleanly or an error comes back before
//! any output exists; there is no partial result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::analysis::{
    aggregate_with, success_rates, verify_params, AggregateOptions, AggregatedSeries,
    SuccessSummary,
};
use crate::experiment::RunRecord;
use crate::loader::{discover_runs, load_runs, LoadOptions, LoadPolicy};
use crate::{Error, Result};

/// Configured batch analysis over one data directory.
#[derive(Debug, Clone)]
pub struct Pipeline {
    data_dir: PathBuf,
    load: LoadOptions,
    aggregate: AggregateOptions,
}

impl Pipeline {
    /// Create a new pipeline builder
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Directory the runs are read from.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Discover, load, and analyze every run in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory holds no runs, a run fails to load
    /// under [`LoadPolicy::Abort`], or successful runs of an experiment
    /// disagree on their params.
    pub fn run(&self) -> Result<BatchReport> {
        let keys = discover_runs(&self.data_dir)?;
        if keys.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no *-stats.csv files found in {}",
                self.data_dir.display()
            )));
        }
        let runs = load_runs(&self.data_dir, &keys, &self.load)?;
        BatchReport::analyze(runs, &self.aggregate)
    }
}

/// Pipeline builder
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    data_dir: Option<PathBuf>,
    load: LoadOptions,
    aggregate: AggregateOptions,
}

impl PipelineBuilder {
    /// Set the directory holding `<name>-<id>-stats.csv` / `-params.json` pairs
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set how unloadable runs are handled
    #[must_use]
    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load.policy = policy;
        self
    }

    /// Set loader worker threads (0 = one per core)
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.load.threads = threads;
        self
    }

    /// Set aggregation options
    #[must_use]
    pub fn aggregate_options(mut self, options: AggregateOptions) -> Self {
        self.aggregate = options;
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no data directory was set or it is
    /// not a directory.
    pub fn build(self) -> Result<Pipeline> {
        let data_dir = self
            .data_dir
            .ok_or_else(|| Error::InvalidInput("data directory not set".to_string()))?;
        if !data_dir.is_dir() {
            return Err(Error::InvalidInput(format!(
                "{} is not a directory",
                data_dir.display()
            )));
        }
        Ok(Pipeline {
            data_dir,
            load: self.load,
            aggregate: self.aggregate,
        })
    }
}

/// Everything one batch produces.
#[derive(Debug, Clone)]
pub struct BatchReport {
    runs: Vec<RunRecord>,
    summaries: Vec<SuccessSummary>,
    aggregated: BTreeMap<String, Option<AggregatedSeries>>,
}

impl BatchReport {
    /// Analyze already-loaded runs.
    ///
    /// Params are verified before anything is aggregated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamMismatch`] or [`Error::NotLoaded`].
    pub fn analyze(runs: Vec<RunRecord>, options: &AggregateOptions) -> Result<Self> {
        info!(runs = runs.len(), "analyzing batch");
        verify_params(&runs)?;
        let summaries = success_rates(&runs)?;
        let aggregated = aggregate_with(&runs, options)?;
        Ok(Self {
            runs,
            summaries,
            aggregated,
        })
    }

    /// All runs, in discovery order.
    #[must_use]
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Success summary rows, sorted by name.
    #[must_use]
    pub fn summaries(&self) -> &[SuccessSummary] {
        &self.summaries
    }

    /// Aggregated series per experiment, `None` where nothing succeeded.
    #[must_use]
    pub const fn aggregated(&self) -> &BTreeMap<String, Option<AggregatedSeries>> {
        &self.aggregated
    }
}
