//! Run Record - one simulation execution and its loaded data

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RunParams, TimeSeries};
use crate::{Error, Result};

const STATS_SUFFIX: &str = "-stats.csv";
const PARAMS_SUFFIX: &str = "-params.json";

/// Identity of a run: experiment name plus trial id.
///
/// Orders by name, then id, which is also the order runs are discovered and
/// reported in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    run_name: String,
    run_id: String,
}

impl RunKey {
    /// Create a run key.
    #[must_use]
    pub fn new(run_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            run_name: run_name.into(),
            run_id: run_id.into(),
        }
    }

    /// Parse a `<run_name>-<run_id>-stats.csv` file name.
    ///
    /// The id is everything after the last `-` of the stem, so experiment
    /// names may themselves contain dashes. Returns `None` for any other file.
    #[must_use]
    pub fn from_stats_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(STATS_SUFFIX)?;
        let (run_name, run_id) = stem.rsplit_once('-')?;
        if run_name.is_empty() || run_id.is_empty() {
            return None;
        }
        Some(Self::new(run_name, run_id))
    }

    /// Experiment name shared by repeated trials.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Trial id within the experiment.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// File name of the per-tick stats CSV.
    #[must_use]
    pub fn stats_file_name(&self) -> String {
        format!("{}-{}{STATS_SUFFIX}", self.run_name, self.run_id)
    }

    /// File name of the params JSON.
    #[must_use]
    pub fn params_file_name(&self) -> String {
        format!("{}-{}{PARAMS_SUFFIX}", self.run_name, self.run_id)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.run_name, self.run_id)
    }
}

/// Load state of a run.
///
/// Series and params only ever exist together, in `Loaded`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Discovered but not loaded yet.
    Unloaded,
    /// Files parsed and validated.
    Loaded {
        /// Per-tick statistics
        series: TimeSeries,
        /// Validated run parameters
        params: RunParams,
    },
    /// Files could not be loaded; the run is kept so it still counts toward
    /// its experiment's total.
    LoadFailed(String),
}

/// Run Record represents a single execution of a named experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    key: RunKey,
    state: RunState,
}

impl RunRecord {
    /// Create an unloaded run record.
    #[must_use]
    pub fn new(run_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::unloaded(RunKey::new(run_name, run_id))
    }

    /// Create an unloaded run record from a key.
    #[must_use]
    pub const fn unloaded(key: RunKey) -> Self {
        Self {
            key,
            state: RunState::Unloaded,
        }
    }

    /// Create a record for a run whose files could not be loaded.
    #[must_use]
    pub fn failed(key: RunKey, reason: impl Into<String>) -> Self {
        Self {
            key,
            state: RunState::LoadFailed(reason.into()),
        }
    }

    /// Load already-parsed data into this run.
    ///
    /// # Arguments
    ///
    /// * `series` - Per-tick statistics table
    /// * `raw_params` - Parsed params JSON document
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if the series has no rows or the
    /// params lack a valid `maxDays`, and [`Error::InvalidInput`] if the run
    /// was already loaded.
    pub fn load(self, series: TimeSeries, raw_params: Value) -> Result<Self> {
        let params = RunParams::from_value(raw_params)
            .map_err(|reason| Error::malformed(self.key.to_string(), reason))?;
        self.load_params(series, params)
    }

    /// Load a series together with already-validated params.
    ///
    /// # Errors
    ///
    /// Same as [`RunRecord::load`], minus params validation.
    pub fn load_params(self, series: TimeSeries, params: RunParams) -> Result<Self> {
        if !matches!(self.state, RunState::Unloaded) {
            return Err(Error::InvalidInput(format!(
                "run {} is already loaded",
                self.key
            )));
        }
        if series.is_empty() {
            return Err(Error::malformed(self.key.to_string(), "stats table has no rows"));
        }
        Ok(Self {
            key: self.key,
            state: RunState::Loaded { series, params },
        })
    }

    /// Run identity.
    #[must_use]
    pub const fn key(&self) -> &RunKey {
        &self.key
    }

    /// Experiment name.
    #[must_use]
    pub fn run_name(&self) -> &str {
        self.key.run_name()
    }

    /// Trial id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.key.run_id()
    }

    /// Current load state.
    #[must_use]
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    /// True once series and params are present.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self.state, RunState::Loaded { .. })
    }

    /// Loaded series, if any.
    #[must_use]
    pub const fn series(&self) -> Option<&TimeSeries> {
        match &self.state {
            RunState::Loaded { series, .. } => Some(series),
            _ => None,
        }
    }

    /// Loaded params, if any.
    #[must_use]
    pub const fn params(&self) -> Option<&RunParams> {
        match &self.state {
            RunState::Loaded { params, .. } => Some(params),
            _ => None,
        }
    }

    /// Whether the run recorded its final day: `max(tick) >= maxDays - 1`.
    ///
    /// A run whose files failed to load never counts as successful.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] if the run was never loaded.
    pub fn is_success(&self) -> Result<bool> {
        match &self.state {
            RunState::Loaded { series, params } => Ok(series
                .max_tick()
                .is_some_and(|last| last >= params.max_days() - 1)),
            RunState::LoadFailed(_) => Ok(false),
            RunState::Unloaded => Err(Error::NotLoaded {
                run: self.key.to_string(),
            }),
        }
    }

    /// Human-readable `"<name> - <id>: Success|Fail"` line.
    #[must_use]
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.is_success() {
            Ok(true) => "Success",
            Ok(false) => "Fail",
            Err(_) => "Not loaded",
        };
        write!(f, "{} - {}: {outcome}", self.key.run_name, self.key.run_id)
    }
}
