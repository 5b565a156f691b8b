//! Run Loader - discovery and parsing of `<name>-<id>-{stats.csv,params.json}` pairs
//!
//! Each file pair is independent and read-only, so with the `parallel`
//! feature runs are parsed on a bounded rayon pool. Results are always
//! returned in key order, whatever order the workers finish in.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::experiment::{RunKey, RunRecord, TimeSeries};
use crate::{Error, Result};

/// What to do when a run's files cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Fail the whole batch on the first bad run (in key order).
    #[default]
    Abort,
    /// Keep the run as [`crate::experiment::RunState::LoadFailed`] and continue.
    /// It still counts toward its experiment's total, never as a success.
    Exclude,
}

/// Loader settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Failure handling
    pub policy: LoadPolicy,
    /// Worker threads (0 = one per core). Ignored without `parallel`.
    pub threads: usize,
}

/// Find every run in `dir`, sorted by (name, id).
///
/// A run is any `<name>-<id>-stats.csv`; other files are skipped.
///
/// # Errors
///
/// Returns [`Error::ReadFailed`] if the directory cannot be listed.
pub fn discover_runs(dir: &Path) -> Result<Vec<RunKey>> {
    let read_failed = |source| Error::ReadFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut keys = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            debug!(file = ?file_name, "non-UTF-8 file name, skipping");
            continue;
        };
        match RunKey::from_stats_file_name(file_name) {
            Some(key) => keys.push(key),
            None => debug!(file = file_name, "not a stats file, skipping"),
        }
    }
    keys.sort();
    debug!(dir = %dir.display(), runs = keys.len(), "discovered runs");
    Ok(keys)
}

/// Path of a run's stats CSV within `dir`.
#[must_use]
pub fn stats_path(dir: &Path, key: &RunKey) -> PathBuf {
    dir.join(key.stats_file_name())
}

/// Path of a run's params JSON within `dir`.
#[must_use]
pub fn params_path(dir: &Path, key: &RunKey) -> PathBuf {
    dir.join(key.params_file_name())
}

/// Read and validate one run's file pair.
///
/// # Errors
///
/// Returns [`Error::ReadFailed`] if either file cannot be opened, and
/// [`Error::MalformedInput`] if either file fails to parse or validate.
pub fn load_run(dir: &Path, key: &RunKey) -> Result<RunRecord> {
    let csv_path = stats_path(dir, key);
    let json_path = params_path(dir, key);

    let series = TimeSeries::from_csv(BufReader::new(open(&csv_path)?)).map_err(|reason| {
        Error::malformed(key.to_string(), format!("{}: {reason}", csv_path.display()))
    })?;

    let params: Value =
        serde_json::from_reader(BufReader::new(open(&json_path)?)).map_err(|e| {
            Error::malformed(key.to_string(), format!("{}: {e}", json_path.display()))
        })?;

    let run = RunRecord::unloaded(key.clone()).load(series, params)?;
    info!(run = %run, "loaded");
    Ok(run)
}

/// Load every run in `keys` from `dir`, returned in the order of `keys`.
///
/// # Errors
///
/// Under [`LoadPolicy::Abort`], returns the error of the first failing run
/// in `keys` order. Under [`LoadPolicy::Exclude`] never fails; bad runs are
/// kept as load-failed records.
pub fn load_runs(dir: &Path, keys: &[RunKey], options: &LoadOptions) -> Result<Vec<RunRecord>> {
    let results = load_all(dir, keys, options.threads)?;

    let mut runs = Vec::with_capacity(results.len());
    for (key, result) in keys.iter().zip(results) {
        match (result, options.policy) {
            (Ok(run), _) => runs.push(run),
            (Err(e), LoadPolicy::Abort) => return Err(e),
            (Err(e), LoadPolicy::Exclude) => {
                warn!(run = %key, error = %e, "excluding run that failed to load");
                runs.push(RunRecord::failed(key.clone(), e.to_string()));
            }
        }
    }
    info!(runs = runs.len(), "loaded batch");
    Ok(runs)
}

#[cfg(feature = "parallel")]
fn load_all(dir: &Path, keys: &[RunKey], threads: usize) -> Result<Vec<Result<RunRecord>>> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("runstats-load-{i}"))
        .build()
        .map_err(|e| Error::Other(format!("Failed to start loader pool: {e}")))?;

    Ok(pool.install(|| keys.par_iter().map(|key| load_run(dir, key)).collect()))
}

#[cfg(not(feature = "parallel"))]
#[allow(clippy::unnecessary_wraps)]
fn load_all(dir: &Path, keys: &[RunKey], _threads: usize) -> Result<Vec<Result<RunRecord>>> {
    Ok(keys.iter().map(|key| load_run(dir, key)).collect())
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}
