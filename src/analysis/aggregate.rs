//! Aggregator - per-tick means across repeated trials
//!
//! Successful runs of one experiment are stacked row-wise (no dedup: every
//! trial contributes its own row at each tick), grouped by `tick`, and every
//! numeric column is reduced to its arithmetic mean. Sums and counts are
//! accumulated in a fixed order (runs by id, rows by file position) and
//! divided once, so output is bit-for-bit reproducible.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use tracing::debug;

use super::successful_by_name;
use crate::experiment::{RunRecord, TICK_COLUMN};
use crate::{Error, Result};

/// Population count column.
pub const POP_COUNT: &str = "popCount";
/// Mean share percent column.
pub const SHARE_AVG: &str = "sharePercentAvg";
/// Minimum share percent column.
pub const SHARE_MIN: &str = "sharePercentMin";
/// Maximum share percent column.
pub const SHARE_MAX: &str = "sharePercentMax";
/// Share percent standard deviation column.
pub const SHARE_SD: &str = "sharePercentSD";
/// Derived `sharePercentAvg + sharePercentSD` band.
pub const SHARE_UPPER: &str = "sharePercentStdUpper";
/// Derived `sharePercentAvg - sharePercentSD` band.
pub const SHARE_LOWER: &str = "sharePercentStdLower";

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    round_columns: Vec<String>,
}

impl Default for AggregateOptions {
    /// Rounds `popCount` after averaging.
    fn default() -> Self {
        Self {
            round_columns: vec![POP_COUNT.to_string()],
        }
    }
}

impl AggregateOptions {
    /// Options that keep every mean unrounded.
    #[must_use]
    pub const fn without_rounding() -> Self {
        Self {
            round_columns: Vec::new(),
        }
    }

    /// Also round `column` (a conceptual integer count) after averaging.
    #[must_use]
    pub fn round(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.round_columns.contains(&column) {
            self.round_columns.push(column);
        }
        self
    }

    /// Columns rounded to the nearest integer (ties to even).
    #[must_use]
    pub fn round_columns(&self) -> &[String] {
        &self.round_columns
    }
}

/// Averaged per-tick table of one experiment.
///
/// Columns: `tick` (`Int64`, ascending, distinct) followed by nullable
/// `Float64` means, then the derived share-percent bands when both sources
/// are present. A null cell means no trial reported a finite value for that
/// column at that tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeries {
    batch: RecordBatch,
    run_count: usize,
}

impl AggregatedSeries {
    /// Renderer-agnostic Arrow view of the table.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of successful runs averaged into this table.
    #[must_use]
    pub const fn run_count(&self) -> usize {
        self.run_count
    }

    /// Number of distinct ticks.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Column names in output order, `tick` first.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Tick values, ascending.
    #[must_use]
    pub fn ticks(&self) -> Vec<i64> {
        self.batch
            .column_by_name(TICK_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .map(|t| t.values().to_vec())
            .unwrap_or_default()
    }

    /// A mean (or derived) column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Float64Array> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
    }

    /// True if every named column is present.
    #[must_use]
    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }

    /// Single cell, `None` if the column is absent or the cell is null.
    #[must_use]
    pub fn value(&self, column: &str, row: usize) -> Option<f64> {
        let values = self.column(column)?;
        (row < values.len() && values.is_valid(row)).then(|| values.value(row))
    }

    /// `(tick, value)` pairs of one column, skipping nulls.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn points(&self, column: &str) -> Vec<(f64, f64)> {
        let Some(values) = self.column(column) else {
            return Vec::new();
        };
        self.ticks()
            .into_iter()
            .enumerate()
            .filter(|(row, _)| values.is_valid(*row))
            .map(|(row, tick)| (tick as f64, values.value(row)))
            .collect()
    }

    /// Regroup rows by the value of `key` and average `value` per key.
    ///
    /// Rows with a null in either column are skipped. Output is ascending by
    /// key; `None` if either column is absent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_by(&self, key: &str, value: &str) -> Option<Vec<(f64, f64)>> {
        let keys = self.column(key)?;
        let values = self.column(value)?;

        let mut pairs: Vec<(f64, f64)> = (0..self.num_rows())
            .filter(|&row| keys.is_valid(row) && values.is_valid(row))
            .map(|row| (keys.value(row), values.value(row)))
            .collect();
        // stable: rows sharing a key keep tick order
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        Some(
            pairs
                .chunk_by(|a, b| a.0.total_cmp(&b.0).is_eq())
                .map(|chunk| {
                    let sum: f64 = chunk.iter().map(|(_, v)| v).sum();
                    (chunk[0].0, sum / chunk.len() as f64)
                })
                .collect(),
        )
    }
}

/// Aggregate every experiment with default options (`popCount` rounded).
///
/// # Errors
///
/// See [`aggregate_with`].
pub fn aggregate(runs: &[RunRecord]) -> Result<BTreeMap<String, Option<AggregatedSeries>>> {
    aggregate_with(runs, &AggregateOptions::default())
}

/// Aggregate every experiment, keyed and ordered by name.
///
/// An experiment with no successful run maps to `None`, never to an empty
/// table.
///
/// # Errors
///
/// Returns [`Error::NotLoaded`] if any run was never loaded, or
/// [`Error::Arrow`] if the output table cannot be assembled.
///
/// # Example
///
/// ```rust
/// use runstats::analysis::aggregate;
/// use runstats::experiment::{RunParams, RunRecord, TimeSeries};
///
/// let trial = |id: &str, pop: f64| -> runstats::Result<RunRecord> {
///     let series = TimeSeries::from_columns(vec![0], vec![("pop", vec![pop])])
///         .map_err(runstats::Error::Other)?;
///     RunRecord::new("A", id).load_params(series, RunParams::new(1))
/// };
/// let runs = vec![trial("1", 10.0)?, trial("2", 20.0)?];
///
/// let aggregated = aggregate(&runs)?;
/// let a = aggregated["A"].as_ref().unwrap();
/// assert_eq!(a.ticks(), vec![0]);
/// assert_eq!(a.value("pop", 0), Some(15.0));
/// # Ok::<(), runstats::Error>(())
/// ```
pub fn aggregate_with(
    runs: &[RunRecord],
    options: &AggregateOptions,
) -> Result<BTreeMap<String, Option<AggregatedSeries>>> {
    let mut aggregated = BTreeMap::new();
    for (name, group) in successful_by_name(runs)? {
        let summary = if group.is_empty() {
            debug!(experiment = name, "no successful runs");
            None
        } else {
            let series = reduce_group(&group, options)?;
            debug!(
                experiment = name,
                runs = series.run_count(),
                ticks = series.num_rows(),
                "aggregated"
            );
            Some(series)
        };
        aggregated.insert(name.to_string(), summary);
    }
    Ok(aggregated)
}

/// Per-tick, per-column running sum and count.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    #[allow(clippy::cast_precision_loss)]
    fn mean(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn reduce_group(group: &[&RunRecord], options: &AggregateOptions) -> Result<AggregatedSeries> {
    let mut columns: Vec<String> = Vec::new();
    let mut by_tick: BTreeMap<i64, Vec<Accumulator>> = BTreeMap::new();

    for run in group {
        let series = run.series().ok_or_else(|| Error::NotLoaded {
            run: run.key().to_string(),
        })?;

        let mut sources: Vec<(usize, &Float64Array)> = Vec::new();
        for (name, values) in series.numeric_columns() {
            let slot = match columns.iter().position(|c| c == name) {
                Some(slot) => slot,
                None => {
                    columns.push(name.to_string());
                    columns.len() - 1
                }
            };
            sources.push((slot, values));
        }

        for (row, tick) in series.ticks().values().iter().enumerate() {
            let accs = by_tick.entry(*tick).or_default();
            if accs.len() < columns.len() {
                accs.resize(columns.len(), Accumulator::default());
            }
            for &(slot, values) in &sources {
                let value = values.value(row);
                if values.is_valid(row) && value.is_finite() {
                    accs[slot].sum += value;
                    accs[slot].count += 1;
                }
            }
        }
    }

    let derive_bands =
        columns.iter().any(|c| c == SHARE_AVG) && columns.iter().any(|c| c == SHARE_SD);

    let mut fields = vec![Field::new(TICK_COLUMN, DataType::Int64, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(
        by_tick.keys().copied().collect::<Vec<i64>>(),
    ))];
    let mut means: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();

    for (slot, name) in columns.iter().enumerate() {
        if derive_bands && (name == SHARE_UPPER || name == SHARE_LOWER) {
            continue;
        }
        let round = options.round_columns.contains(name);
        let values: Vec<Option<f64>> = by_tick
            .values()
            .map(|accs| {
                let mean = accs.get(slot).copied().unwrap_or_default().mean();
                if round {
                    mean.map(f64::round_ties_even)
                } else {
                    mean
                }
            })
            .collect();
        fields.push(Field::new(name.as_str(), DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
        means.insert(name.as_str(), values);
    }

    if let (true, Some(avg), Some(sd)) =
        (derive_bands, means.get(SHARE_AVG), means.get(SHARE_SD))
    {
        let upper: Vec<Option<f64>> = avg
            .iter()
            .zip(sd)
            .map(|(a, s)| Some((*a)? + (*s)?))
            .collect();
        let lower: Vec<Option<f64>> = avg
            .iter()
            .zip(sd)
            .map(|(a, s)| Some((*a)? - (*s)?))
            .collect();
        fields.push(Field::new(SHARE_UPPER, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(upper)));
        fields.push(Field::new(SHARE_LOWER, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(lower)));
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(AggregatedSeries {
        batch,
        run_count: group.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::run;

    #[test]
    fn test_mean_of_two_trials() {
        let runs = vec![
            run("A", "1", 1, 0, &[("pop", 10.0)]),
            run("A", "2", 1, 0, &[("pop", 20.0)]),
        ];
        let out = aggregate(&runs).unwrap();
        let a = out["A"].as_ref().unwrap();
        assert_eq!(a.ticks(), vec![0]);
        assert_eq!(a.value("pop", 0), Some(15.0));
        assert_eq!(a.run_count(), 2);
    }

    #[test]
    fn test_group_without_success_is_none() {
        let runs = vec![
            run("A", "1", 10, 3, &[("pop", 1.0)]),
            run("B", "1", 1, 0, &[("pop", 1.0)]),
        ];
        let out = aggregate(&runs).unwrap();
        assert!(out["A"].is_none());
        assert!(out["B"].is_some());
    }

    #[test]
    fn test_failed_trials_excluded_from_mean() {
        let runs = vec![
            run("A", "1", 2, 1, &[("pop", 10.0)]),
            run("A", "2", 2, 0, &[("pop", 1000.0)]),
        ];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(a.value("pop", 0), Some(10.0));
    }

    #[test]
    fn test_derived_bands() {
        let runs = vec![run("A", "1", 1, 0, &[(SHARE_AVG, 0.5), (SHARE_SD, 0.1)])];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert!((a.value(SHARE_UPPER, 0).unwrap() - 0.6).abs() < 1e-12);
        assert!((a.value(SHARE_LOWER, 0).unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(
            a.column_names(),
            vec![TICK_COLUMN, SHARE_AVG, SHARE_SD, SHARE_UPPER, SHARE_LOWER]
        );
    }

    #[test]
    fn test_bands_skipped_without_sd() {
        let runs = vec![run("A", "1", 1, 0, &[(SHARE_AVG, 0.5)])];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert!(!a.has_columns(&[SHARE_UPPER]));
        assert!(!a.has_columns(&[SHARE_LOWER]));
    }

    #[test]
    fn test_pop_count_rounded_by_default() {
        let runs = vec![
            run("A", "1", 1, 0, &[(POP_COUNT, 10.0)]),
            run("A", "2", 1, 0, &[(POP_COUNT, 13.0)]),
        ];
        let rounded = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(rounded.value(POP_COUNT, 0), Some(12.0));

        let raw = aggregate_with(&runs, &AggregateOptions::without_rounding())
            .unwrap()
            .remove("A")
            .flatten()
            .unwrap();
        assert_eq!(raw.value(POP_COUNT, 0), Some(11.5));
    }

    #[test]
    fn test_uneven_tick_coverage() {
        // trial 2 runs longer; tick 2 only has its row
        let runs = vec![
            run("A", "1", 2, 1, &[("pop", 2.0)]),
            run("A", "2", 2, 2, &[("pop", 4.0)]),
        ];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(a.ticks(), vec![0, 1, 2]);
        assert_eq!(a.value("pop", 1), Some(3.0));
        assert_eq!(a.value("pop", 2), Some(4.0));
    }

    #[test]
    fn test_column_missing_in_some_trials() {
        let runs = vec![
            run("A", "1", 1, 0, &[("pop", 2.0)]),
            run("A", "2", 1, 0, &[("pop", 4.0), ("food", 7.0)]),
        ];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(a.value("food", 0), Some(7.0));
        assert_eq!(a.column_names(), vec![TICK_COLUMN, "pop", "food"]);
    }

    #[test]
    fn test_non_finite_cells_skipped() {
        let runs = vec![
            run("A", "1", 1, 0, &[(SHARE_SD, 0.2), ("food", f64::NAN)]),
            run("A", "2", 1, 0, &[(SHARE_SD, f64::NAN), ("food", f64::INFINITY)]),
        ];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(a.value(SHARE_SD, 0), Some(0.2));
        assert_eq!(a.value("food", 0), None);
    }

    #[test]
    fn test_mean_by() {
        let runs = vec![run("A", "1", 1, 3, &[(POP_COUNT, 5.0), (SHARE_AVG, 0.5)])];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(a.mean_by(POP_COUNT, SHARE_AVG), Some(vec![(5.0, 0.5)]));
        assert!(a.mean_by(POP_COUNT, "missing").is_none());
    }

    #[test]
    fn test_points_skip_nulls() {
        let runs = vec![
            run("A", "1", 1, 0, &[("pop", 2.0)]),
            run("A", "2", 1, 1, &[("food", 1.0)]),
        ];
        let a = aggregate(&runs).unwrap().remove("A").flatten().unwrap();
        assert_eq!(a.points("pop"), vec![(0.0, 2.0)]);
        assert_eq!(a.points("food"), vec![(0.0, 1.0), (1.0, 1.0)]);
    }
}
