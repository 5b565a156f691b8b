//! Time Series - per-tick statistics table of a single run
//!
//! Stored as one Arrow `RecordBatch`: a non-null `Int64` `tick` column,
//! nullable `Float64` columns for numeric statistics, and `Utf8` columns for
//! anything that does not parse as a number (kept, but never averaged).

use std::io::Read;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};

/// Join key column shared by every stats file.
pub const TICK_COLUMN: &str = "tick";

/// Per-tick table of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    batch: RecordBatch,
    ticks: Int64Array,
}

impl TimeSeries {
    /// Wrap an existing batch, checking that it carries a usable `tick` column.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if `tick` is missing, not `Int64`, or
    /// contains nulls.
    pub fn try_new(batch: RecordBatch) -> std::result::Result<Self, String> {
        let ticks = batch
            .column_by_name(TICK_COLUMN)
            .ok_or_else(|| format!("missing '{TICK_COLUMN}' column"))?;
        if ticks.data_type() != &DataType::Int64 {
            return Err(format!(
                "'{TICK_COLUMN}' column must be Int64, got {}",
                ticks.data_type()
            ));
        }
        if ticks.null_count() > 0 {
            return Err(format!("'{TICK_COLUMN}' column contains empty cells"));
        }
        let ticks = ticks
            .as_any()
            .downcast_ref::<Int64Array>()
            .cloned()
            .ok_or_else(|| format!("'{TICK_COLUMN}' column is not an Int64Array"))?;
        Ok(Self { batch, ticks })
    }

    /// Build a series from tick values plus named numeric columns.
    ///
    /// # Errors
    ///
    /// Returns a reason if a column length differs from the tick count.
    ///
    /// # Example
    ///
    /// ```rust
    /// use runstats::experiment::TimeSeries;
    ///
    /// let series = TimeSeries::from_columns(vec![0, 1], vec![("popCount", vec![10.0, 12.0])])?;
    /// assert_eq!(series.max_tick(), Some(1));
    /// # Ok::<(), String>(())
    /// ```
    pub fn from_columns(
        ticks: Vec<i64>,
        columns: Vec<(&str, Vec<f64>)>,
    ) -> std::result::Result<Self, String> {
        let mut fields = vec![Field::new(TICK_COLUMN, DataType::Int64, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(ticks))];
        for (name, values) in columns {
            fields.push(Field::new(name, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(values)));
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| format!("inconsistent columns: {e}"))?;
        Self::try_new(batch)
    }

    /// Parse a stats CSV (header row + one row per tick).
    ///
    /// # Errors
    ///
    /// Returns a reason if the CSV is unreadable or ragged, has duplicate
    /// headers, lacks a `tick` column, or has a non-integer tick.
    pub fn from_csv<R: Read>(reader: R) -> std::result::Result<Self, String> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| format!("unreadable CSV header: {e}"))?
            .iter()
            .map(str::to_string)
            .collect();
        for (i, name) in headers.iter().enumerate() {
            if headers[..i].contains(name) {
                return Err(format!("duplicate column '{name}'"));
            }
        }
        if !headers.iter().any(|h| h == TICK_COLUMN) {
            return Err(format!("missing '{TICK_COLUMN}' column"));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| format!("unreadable CSV row {}: {e}", row + 1))?;
            for (column, field) in cells.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        let mut fields = Vec::with_capacity(headers.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(headers.len());
        for (name, values) in headers.iter().zip(cells) {
            if name == TICK_COLUMN {
                let ticks = values
                    .iter()
                    .enumerate()
                    .map(|(row, v)| {
                        parse_tick(v).ok_or_else(|| {
                            format!("row {}: '{TICK_COLUMN}' is not an integer: '{v}'", row + 1)
                        })
                    })
                    .collect::<std::result::Result<Vec<i64>, String>>()?;
                fields.push(Field::new(name, DataType::Int64, false));
                arrays.push(Arc::new(Int64Array::from(ticks)));
            } else if let Some(numbers) = parse_numeric(&values) {
                fields.push(Field::new(name, DataType::Float64, true));
                arrays.push(Arc::new(Float64Array::from(numbers)));
            } else {
                fields.push(Field::new(name, DataType::Utf8, false));
                arrays.push(Arc::new(StringArray::from(values)));
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| format!("failed to build table: {e}"))?;
        Self::try_new(batch)
    }

    /// Underlying Arrow batch.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows (ticks recorded).
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// True if the run recorded no ticks at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// The `tick` column.
    #[must_use]
    pub const fn ticks(&self) -> &Int64Array {
        &self.ticks
    }

    /// Largest tick recorded, `None` for an empty series.
    #[must_use]
    pub fn max_tick(&self) -> Option<i64> {
        self.ticks().values().iter().copied().max()
    }

    /// Numeric (`Float64`) columns in file order, excluding `tick`.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &Float64Array)> + '_ {
        let schema = self.batch.schema_ref();
        schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .filter(|(field, _)| field.name() != TICK_COLUMN)
            .filter_map(|(field, column)| {
                column
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .map(|values| (field.name().as_str(), values))
            })
    }

    /// Look up a numeric column by name.
    #[must_use]
    pub fn numeric_column(&self, name: &str) -> Option<&Float64Array> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
    }
}

/// Cells read as missing rather than as text.
const NA_TOKENS: [&str; 8] = ["NA", "N/A", "NaN", "nan", "-nan", "null", "NULL", "None"];

fn parse_tick(value: &str) -> Option<i64> {
    if let Ok(tick) = value.parse::<i64>() {
        return Some(tick);
    }
    let f = value.parse::<f64>().ok()?;
    #[allow(clippy::cast_possible_truncation)]
    let truncated = f as i64;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(truncated)
}

/// Parse a whole column as numbers; empty cells, NA tokens, and NaN become
/// nulls. Returns `None` if any other cell is not a number.
fn parse_numeric(values: &[String]) -> Option<Vec<Option<f64>>> {
    values
        .iter()
        .map(|v| {
            if v.is_empty() || NA_TOKENS.contains(&v.as_str()) {
                return Some(None);
            }
            let f = v.parse::<f64>().ok()?;
            Some((!f.is_nan()).then_some(f))
        })
        .collect()
}
