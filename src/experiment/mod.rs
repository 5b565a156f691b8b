//! Run data model
//!
//! This module provides the data structures for one simulation batch:
//! runs, their validated parameters, and their per-tick statistics.
//!
//! ## Schema Overview
//!
//! ```text
//! experiment name (1) ──< RunRecord (N)   [repeated trials]
//!                            │
//!                            ├── RunParams   [maxDays + extension map]
//!                            └── TimeSeries  [tick → numeric columns]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use runstats::experiment::{RunRecord, TimeSeries};
//! use serde_json::json;
//!
//! let series = TimeSeries::from_columns(vec![0, 1, 2], vec![("popCount", vec![10.0, 11.0, 9.0])])?;
//!
//! let run = RunRecord::new("default", "1").load(series, json!({"maxDays": 3}))?;
//! assert!(run.is_success()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod params;
mod run_record;
mod series;

pub use params::{RunParams, MAX_DAYS_KEY};
pub use run_record::{RunKey, RunRecord, RunState};
pub use series::{TimeSeries, TICK_COLUMN};
