//! # runstats: Simulation Batch Aggregation
//!
//! **Version**: 0.1.0
//!
//! runstats reads a directory of simulation runs, each a
//! `<name>-<id>-stats.csv` time series plus a `<name>-<id>-params.json`
//! parameter set, and reduces them per experiment:
//!
//! - **Success rates**: a run succeeds when its last tick reaches
//!   `maxDays - 1`
//! - **Param verification**: successful runs of one experiment must share
//!   identical params, or the batch is rejected
//! - **Tick-aligned means**: every numeric column averaged over the
//!   successful runs at each tick, with derived ±SD bands
//! - **Charts** (feature `plot`): SVG comparisons of experiments
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use runstats::analysis::SuccessTable;
//! use runstats::loader::LoadPolicy;
//! use runstats::Pipeline;
//!
//! let report = Pipeline::builder()
//!     .data_dir("data")
//!     .load_policy(LoadPolicy::Exclude)
//!     .build()?
//!     .run()?;
//!
//! print!("{}", SuccessTable(report.summaries()));
//! for (name, series) in report.aggregated() {
//!     let rows = series.as_ref().map_or(0, |s| s.num_rows());
//!     println!("{name}: {rows} ticks");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod error;
pub mod experiment;
pub mod loader;
pub mod pipeline;
pub mod render;

pub use error::{Error, Result};
pub use pipeline::{BatchReport, Pipeline, PipelineBuilder};
