//! Chart Renderer
//!
//! Charts are first built as plain data ([`Chart`]: labelled point lists,
//! shaded bands, bars) from a [`BatchReport`], then handed to a
//! [`ChartRenderer`] backend. Building is pure and backend-agnostic; only
//! the backend touches files.
//!
//! ## Comparison syntax
//!
//! ```text
//! KIND:STEM:NAMES:TITLE
//! pop:pg-pop:pg10,pg11,default:Mean Population of Public Goods Factors
//! success:successes:*:Success Rates of Runs
//! ```
//!
//! `KIND` is one of `pop`, `share`, `share-by-pop`, `success`; `NAMES` is a
//! comma-separated list of experiments or `*` for all of them.

#[cfg(feature = "plot")]
mod svg;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use arrow::array::Array;

#[cfg(feature = "plot")]
pub use svg::SvgRenderer;

use crate::analysis::{
    select, select_summaries, AggregatedSeries, SuccessSummary, POP_COUNT, SHARE_AVG, SHARE_LOWER,
    SHARE_MAX, SHARE_MIN, SHARE_UPPER,
};
use crate::experiment::TICK_COLUMN;
use crate::pipeline::BatchReport;
use crate::{Error, Result};

/// Which view of the batch a chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Mean population over ticks, one line per experiment
    Population,
    /// Mean share percent with min/max and ±SD bands, per experiment
    SharePercent,
    /// Mean share percent against mean population
    ShareByPopulation,
    /// Success rate bars
    SuccessRate,
}

impl FromStr for ChartKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pop" | "population" => Ok(Self::Population),
            "share" | "sp" => Ok(Self::SharePercent),
            "share-by-pop" | "sp-by-pop" => Ok(Self::ShareByPopulation),
            "success" | "successes" => Ok(Self::SuccessRate),
            other => Err(Error::InvalidInput(format!(
                "unknown chart kind '{other}' (expected pop, share, share-by-pop, success)"
            ))),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Population => "pop",
            Self::SharePercent => "share",
            Self::ShareByPopulation => "share-by-pop",
            Self::SuccessRate => "success",
        })
    }
}

/// One requested figure: kind, output file stem, experiments, title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    kind: ChartKind,
    stem: String,
    names: Option<Vec<String>>,
    title: String,
}

impl Comparison {
    /// Compare the given experiments.
    #[must_use]
    pub fn new<S: Into<String>>(
        kind: ChartKind,
        stem: impl Into<String>,
        names: impl IntoIterator<Item = S>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            stem: stem.into(),
            names: Some(names.into_iter().map(Into::into).collect()),
            title: title.into(),
        }
    }

    /// Compare every experiment in the batch.
    #[must_use]
    pub fn all(kind: ChartKind, stem: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            stem: stem.into(),
            names: None,
            title: title.into(),
        }
    }

    /// One chart of each kind over all experiments.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::all(ChartKind::SuccessRate, "successes", "Success Rates of Runs"),
            Self::all(ChartKind::Population, "population", "Mean Population"),
            Self::all(ChartKind::SharePercent, "share-percent", "Mean Share Percent"),
            Self::all(
                ChartKind::ShareByPopulation,
                "share-by-population",
                "Mean Population vs Share Percent",
            ),
        ]
    }

    /// Chart kind.
    #[must_use]
    pub const fn kind(&self) -> ChartKind {
        self.kind
    }

    /// Output file stem.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Chart title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Selected experiments, `None` for all of them.
    #[must_use]
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// Build the chart data for this comparison.
    #[must_use]
    pub fn build(&self, report: &BatchReport) -> Chart {
        match self.kind {
            ChartKind::SuccessRate => {
                let rows = match &self.names {
                    Some(names) => select_summaries(report.summaries(), names),
                    None => report.summaries().to_vec(),
                };
                Chart::Bars(success_chart(&self.title, &rows))
            }
            kind => {
                let series = match &self.names {
                    Some(names) => select(report.aggregated(), names),
                    None => report.aggregated().clone(),
                };
                Chart::Lines(match kind {
                    ChartKind::Population => population_chart(&self.title, &series),
                    ChartKind::SharePercent => share_chart(&self.title, &series),
                    _ => share_by_population_chart(&self.title, &series),
                })
            }
        }
    }
}

impl FromStr for Comparison {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(4, ':').collect();
        let [kind, stem, names, title] = parts[..] else {
            return Err(Error::InvalidInput(format!(
                "comparison '{s}' must look like KIND:STEM:NAMES:TITLE"
            )));
        };
        if stem.is_empty() || stem.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "comparison '{s}' needs a plain file stem"
            )));
        }
        let kind = kind.parse()?;
        if names.trim() == "*" {
            return Ok(Self::all(kind, stem, title));
        }
        let names: Vec<&str> = names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(Error::InvalidInput(format!(
                "comparison '{s}' names no experiments"
            )));
        }
        Ok(Self::new(kind, stem, names, title))
    }
}

/// Shaded region between two curves sharing x values.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// Lower edge, ascending x
    pub lower: Vec<(f64, f64)>,
    /// Upper edge, same x as `lower`
    pub upper: Vec<(f64, f64)>,
    /// Fill opacity in `0.0..=1.0`
    pub opacity: f64,
}

/// One labelled curve plus optional bands drawn beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Legend label
    pub label: String,
    /// Curve points, ascending x
    pub points: Vec<(f64, f64)>,
    /// Shaded ranges around the curve
    pub bands: Vec<Band>,
}

/// Multi-series line chart.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    /// Caption
    pub title: String,
    /// X axis description
    pub x_desc: String,
    /// Y axis description
    pub y_desc: String,
    /// Curves in legend order
    pub lines: Vec<Line>,
}

/// Bar chart of labelled values.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    /// Caption
    pub title: String,
    /// Y axis description
    pub y_desc: String,
    /// `(label, value)` bars, left to right
    pub bars: Vec<(String, f64)>,
}

/// Backend-agnostic chart data.
#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    /// Line chart
    Lines(LineChart),
    /// Bar chart
    Bars(BarChart),
}

impl Chart {
    /// True if there is no finite value to draw.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Lines(chart) => !chart
                .lines
                .iter()
                .flat_map(|l| &l.points)
                .any(|(x, y)| x.is_finite() && y.is_finite()),
            Self::Bars(chart) => !chart.bars.iter().any(|(_, v)| v.is_finite()),
        }
    }
}

/// Drawing backend for built charts.
pub trait ChartRenderer {
    /// Draw `chart` as the figure named `stem`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] or [`Error::Io`] on backend failure.
    fn render(&mut self, stem: &str, chart: &Chart) -> Result<()>;

    /// Build and draw every comparison, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first backend failure.
    fn render_all(&mut self, comparisons: &[Comparison], report: &BatchReport) -> Result<()> {
        for comparison in comparisons {
            self.render(comparison.stem(), &comparison.build(report))?;
        }
        Ok(())
    }
}

type SeriesMap = BTreeMap<String, Option<AggregatedSeries>>;

fn present(series: &SeriesMap) -> impl Iterator<Item = (&str, &AggregatedSeries)> {
    series
        .iter()
        .filter_map(|(name, s)| s.as_ref().map(|s| (name.as_str(), s)))
}

fn population_chart(title: &str, series: &SeriesMap) -> LineChart {
    LineChart {
        title: title.to_string(),
        x_desc: TICK_COLUMN.to_string(),
        y_desc: POP_COUNT.to_string(),
        lines: present(series)
            .map(|(name, s)| Line {
                label: name.to_string(),
                points: s.points(POP_COUNT),
                bands: Vec::new(),
            })
            .collect(),
    }
}

fn share_chart(title: &str, series: &SeriesMap) -> LineChart {
    LineChart {
        title: title.to_string(),
        x_desc: TICK_COLUMN.to_string(),
        y_desc: SHARE_AVG.to_string(),
        lines: present(series)
            .map(|(name, s)| Line {
                label: format!("{name} avg"),
                points: s.points(SHARE_AVG),
                bands: [
                    band(s, SHARE_MIN, SHARE_MAX, 0.15),
                    band(s, SHARE_LOWER, SHARE_UPPER, 0.3),
                ]
                .into_iter()
                .flatten()
                .collect(),
            })
            .collect(),
    }
}

fn share_by_population_chart(title: &str, series: &SeriesMap) -> LineChart {
    LineChart {
        title: title.to_string(),
        x_desc: POP_COUNT.to_string(),
        y_desc: SHARE_AVG.to_string(),
        lines: present(series)
            .map(|(name, s)| Line {
                label: name.to_string(),
                points: s.mean_by(POP_COUNT, SHARE_AVG).unwrap_or_default(),
                bands: Vec::new(),
            })
            .collect(),
    }
}

fn success_chart(title: &str, rows: &[SuccessSummary]) -> BarChart {
    BarChart {
        title: title.to_string(),
        y_desc: "success_rate".to_string(),
        bars: rows
            .iter()
            .map(|row| (row.run_name.clone(), row.success_rate))
            .collect(),
    }
}

/// Band between two columns over the ticks where both are present.
#[allow(clippy::cast_precision_loss)]
fn band(series: &AggregatedSeries, lower: &str, upper: &str, opacity: f64) -> Option<Band> {
    let (lo, hi) = (series.column(lower)?, series.column(upper)?);
    let (lower, upper): (Vec<_>, Vec<_>) = series
        .ticks()
        .into_iter()
        .enumerate()
        .filter(|&(row, _)| lo.is_valid(row) && hi.is_valid(row))
        .map(|(row, tick)| ((tick as f64, lo.value(row)), (tick as f64, hi.value(row))))
        .unzip();
    (!lower.is_empty()).then_some(Band {
        lower,
        upper,
        opacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::run;
    use crate::analysis::{AggregateOptions, SHARE_SD};

    fn report() -> BatchReport {
        let share = [
            (POP_COUNT, 10.0),
            (SHARE_AVG, 0.5),
            (SHARE_SD, 0.1),
            (SHARE_MIN, 0.2),
            (SHARE_MAX, 0.9),
        ];
        let runs = vec![
            run("default", "1", 3, 2, &share),
            run("pg10", "1", 3, 2, &[(POP_COUNT, 20.0)]),
            run("pg11", "1", 3, 0, &[(POP_COUNT, 5.0)]),
        ];
        BatchReport::analyze(runs, &AggregateOptions::default()).unwrap()
    }

    #[test]
    fn test_parse_comparison() {
        let c: Comparison = "pop:pg-pop:pg10, default:Mean: Population".parse().unwrap();
        assert_eq!(c.kind(), ChartKind::Population);
        assert_eq!(c.stem(), "pg-pop");
        assert_eq!(c.title(), "Mean: Population");
        assert_eq!(
            c,
            Comparison::new(
                ChartKind::Population,
                "pg-pop",
                ["pg10", "default"],
                "Mean: Population"
            )
        );

        let all: Comparison = "success:s:*:All".parse().unwrap();
        assert_eq!(all, Comparison::all(ChartKind::SuccessRate, "s", "All"));
    }

    #[test]
    fn test_parse_comparison_errors() {
        assert!("pop:stem:a".parse::<Comparison>().is_err());
        assert!("bogus:stem:a:T".parse::<Comparison>().is_err());
        assert!("pop:../x:a:T".parse::<Comparison>().is_err());
        assert!("pop:x: , :T".parse::<Comparison>().is_err());
    }

    #[test]
    fn test_population_chart_skips_null_groups() {
        let chart = Comparison::all(ChartKind::Population, "p", "P").build(&report());
        let Chart::Lines(chart) = chart else {
            panic!("expected line chart")
        };
        let labels: Vec<&str> = chart.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["default", "pg10"]);
        assert_eq!(chart.lines[1].points, vec![(0.0, 20.0), (1.0, 20.0), (2.0, 20.0)]);
    }

    #[test]
    fn test_share_chart_has_bands() {
        let chart =
            Comparison::new(ChartKind::SharePercent, "s", ["default"], "S").build(&report());
        let Chart::Lines(chart) = chart else {
            panic!("expected line chart")
        };
        assert_eq!(chart.lines.len(), 1);
        let line = &chart.lines[0];
        assert_eq!(line.label, "default avg");
        assert_eq!(line.bands.len(), 2);
        assert_eq!(line.bands[0].lower[0], (0.0, 0.2));
        assert_eq!(line.bands[0].upper[0], (0.0, 0.9));
    }

    #[test]
    fn test_share_by_population() {
        let chart = Comparison::all(ChartKind::ShareByPopulation, "s", "S").build(&report());
        let Chart::Lines(chart) = chart else {
            panic!("expected line chart")
        };
        assert_eq!(chart.lines[0].points, vec![(10.0, 0.5)]);
        assert!(chart.lines[1].points.is_empty());
    }

    #[test]
    fn test_chart_without_finite_points_is_empty() {
        let line = |points| Line {
            label: "a".to_string(),
            points,
            bands: Vec::new(),
        };
        let chart = |points| {
            Chart::Lines(LineChart {
                title: String::new(),
                x_desc: String::new(),
                y_desc: String::new(),
                lines: vec![line(points)],
            })
        };
        assert!(chart(Vec::new()).is_empty());
        assert!(chart(vec![(0.0, f64::NAN)]).is_empty());
        assert!(!chart(vec![(0.0, f64::NAN), (1.0, 2.0)]).is_empty());
    }

    #[test]
    fn test_success_bars_sorted() {
        let chart = Comparison::new(ChartKind::SuccessRate, "s", ["pg11", "default"], "S")
            .build(&report());
        assert_eq!(
            chart,
            Chart::Bars(BarChart {
                title: "S".to_string(),
                y_desc: "success_rate".to_string(),
                bars: vec![("default".to_string(), 1.0), ("pg11".to_string(), 0.0)],
            })
        );
        assert!(!chart.is_empty());
    }
}
