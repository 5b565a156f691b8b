//! SVG chart backend (plotters)

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{info, warn};

use super::{BarChart, Chart, ChartRenderer, LineChart};
use crate::{Error, Result};

const ORANGE: RGBColor = RGBColor(255, 165, 0);

/// Writes each chart to `<out_dir>/<stem>.svg`.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    out_dir: PathBuf,
    size: (u32, u32),
    written: Vec<PathBuf>,
}

impl SvgRenderer {
    /// Renderer writing into `out_dir`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)?;
        Ok(Self {
            out_dir,
            size: (1024, 768),
            written: Vec::new(),
        })
    }

    /// Set the image size in pixels
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Files written so far, in render order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ChartRenderer for SvgRenderer {
    fn render(&mut self, stem: &str, chart: &Chart) -> Result<()> {
        if chart.is_empty() {
            warn!(chart = stem, "nothing to plot, skipping");
            return Ok(());
        }
        let path = self.out_dir.join(format!("{stem}.svg"));
        let drawn = match chart {
            Chart::Lines(lines) => draw_lines(&path, self.size, lines)?,
            Chart::Bars(bars) => draw_bars(&path, self.size, bars)?,
        };
        if !drawn {
            warn!(chart = stem, "no finite points to plot, skipping");
            return Ok(());
        }
        info!(path = %path.display(), "chart written");
        self.written.push(path);
        Ok(())
    }
}

fn render_err(e: impl std::fmt::Display) -> Error {
    Error::Render(e.to_string())
}

/// Returns `false` without touching `path` if no point is finite.
fn draw_lines(path: &Path, size: (u32, u32), chart: &LineChart) -> Result<bool> {
    let points = chart.lines.iter().flat_map(|line| {
        line.points.iter().chain(
            line.bands
                .iter()
                .flat_map(|band| band.lower.iter().chain(&band.upper)),
        )
    });
    let Some((x_range, y_range)) = bounds(points) else {
        return Ok(false);
    };

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let mut plot = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_err)?;
    plot.configure_mesh()
        .x_desc(chart.x_desc.as_str())
        .y_desc(chart.y_desc.as_str())
        .draw()
        .map_err(render_err)?;

    for (idx, line) in chart.lines.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        for band in &line.bands {
            let outline: Vec<(f64, f64)> = band
                .upper
                .iter()
                .copied()
                .chain(band.lower.iter().rev().copied())
                .collect();
            plot.draw_series(std::iter::once(Polygon::new(
                outline,
                color.mix(band.opacity).filled(),
            )))
            .map_err(render_err)?;
        }
        plot.draw_series(LineSeries::new(
            line.points.iter().copied(),
            color.stroke_width(2),
        ))
        .map_err(render_err)?
        .label(line.label.as_str())
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    plot.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;
    present(&root)?;
    Ok(true)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn draw_bars(path: &Path, size: (u32, u32), chart: &BarChart) -> Result<bool> {
    if !chart.bars.iter().any(|(_, v)| v.is_finite()) {
        return Ok(false);
    }
    let n = chart.bars.len();
    let labels: Vec<&str> = chart.bars.iter().map(|(label, _)| label.as_str()).collect();
    let top = chart
        .bars
        .iter()
        .map(|&(_, v)| v)
        .filter(|v| v.is_finite())
        .fold(1.0_f64, f64::max)
        * 1.05;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let mut plot = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5_f64..(n as f64 - 0.5), 0.0_f64..top)
        .map_err(render_err)?;
    plot.configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| {
            let slot = x.round();
            if (x - slot).abs() > 1e-6 || slot < 0.0 {
                return String::new();
            }
            labels
                .get(slot as usize)
                .map(ToString::to_string)
                .unwrap_or_default()
        })
        .y_desc(chart.y_desc.as_str())
        .draw()
        .map_err(render_err)?;

    plot.draw_series(chart.bars.iter().enumerate().map(|(i, &(_, value))| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, value)], ORANGE.filled())
    }))
    .map_err(render_err)?;
    present(&root)?;
    Ok(true)
}

fn present(root: &DrawingArea<SVGBackend<'_>, Shift>) -> Result<()> {
    root.present().map_err(render_err)
}

/// Padded x and y ranges covering every point, `None` if there are none.
fn bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Option<(Range<f64>, Range<f64>)> {
    let mut iter = points.filter(|(x, y)| x.is_finite() && y.is_finite());
    let &(x0, y0) = iter.next()?;
    let (mut x_min, mut x_max, mut y_min, mut y_max) = (x0, x0, y0, y0);
    for &(x, y) in iter {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    Some((pad(x_min, x_max), pad(y_min, y_max)))
}

fn pad(lo: f64, hi: f64) -> Range<f64> {
    let margin = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - margin)..(hi + margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Band, Line};

    #[test]
    fn test_bounds_padding() {
        let pts = [(0.0, 1.0), (10.0, 3.0), (f64::NAN, 100.0)];
        let (x, y) = bounds(pts.iter()).unwrap();
        assert!((x.start + 0.5).abs() < 1e-9 && (x.end - 10.5).abs() < 1e-9);
        assert!((y.start - 0.9).abs() < 1e-9 && (y.end - 3.1).abs() < 1e-9);
        assert!(bounds(std::iter::empty()).is_none());
        assert_eq!(pad(2.0, 2.0), 1.0..3.0);
    }

    #[test]
    fn test_writes_svg_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut renderer = SvgRenderer::new(tmp.path().join("graphs"))
            .unwrap()
            .with_size(320, 240);

        let lines = Chart::Lines(LineChart {
            title: "Mean Share".to_string(),
            x_desc: "tick".to_string(),
            y_desc: "share".to_string(),
            lines: vec![Line {
                label: "default".to_string(),
                points: vec![(0.0, 0.5), (1.0, 0.6)],
                bands: vec![Band {
                    lower: vec![(0.0, 0.4), (1.0, 0.5)],
                    upper: vec![(0.0, 0.6), (1.0, 0.7)],
                    opacity: 0.3,
                }],
            }],
        });
        let bars = Chart::Bars(BarChart {
            title: "Success".to_string(),
            y_desc: "success_rate".to_string(),
            bars: vec![("a".to_string(), 0.5), ("b".to_string(), 1.0)],
        });
        renderer.render("share", &lines).unwrap();
        renderer.render("successes", &bars).unwrap();

        assert_eq!(renderer.written().len(), 2);
        for path in renderer.written() {
            let svg = fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"));
        }
    }

    #[test]
    fn test_non_finite_chart_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let mut renderer = SvgRenderer::new(tmp.path()).unwrap();
        let chart = LineChart {
            title: "nan".to_string(),
            x_desc: "tick".to_string(),
            y_desc: "share".to_string(),
            lines: vec![Line {
                label: "default".to_string(),
                points: vec![(0.0, f64::NAN)],
                bands: Vec::new(),
            }],
        };
        assert!(!draw_lines(&tmp.path().join("direct.svg"), (320, 240), &chart).unwrap());

        renderer.render("nanchart", &Chart::Lines(chart)).unwrap();
        assert!(renderer.written().is_empty());
        assert!(!tmp.path().join("nanchart.svg").exists());
        assert!(!tmp.path().join("direct.svg").exists());
    }

    #[test]
    fn test_empty_chart_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut renderer = SvgRenderer::new(tmp.path()).unwrap();
        let empty = Chart::Bars(BarChart {
            title: "none".to_string(),
            y_desc: String::new(),
            bars: Vec::new(),
        });
        renderer.render("none", &empty).unwrap();
        assert!(renderer.written().is_empty());
        assert!(!tmp.path().join("none.svg").exists());
    }
}
