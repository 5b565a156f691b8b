use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use runstats::analysis::{AggregateOptions, SuccessTable};
use runstats::loader::LoadPolicy;
use runstats::render::{ChartRenderer, Comparison, SvgRenderer};
use runstats::{BatchReport, Pipeline};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregate and chart simulation runs", long_about = None)]
struct Args {
    /// Directory holding <name>-<id>-stats.csv and <name>-<id>-params.json pairs
    #[arg(required = true, value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Directory charts are written to
    #[arg(short, long, default_value = "graphs", value_hint = ValueHint::DirPath)]
    out: PathBuf,

    /// Loader threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// What to do with runs whose files fail to parse
    #[arg(long, value_enum, default_value_t = MalformedOpt::Abort)]
    on_malformed: MalformedOpt,

    /// Chart to draw, as KIND:STEM:NAMES:TITLE (repeatable; default: one of each kind)
    #[arg(long = "compare", value_name = "KIND:STEM:NAMES:TITLE")]
    compare: Vec<Comparison>,

    /// Print the success table only
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Keep fractional mean population counts
    #[arg(long, action = ArgAction::SetTrue)]
    no_round: bool,

    /// Debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MalformedOpt {
    Abort,
    Exclude,
}

impl From<MalformedOpt> for LoadPolicy {
    fn from(value: MalformedOpt) -> Self {
        match value {
            MalformedOpt::Abort => Self::Abort,
            MalformedOpt::Exclude => Self::Exclude,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("failed to install log subscriber: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let aggregate = if args.no_round {
        AggregateOptions::without_rounding()
    } else {
        AggregateOptions::default()
    };
    let report = Pipeline::builder()
        .data_dir(&args.data_dir)
        .load_policy(args.on_malformed.into())
        .threads(args.threads)
        .aggregate_options(aggregate)
        .build()
        .context("invalid data directory")?
        .run()
        .with_context(|| format!("failed to analyze {}", args.data_dir.display()))?;

    print!("{}", SuccessTable(report.summaries()));

    if args.no_plot {
        return Ok(());
    }
    let comparisons = if args.compare.is_empty() {
        Comparison::defaults()
    } else {
        args.compare.clone()
    };
    warn_unknown_names(&comparisons, &report);

    let mut renderer = SvgRenderer::new(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    renderer
        .render_all(&comparisons, &report)
        .context("failed to render charts")?;
    info!(
        charts = renderer.written().len(),
        out = %args.out.display(),
        "done"
    );
    Ok(())
}

fn warn_unknown_names(comparisons: &[Comparison], report: &BatchReport) {
    for comparison in comparisons {
        for name in comparison.names().unwrap_or_default() {
            if !report.aggregated().contains_key(name) {
                warn!(chart = comparison.stem(), name = %name, "no runs with this name");
            }
        }
    }
}
