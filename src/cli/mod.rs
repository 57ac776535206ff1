//! Command-line parsing for `corecpi`.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation code. Every tunable also reads a `CORECPI_*`
//! environment variable; `.env` is loaded before parsing, so the precedence is
//! flag > environment > `.env` > default.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use crate::domain::{DEFAULT_PRECISION, JoinPolicy, MethodSpec, TrimPreset, WeightUnit};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "corecpi", version, about = "Core inflation measures (CPI-trim, CPI-median, CPI-common)")]
pub struct Cli {
    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true, env = "CORECPI_LOG_LEVEL", default_value_t = Level::WARN)]
    pub log_level: Level,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute core measures from a CPI level table and export the dated CSV.
    Run(RunArgs),
    /// Same as `run`, on a seeded synthetic basket.
    Demo(DemoArgs),
    /// Write a seeded synthetic basket as a tidy CSV.
    Generate(GenerateArgs),
    /// Plot a previously exported core CSV.
    Plot(PlotArgs),
    /// Launch the interactive TUI.
    ///
    /// Runs the same pipeline as `run`/`demo` and renders the three measures
    /// with Ratatui. Without `--input` a synthetic basket is used.
    Tui(TuiArgs),
}

/// Estimator settings shared by every command that computes measures.
#[derive(Debug, Args, Clone)]
pub struct EstimatorArgs {
    /// Unit of the basket weights.
    #[arg(long, value_enum, env = "CORECPI_WEIGHT_UNIT", default_value_t = WeightUnit::Auto)]
    pub weight_unit: WeightUnit,

    /// Named trim window (`reference` = 25/75, `boc` = 20/80).
    #[arg(long, value_enum, env = "CORECPI_TRIM_PRESET", default_value_t = TrimPreset::Reference)]
    pub trim_preset: TrimPreset,

    /// Lower cumulative-weight cut (overrides the preset).
    #[arg(long, env = "CORECPI_TRIM_LOWER")]
    pub trim_lower: Option<f64>,

    /// Upper cumulative-weight cut (overrides the preset).
    #[arg(long, env = "CORECPI_TRIM_UPPER")]
    pub trim_upper: Option<f64>,

    /// Weighted order-statistic method.
    #[arg(long, value_enum, env = "CORECPI_METHOD", default_value_t = MethodSpec::Exact)]
    pub method: MethodSpec,

    /// Precision multiplier for `--method replicated`.
    #[arg(long, env = "CORECPI_PRECISION", default_value_t = DEFAULT_PRECISION)]
    pub precision: u32,

    /// How the three measures are joined on date.
    #[arg(long, value_enum, env = "CORECPI_JOIN", default_value_t = JoinPolicy::Inner)]
    pub join: JoinPolicy,

    /// Minimum share of dates a component needs to enter the factor step.
    #[arg(long, env = "CORECPI_MIN_COVERAGE", default_value_t = 0.0)]
    pub min_coverage: f64,
}

/// Terminal output and export options.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Directory for `core_inflation_<YYYYMMDD>.csv`.
    #[arg(long, env = "CORECPI_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Skip writing the dated CSV.
    #[arg(long)]
    pub no_export: bool,

    /// Also write a JSON run summary to this path.
    #[arg(long)]
    pub export_summary: Option<PathBuf>,

    /// Number of most recent rows printed.
    #[arg(long, default_value_t = 24)]
    pub rows: usize,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Synthetic basket settings.
#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of basket components.
    #[arg(long, default_value_t = 12)]
    pub components: usize,

    /// Number of months.
    #[arg(long, default_value_t = 72)]
    pub months: usize,

    /// First month (YYYY-MM or YYYY-MM-DD).
    #[arg(long, value_parser = parse_month, default_value = "2018-01")]
    pub start: NaiveDate,

    /// Annual trend inflation of the common factor (decimal).
    #[arg(long, default_value_t = 0.02)]
    pub trend: f64,

    /// Monthly idiosyncratic volatility (decimal).
    #[arg(long, default_value_t = 0.004)]
    pub idio_vol: f64,

    /// Probability of an upward price jump per component-month.
    #[arg(long, default_value_t = 0.02)]
    pub jump_prob_up: f64,

    /// Probability of a downward price jump per component-month.
    #[arg(long, default_value_t = 0.02)]
    pub jump_prob_down: f64,

    /// Jump size as a multiple of the idiosyncratic volatility.
    #[arg(long, default_value_t = 6.0)]
    pub jump_k: f64,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// CPI level table (`date,component,level[,weight]`). Prompts when omitted.
    #[arg(short = 'f', long, env = "CORECPI_INPUT")]
    pub input: Option<PathBuf>,

    /// Separate weight table (`date,component,weight`).
    #[arg(short = 'w', long, env = "CORECPI_WEIGHTS")]
    pub weights: Option<PathBuf>,

    #[command(flatten)]
    pub estimator: EstimatorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    #[command(flatten)]
    pub estimator: EstimatorArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// Output CSV path (stdout when omitted).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Options for plotting a saved core table.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Core CSV produced by `corecpi run`.
    #[arg(value_name = "CSV")]
    pub core: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    /// CPI level table; a synthetic basket is used when omitted.
    #[arg(short = 'f', long, env = "CORECPI_INPUT")]
    pub input: Option<PathBuf>,

    /// Separate weight table.
    #[arg(short = 'w', long, env = "CORECPI_WEIGHTS")]
    pub weights: Option<PathBuf>,

    #[command(flatten)]
    pub sample: SampleArgs,

    #[command(flatten)]
    pub estimator: EstimatorArgs,
}

fn parse_month(s: &str) -> Result<NaiveDate, String> {
    crate::io::ingest::parse_date(s)
}
