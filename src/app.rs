//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the tracing subscriber
//! - runs the estimation pipeline on CSV or synthetic input
//! - prints reports/plots
//! - writes exports

use std::fs::File;
use std::io;

use clap::Parser;
use tracing::info;

use crate::cli::{Command, DemoArgs, EstimatorArgs, GenerateArgs, OutputArgs, PlotArgs, RunArgs, SampleArgs};
use crate::domain::{DistributionMethod, EstimatorConfig, InputSource, MethodSpec, RunConfig, SampleConfig, TrimWindow};
use crate::error::AppError;
use crate::io::clock::{Clock, SystemClock};

pub mod pipeline;

/// Entry point for the `corecpi` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `corecpi` alone runs the demo and `corecpi -f x.csv` means `corecpi run -f x.csv`.
    // Clap requires a subcommand name, so argv is rewritten before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    // The TUI owns the terminal; log lines would corrupt the screen.
    if !matches!(cli.command, Command::Tui(_)) {
        crate::telemetry::init_tracing(cli.log_json, cli.log_level);
    }

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Demo(args) => handle_demo(args),
        Command::Generate(args) => handle_generate(args),
        Command::Plot(args) => handle_plot(args),
        Command::Tui(args) => crate::tui::run(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let levels = match &args.input {
        Some(path) => crate::cli::picker::validate_csv_path(path)?,
        None => crate::cli::picker::prompt_for_csv_path()?,
    };
    let weights = args
        .weights
        .as_deref()
        .map(crate::cli::picker::validate_csv_path)
        .transpose()?;

    let config = run_config(
        InputSource::Csv { levels, weights },
        estimator_config_from_args(&args.estimator)?,
        &args.output,
    );
    execute(&config, &SystemClock)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = run_config(
        InputSource::Synthetic(sample_config_from_args(&args.sample)),
        estimator_config_from_args(&args.estimator)?,
        &args.output,
    );
    execute(&config, &SystemClock)
}

/// Run the pipeline for `config`, print the report, and write exports.
pub fn execute(config: &RunConfig, clock: &dyn Clock) -> Result<(), AppError> {
    let output = pipeline::run(config)?;

    println!("{}", crate::report::format_run_summary(&output, &config.estimator));

    if let Some(path) = &config.export_summary {
        crate::io::summary::write_summary_json(path, &output.summary(&config.estimator, clock.today()))?;
        info!(path = %path.display(), "wrote run summary");
    }

    if output.core.is_empty() {
        let hint = match &output.common {
            Err(err) => format!(" The common-factor measure is unavailable ({err}); try `--join outer`."),
            Ok(_) => String::new(),
        };
        return Err(AppError::new(
            3,
            format!("No date has all requested measures; nothing to export.{hint}"),
        ));
    }

    println!("{}", crate::report::format_core_table(&output.core, config.rows_shown));

    if config.plot {
        println!(
            "{}",
            crate::plot::render_ascii_plot(&output.core, config.plot_width, config.plot_height)
        );
    }

    if config.export {
        let path = crate::io::export::export_core_csv(&config.output_dir, &output.core, clock)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<(), AppError> {
    let basket = crate::data::generate_basket(&sample_config_from_args(&args.sample))?;
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
            crate::io::export::write_levels_csv(file, &basket)?;
            println!("Wrote {} rows to {}", basket.len(), path.display());
        }
        None => crate::io::export::write_levels_csv(io::stdout().lock(), &basket)?,
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let series = crate::io::export::read_core_csv(&args.core)?;
    if series.is_empty() {
        return Err(AppError::new(3, format!("'{}' has no rows to plot.", args.core.display())));
    }
    println!("{}", crate::plot::render_ascii_plot(&series, args.width, args.height));
    Ok(())
}

/// Map estimator flags onto a validated `EstimatorConfig`.
pub fn estimator_config_from_args(args: &EstimatorArgs) -> Result<EstimatorConfig, AppError> {
    let preset = args.trim_preset.window();
    let trim = TrimWindow::new(
        args.trim_lower.unwrap_or(preset.lower),
        args.trim_upper.unwrap_or(preset.upper),
    )?;
    let method = match args.method {
        MethodSpec::Exact => DistributionMethod::Exact,
        MethodSpec::Replicated => DistributionMethod::Replicated {
            precision: args.precision,
        },
    };

    let config = EstimatorConfig {
        trim,
        method,
        join: args.join,
        weight_unit: args.weight_unit,
        min_component_coverage: args.min_coverage,
    };
    config.validate()?;
    Ok(config)
}

pub fn sample_config_from_args(args: &SampleArgs) -> SampleConfig {
    SampleConfig {
        seed: args.seed,
        components: args.components,
        months: args.months,
        start: args.start,
        trend_inflation: args.trend,
        idio_vol: args.idio_vol,
        jump_prob_up: args.jump_prob_up,
        jump_prob_down: args.jump_prob_down,
        jump_k: args.jump_k,
        ..SampleConfig::default()
    }
}

fn run_config(input: InputSource, estimator: EstimatorConfig, output: &OutputArgs) -> RunConfig {
    RunConfig {
        input,
        estimator,
        output_dir: output.output_dir.clone(),
        export: !output.no_export,
        export_summary: output.export_summary.clone(),
        rows_shown: output.rows,
        plot: output.plot && !output.no_plot,
        plot_width: output.width,
        plot_height: output.height,
    }
}

/// Rewrite argv so `corecpi` defaults to `demo` and bare flags mean `run`.
///
/// Rules:
/// - `corecpi`                      -> `corecpi demo`
/// - `corecpi -f x.csv ...`         -> `corecpi run -f x.csv ...`
/// - `corecpi --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("demo".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::{JoinPolicy, TrimPreset};
    use crate::io::clock::FixedClock;
    use chrono::NaiveDate;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rewrite_defaults() {
        assert_eq!(rewrite_args(argv(&["corecpi"])), argv(&["corecpi", "demo"]));
        assert_eq!(
            rewrite_args(argv(&["corecpi", "-f", "x.csv"])),
            argv(&["corecpi", "run", "-f", "x.csv"])
        );
        assert_eq!(rewrite_args(argv(&["corecpi", "--help"])), argv(&["corecpi", "--help"]));
        assert_eq!(rewrite_args(argv(&["corecpi", "plot", "a.csv"])), argv(&["corecpi", "plot", "a.csv"]));
    }

    fn parsed_demo(extra: &[&str]) -> DemoArgs {
        let mut args = argv(&["corecpi", "demo"]);
        args.extend(argv(extra));
        match Cli::try_parse_from(args).unwrap().command {
            Command::Demo(d) => d,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn explicit_cuts_override_preset() {
        let demo = parsed_demo(&["--trim-preset", "boc", "--trim-upper", "0.9"]);
        assert_eq!(demo.estimator.trim_preset, TrimPreset::Boc);
        let cfg = estimator_config_from_args(&demo.estimator).unwrap();
        assert_eq!(cfg.trim, TrimWindow { lower: 0.20, upper: 0.9 });
    }

    #[test]
    fn invalid_window_exits_with_usage_code() {
        let demo = parsed_demo(&["--trim-lower", "0.8", "--trim-upper", "0.2"]);
        assert_eq!(estimator_config_from_args(&demo.estimator).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn demo_exports_dated_csv() {
        let dir = std::env::temp_dir().join(format!("corecpi-app-demo-{}", std::process::id()));
        let demo = parsed_demo(&["--no-plot", "--months", "40", "--components", "6"]);
        let mut config = run_config(
            InputSource::Synthetic(sample_config_from_args(&demo.sample)),
            estimator_config_from_args(&demo.estimator).unwrap(),
            &demo.output,
        );
        config.output_dir = dir.clone();
        config.export_summary = Some(dir.join("summary.json"));
        assert_eq!(config.estimator.join, JoinPolicy::Inner);

        std::fs::create_dir_all(&dir).unwrap();
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        execute(&config, &clock).unwrap();

        let exported = crate::io::export::read_core_csv(&dir.join("core_inflation_20240531.csv")).unwrap();
        assert!(!exported.is_empty());
        assert!(dir.join("summary.json").is_file());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn short_history_fails_with_data_code() {
        let demo = parsed_demo(&["--no-plot", "--no-export", "--months", "14", "--components", "3"]);
        let config = run_config(
            InputSource::Synthetic(sample_config_from_args(&demo.sample)),
            estimator_config_from_args(&demo.estimator).unwrap(),
            &demo.output,
        );
        let err = execute(&config, &FixedClock(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("--join outer"));
    }
}
