//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the estimation code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::RunOutput;
use crate::domain::{CoreSeries, DistributionMethod, EstimatorConfig, MeasureKind};

/// How many skipped dates / row errors are listed before eliding.
const MAX_LISTED: usize = 5;

/// Loadings shown in the factor summary.
const TOP_LOADINGS: usize = 5;

/// Format the run summary (dataset stats + stage diagnostics + factor summary).
pub fn format_run_summary(output: &RunOutput, config: &EstimatorConfig) -> String {
    let mut out = String::new();
    let stats = &output.table.stats;

    out.push_str("=== corecpi - core inflation ===\n");
    out.push_str(&format!(
        "Trim: {:.1}%..{:.1}% (retained {:.1}%) | method: {} | join: {:?}\n",
        config.trim.lower * 100.0,
        config.trim.upper * 100.0,
        config.trim.retained_span() * 100.0,
        method_label(config.method),
        config.join,
    ));
    out.push_str(&format!(
        "Input: rows={} | dates={} | components={} | weight scale={}\n",
        stats.rows_read, stats.dates, stats.components, stats.weight_scale,
    ));
    if let Some(note) = &stats.weight_note {
        out.push_str(&format!("  note: {note}\n"));
    }
    out.push_str(&format!(
        "Changes: MoM={} YoY={} | excluded: missing level={} missing lag={} non-finite={} missing weight={}\n",
        stats.mom_defined, stats.yoy_defined, stats.missing_level, stats.missing_lag, stats.non_finite, stats.missing_weight,
    ));
    if stats.duplicate_rows > 0 {
        out.push_str(&format!("  duplicate rows dropped: {}\n", stats.duplicate_rows));
    }

    if !output.row_errors.is_empty() {
        out.push_str(&format!("Ingest: {} row(s) skipped\n", output.row_errors.len()));
        for err in output.row_errors.iter().take(MAX_LISTED) {
            let component = err.component.as_deref().unwrap_or("-");
            out.push_str(&format!("  line {:>5} [{component}] {}\n", err.line, err.message));
        }
        push_elided(&mut out, output.row_errors.len());
    }

    let tm = &output.trim_median;
    out.push_str(&format!(
        "\nTrim/median: {} of {} dates estimated\n",
        tm.trim.len(),
        output.distributions
    ));
    for skipped in tm.skipped.iter().take(MAX_LISTED) {
        out.push_str(&format!("  skipped {} {}\n", skipped.date, skipped.reason));
    }
    push_elided(&mut out, tm.skipped.len());

    match &output.common {
        Ok(common) => {
            let f = &common.factor;
            out.push_str(&format!(
                "Common factor: {} components over {} dates | explained variance {:.1}% | {} fits\n",
                f.components.len(),
                f.dates.len(),
                f.explained_variance * 100.0,
                common.fits.len(),
            ));

            let mut loadings: Vec<(&String, f64)> = f.components.iter().zip(f.loadings.iter().copied()).collect();
            loadings.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
            for (component, loading) in loadings.iter().take(TOP_LOADINGS) {
                out.push_str(&format!("  {component:<24} {loading:>+.3}\n"));
            }
            for (component, reason) in &f.excluded {
                out.push_str(&format!("  (excluded {component}) {reason}\n"));
            }
        }
        Err(err) => out.push_str(&format!("Common factor: unavailable ({err})\n")),
    }

    out
}

/// Format the last `n` rows of the core table.
pub fn format_core_table(series: &CoreSeries, n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<10}", "date"));
    for kind in MeasureKind::ALL {
        out.push_str(&format!(" {:>11}", kind.display_name()));
    }
    out.push('\n');

    let skip = series.len().saturating_sub(n);
    for row in series.rows.iter().skip(skip) {
        out.push_str(&format!("{:<10}", row.date.format("%Y-%m")));
        for kind in MeasureKind::ALL {
            match row.get(kind) {
                Some(v) => out.push_str(&format!(" {v:>11.2}")),
                None => out.push_str(&format!(" {:>11}", "-")),
            }
        }
        out.push('\n');
    }
    if skip > 0 {
        out.push_str(&format!("({skip} earlier rows not shown)\n"));
    }

    out
}

fn method_label(method: DistributionMethod) -> String {
    match method {
        DistributionMethod::Exact => "exact".to_string(),
        DistributionMethod::Replicated { precision } => format!("replicated (M={precision})"),
    }
}

fn push_elided(out: &mut String, total: usize) {
    if total > MAX_LISTED {
        out.push_str(&format!("  ... {} more\n", total - MAX_LISTED));
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::app::pipeline::{LoadedInput, run_pipeline};
    use crate::data::generate_basket;
    use crate::domain::{CoreRow, SampleConfig};

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn table_shows_tail_and_placeholders() {
        let rows = (1..=6)
            .map(|m| CoreRow {
                date: ym(2023, m),
                trim: Some(2.0 + m as f64 / 10.0),
                median: Some(1.9),
                common: (m % 2 == 0).then_some(2.2),
            })
            .collect();
        let table = format_core_table(&CoreSeries { rows }, 3);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].contains("CPI-trim") && lines[0].contains("CPI-common"));
        assert!(lines[1].starts_with("2023-04"));
        assert!(lines[2].starts_with("2023-05") && lines[2].trim_end().ends_with('-'));
        assert!(lines[3].contains("2.60"));
        assert_eq!(lines[4], "(3 earlier rows not shown)");
    }

    #[test]
    fn summary_reports_factor_status() {
        let short = LoadedInput::from_levels(
            generate_basket(&SampleConfig {
                components: 3,
                months: 14,
                ..SampleConfig::default()
            })
            .unwrap(),
        );
        let config = EstimatorConfig::default();
        let out = run_pipeline(&short, &config).unwrap();
        let text = format_run_summary(&out, &config);
        assert!(text.contains("Trim: 25.0%..75.0% (retained 50.0%) | method: exact | join: Inner"));
        assert!(text.contains("Common factor: unavailable"));

        let long = LoadedInput::from_levels(generate_basket(&SampleConfig::default()).unwrap());
        let out = run_pipeline(&long, &config).unwrap();
        assert!(format_run_summary(&out, &config).contains("explained variance"));
    }
}
