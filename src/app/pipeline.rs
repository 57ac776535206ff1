//! Shared estimation pipeline used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> changes -> distributions -> (trim/median || common factor) -> aggregate
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregate::aggregate;
use crate::data::generate_basket;
use crate::domain::{CoreSeries, EstimatorConfig, Horizon, InputSource, RawObservation, RunConfig, WeightObservation};
use crate::error::{AppError, MeasureError};
use crate::estimate::{CommonOutput, TrimMedianOutput, build_distributions, estimate_common, estimate_trim_median};
use crate::io::ingest::{RowError, load_levels, load_weights};
use crate::io::summary::{ComponentSummary, FactorSummary, RunSummary};
use crate::series::{ChangeTable, build_changes};

/// Observations ready for the estimators.
#[derive(Debug, Clone, Default)]
pub struct LoadedInput {
    pub levels: Vec<RawObservation>,
    pub weights: Option<Vec<WeightObservation>>,
    pub row_errors: Vec<RowError>,
}

impl LoadedInput {
    pub fn from_levels(levels: Vec<RawObservation>) -> Self {
        Self {
            levels,
            ..Self::default()
        }
    }
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: ChangeTable,
    /// Dates with a MoM distribution (including empty ones).
    pub distributions: usize,
    pub trim_median: TrimMedianOutput,
    /// The common measure fails on its own without taking trim/median with it.
    pub common: Result<CommonOutput, MeasureError>,
    pub core: CoreSeries,
    pub row_errors: Vec<RowError>,
}

/// Read (or synthesize) the observations named by `source`.
pub fn load_input(source: &InputSource) -> Result<LoadedInput, AppError> {
    match source {
        InputSource::Csv { levels, weights } => {
            let ingested = load_levels(levels)?;
            let mut row_errors = ingested.row_errors;
            let weights = match weights {
                Some(path) => {
                    let w = load_weights(path)?;
                    row_errors.extend(w.row_errors);
                    Some(w.rows)
                }
                None => None,
            };
            Ok(LoadedInput {
                levels: ingested.rows,
                weights,
                row_errors,
            })
        }
        InputSource::Synthetic(sample) => Ok(LoadedInput::from_levels(generate_basket(sample)?)),
    }
}

/// Execute the estimators on already-loaded observations.
pub fn run_pipeline(input: &LoadedInput, config: &EstimatorConfig) -> Result<RunOutput, AppError> {
    config.validate()?;

    let table = build_changes(&input.levels, input.weights.as_deref(), config.weight_unit)?;
    let distributions = build_distributions(&table.changes, Horizon::Mom);

    let (trim_median, common) = rayon::join(
        || estimate_trim_median(&distributions, config.trim, config.method),
        || estimate_common(&table.changes, config.min_component_coverage),
    );
    if let Err(err) = &common {
        warn!(%err, "common-factor measure unavailable");
    }

    let no_common = BTreeMap::new();
    let common_yoy = common.as_ref().map(|c| &c.values).unwrap_or(&no_common);
    let core = aggregate(&trim_median.trim, &trim_median.median, common_yoy, config.join);
    info!(rows = core.len(), join = ?config.join, "aggregated core measures");

    Ok(RunOutput {
        table,
        distributions: distributions.len(),
        trim_median,
        common,
        core,
        row_errors: input.row_errors.clone(),
    })
}

/// Load the configured input and run the pipeline.
pub fn run(config: &RunConfig) -> Result<RunOutput, AppError> {
    config.validate()?;
    let input = load_input(&config.input)?;
    run_pipeline(&input, &config.estimator)
}

impl RunOutput {
    /// Serializable summary of this run.
    pub fn summary(&self, config: &EstimatorConfig, generated: NaiveDate) -> RunSummary {
        let factor = match &self.common {
            Ok(common) => {
                let loading = |name: &str| {
                    common
                        .factor
                        .components
                        .iter()
                        .position(|c| c == name)
                        .map(|i| common.factor.loadings[i])
                };
                FactorSummary::Ok {
                    components_used: common.factor.components.len(),
                    dates_used: common.factor.dates.len(),
                    explained_variance: common.factor.explained_variance,
                    excluded: common.factor.excluded.clone(),
                    components: common
                        .fits
                        .iter()
                        .map(|f| ComponentSummary {
                            component: f.component.clone(),
                            loading: loading(&f.component),
                            slope: f.slope,
                            intercept: f.intercept,
                            r_squared: f.r_squared,
                        })
                        .collect(),
                }
            }
            Err(err) => FactorSummary::Failed {
                reason: err.to_string(),
            },
        };

        RunSummary {
            tool: "corecpi".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated,
            config: config.clone(),
            series: self.table.stats.clone(),
            distributions: self.distributions,
            skipped: self.trim_median.skipped.clone(),
            factor,
            measures: self.core.measures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JoinPolicy, SampleConfig};

    fn basket(components: usize, months: usize) -> Vec<RawObservation> {
        generate_basket(&SampleConfig {
            components,
            months,
            ..SampleConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn synthetic_basket_produces_all_three_measures() {
        let input = LoadedInput::from_levels(basket(6, 48));
        let out = run_pipeline(&input, &EstimatorConfig::default()).unwrap();

        assert!(out.common.is_ok());
        // 47 MoM months chain from the base month, so YoY starts 12 months in.
        assert!(out.core.len() >= 30);
        for row in &out.core.rows {
            assert!(row.trim.is_some() && row.median.is_some() && row.common.is_some());
            // A synthetic ~2% basket stays in a sane range.
            assert!(row.trim.unwrap().abs() < 20.0);
        }
    }

    #[test]
    fn missing_level_drops_date_from_common_only() {
        let mut levels = basket(4, 36);
        let gap_date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let hole = levels
            .iter_mut()
            .find(|o| o.date == gap_date && o.component == "food")
            .unwrap();
        hole.level = None;

        let config = EstimatorConfig {
            join: JoinPolicy::Outer,
            ..EstimatorConfig::default()
        };
        let out = run_pipeline(&LoadedInput::from_levels(levels), &config).unwrap();

        let common = out.common.as_ref().unwrap();
        assert!(!common.values.contains_key(&gap_date));
        assert!(out.trim_median.trim.contains_key(&gap_date));

        let row = out.core.rows.iter().find(|r| r.date == gap_date).unwrap();
        assert!(row.trim.is_some() && row.median.is_some());
        assert_eq!(row.common, None);
    }

    #[test]
    fn factor_failure_is_isolated() {
        // 14 months: only two YoY dates, so no factor can be extracted.
        let input = LoadedInput::from_levels(basket(3, 14));
        let inner = run_pipeline(&input, &EstimatorConfig::default()).unwrap();
        assert!(matches!(inner.common, Err(MeasureError::UndeterminedFactor { .. })));
        assert!(inner.core.is_empty());
        assert!(!inner.trim_median.trim.is_empty());

        let summary = inner.summary(&EstimatorConfig::default(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(matches!(summary.factor, FactorSummary::Failed { .. }));
    }

    #[test]
    fn invalid_config_is_a_usage_error() {
        let mut config = EstimatorConfig::default();
        config.trim.lower = 0.9;
        let err = run_pipeline(&LoadedInput::from_levels(basket(3, 14)), &config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
