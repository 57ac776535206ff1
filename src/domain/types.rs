//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during estimation
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, MeasureResult};

/// Default precision multiplier for the replicated distribution method.
pub const DEFAULT_PRECISION: u32 = 10_000;

/// Upper bound on the precision multiplier; each date allocates `O(M)` values.
pub const MAX_PRECISION: u32 = 10_000_000;

/// One input row: an index level and (optionally) a basket weight.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    /// First day of the observation month.
    pub date: NaiveDate,
    pub component: String,
    pub level: Option<f64>,
    pub weight: Option<f64>,
}

/// One row of a separate basket-weight table.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightObservation {
    pub date: NaiveDate,
    pub component: String,
    pub weight: f64,
}

/// Price changes derived for one (date, component).
///
/// `weight` is a basket share (already converted from percent if needed).
/// Changes are decimal rates (`0.01` = 1%).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentChange {
    pub date: NaiveDate,
    pub component: String,
    pub weight: Option<f64>,
    pub mom: Option<f64>,
    pub yoy: Option<f64>,
}

/// Change horizon used to build a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Mom,
    Yoy,
}

impl ComponentChange {
    pub fn change(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::Mom => self.mom,
            Horizon::Yoy => self.yoy,
        }
    }
}

/// A single (value, share) point in a period's distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    pub value: f64,
    pub weight: f64,
}

/// All weighted price changes for one date, sorted ascending by value.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedDistribution {
    pub date: NaiveDate,
    pub points: Vec<WeightedPoint>,
}

impl WeightedDistribution {
    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Which core measure a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    Trim,
    Median,
    Common,
}

impl MeasureKind {
    pub const ALL: [MeasureKind; 3] = [MeasureKind::Trim, MeasureKind::Median, MeasureKind::Common];

    /// Column name used in exports.
    pub fn display_name(self) -> &'static str {
        match self {
            MeasureKind::Trim => "CPI-trim",
            MeasureKind::Median => "CPI-median",
            MeasureKind::Common => "CPI-common",
        }
    }

    /// Single-character marker for terminal plots.
    pub fn marker(self) -> char {
        match self {
            MeasureKind::Trim => 't',
            MeasureKind::Median => 'm',
            MeasureKind::Common => 'c',
        }
    }
}

/// One estimated value for a (date, measure).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreMeasure {
    pub date: NaiveDate,
    pub kind: MeasureKind,
    pub value: f64,
}

/// OLS fit of one component's YoY change on the common-factor score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFit {
    pub component: String,
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
    pub fitted: BTreeMap<NaiveDate, f64>,
}

/// One output row. Values are YoY percentage points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreRow {
    pub date: NaiveDate,
    pub trim: Option<f64>,
    pub median: Option<f64>,
    pub common: Option<f64>,
}

impl CoreRow {
    pub fn get(&self, kind: MeasureKind) -> Option<f64> {
        match kind {
            MeasureKind::Trim => self.trim,
            MeasureKind::Median => self.median,
            MeasureKind::Common => self.common,
        }
    }
}

/// The final output table, dates strictly ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreSeries {
    pub rows: Vec<CoreRow>,
}

impl CoreSeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `(date, value)` pairs for one measure, skipping missing values.
    pub fn series(&self, kind: MeasureKind) -> Vec<(NaiveDate, f64)> {
        self.rows
            .iter()
            .filter_map(|r| r.get(kind).map(|v| (r.date, v)))
            .collect()
    }

    /// Long form: one `CoreMeasure` per defined (date, measure).
    pub fn measures(&self) -> Vec<CoreMeasure> {
        self.rows
            .iter()
            .flat_map(|r| {
                MeasureKind::ALL
                    .into_iter()
                    .filter_map(move |kind| r.get(kind).map(|value| CoreMeasure { date: r.date, kind, value }))
            })
            .collect()
    }
}

/// Input units for basket weights.
///
/// Statistical agencies publish basket weights either as shares (`0.125`) or as
/// percent of the basket (`12.5`). Estimators work with shares internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    /// Infer from the data.
    ///
    /// Heuristic (deterministic): if the median per-date weight total exceeds
    /// `1.5`, the file uses percent and weights are divided by 100.
    Auto,
    /// Weights are already shares.
    Share,
    /// Weights are percent of the basket.
    Percent,
}

/// Named trim windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrimPreset {
    /// Keep the central 50%: cut points at the 25th and 75th weighted percentile.
    Reference,
    /// Bank of Canada CPI-trim: drop 20% of the weight in each tail.
    Boc,
}

impl TrimPreset {
    pub fn window(self) -> TrimWindow {
        match self {
            TrimPreset::Reference => TrimWindow { lower: 0.25, upper: 0.75 },
            TrimPreset::Boc => TrimWindow { lower: 0.20, upper: 0.80 },
        }
    }
}

/// Retained cumulative-weight window `[lower, upper]` for the trimmed mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub lower: f64,
    pub upper: f64,
}

impl TrimWindow {
    pub fn new(lower: f64, upper: f64) -> MeasureResult<Self> {
        let window = Self { lower, upper };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> MeasureResult<()> {
        let ok = self.lower.is_finite()
            && self.upper.is_finite()
            && self.lower >= 0.0
            && self.upper <= 1.0
            && self.lower < self.upper;
        if ok {
            Ok(())
        } else {
            Err(MeasureError::InvalidConfig(format!(
                "trim window must satisfy 0 <= lower < upper <= 1 (got {:.4}..{:.4})",
                self.lower, self.upper
            )))
        }
    }

    /// Share of each period's weight that survives trimming.
    pub fn retained_span(&self) -> f64 {
        self.upper - self.lower
    }
}

impl Default for TrimWindow {
    fn default() -> Self {
        TrimPreset::Reference.window()
    }
}

/// How weighted order statistics are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DistributionMethod {
    /// Sort by value, accumulate weight shares, interpolate.
    #[default]
    Exact,
    /// Replicate each value `round(share * precision)` times and treat the
    /// result as an unweighted sample.
    Replicated { precision: u32 },
}

/// CLI-facing selector for `DistributionMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MethodSpec {
    Exact,
    Replicated,
}

/// How the three measures are merged on date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// A date is kept only when all three measures exist for it.
    #[default]
    Inner,
    /// Union of dates; missing measures are left empty.
    Outer,
}

/// Estimator settings shared by every front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub trim: TrimWindow,
    pub method: DistributionMethod,
    pub join: JoinPolicy,
    pub weight_unit: WeightUnit,
    /// Components whose YoY coverage falls below this share of dates are left
    /// out of the principal-component step.
    pub min_component_coverage: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            trim: TrimWindow::default(),
            method: DistributionMethod::default(),
            join: JoinPolicy::Inner,
            weight_unit: WeightUnit::Auto,
            min_component_coverage: 0.0,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> MeasureResult<()> {
        self.trim.validate()?;
        if let DistributionMethod::Replicated { precision } = self.method {
            if precision == 0 || precision > MAX_PRECISION {
                return Err(MeasureError::InvalidConfig(format!(
                    "precision multiplier must be in 1..={MAX_PRECISION} (got {precision})"
                )));
            }
        }
        if !(self.min_component_coverage.is_finite() && (0.0..=1.0).contains(&self.min_component_coverage)) {
            return Err(MeasureError::InvalidConfig(format!(
                "min component coverage must be within [0, 1] (got {})",
                self.min_component_coverage
            )));
        }
        Ok(())
    }
}

/// Where the input comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Csv {
        levels: PathBuf,
        weights: Option<PathBuf>,
    },
    Synthetic(SampleConfig),
}

/// Settings for the synthetic basket generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    pub seed: u64,
    pub components: usize,
    pub months: usize,
    pub start: NaiveDate,
    /// Annualized trend inflation of the common factor (decimal).
    pub trend_inflation: f64,
    /// AR(1) persistence of the monthly common factor.
    pub factor_persistence: f64,
    /// Monthly std dev of the common-factor shock (decimal).
    pub factor_vol: f64,
    /// Monthly std dev of idiosyncratic component noise (decimal).
    pub idio_vol: f64,
    pub jump_prob_up: f64,
    pub jump_prob_down: f64,
    /// Jump size as a multiple of `idio_vol`.
    pub jump_k: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            components: 12,
            months: 72,
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            trend_inflation: 0.02,
            factor_persistence: 0.6,
            factor_vol: 0.001,
            idio_vol: 0.004,
            jump_prob_up: 0.02,
            jump_prob_down: 0.02,
            jump_k: 6.0,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, environment, and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: InputSource,
    pub estimator: EstimatorConfig,

    pub output_dir: PathBuf,
    pub export: bool,
    pub export_summary: Option<PathBuf>,

    pub rows_shown: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

impl RunConfig {
    pub fn validate(&self) -> MeasureResult<()> {
        self.estimator.validate()?;
        if let InputSource::Synthetic(sample) = &self.input {
            sample.validate()?;
        }
        Ok(())
    }
}

impl SampleConfig {
    pub fn validate(&self) -> MeasureResult<()> {
        if self.components < 2 {
            return Err(MeasureError::InvalidConfig("synthetic basket needs >= 2 components".into()));
        }
        if self.months < 2 {
            return Err(MeasureError::InvalidConfig("synthetic basket needs >= 2 months".into()));
        }
        if self.jump_prob_up < 0.0 || self.jump_prob_down < 0.0 || self.jump_prob_up + self.jump_prob_down >= 1.0 {
            return Err(MeasureError::InvalidConfig("invalid jump probability settings".into()));
        }
        let finite_non_negative = [self.factor_vol, self.idio_vol, self.jump_k]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !finite_non_negative || !self.trend_inflation.is_finite() {
            return Err(MeasureError::InvalidConfig("invalid volatility settings".into()));
        }
        if !(self.factor_persistence.is_finite() && self.factor_persistence.abs() < 1.0) {
            return Err(MeasureError::InvalidConfig("factor persistence must be in (-1, 1)".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_have_expected_spans() {
        assert!((TrimPreset::Reference.window().retained_span() - 0.5).abs() < 1e-12);
        assert!((TrimPreset::Boc.window().retained_span() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn trim_window_rejects_inverted_bounds() {
        assert!(TrimWindow::new(0.8, 0.2).is_err());
        assert!(TrimWindow::new(-0.1, 0.5).is_err());
        assert!(TrimWindow::new(0.0, 1.0).is_ok());
    }

    #[test]
    fn estimator_config_rejects_zero_precision() {
        let cfg = EstimatorConfig {
            method: DistributionMethod::Replicated { precision: 0 },
            ..EstimatorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn exact_method_is_the_default() {
        assert_eq!(DistributionMethod::default(), DistributionMethod::Exact);
        assert_eq!(EstimatorConfig::default().method, DistributionMethod::Exact);
    }

    #[test]
    fn long_form_skips_missing_values() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let series = CoreSeries {
            rows: vec![CoreRow {
                date,
                trim: Some(2.5),
                median: None,
                common: Some(2.1),
            }],
        };
        let measures = series.measures();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0], CoreMeasure { date, kind: MeasureKind::Trim, value: 2.5 });
        assert_eq!(measures[1].kind, MeasureKind::Common);
    }
}
