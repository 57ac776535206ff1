//! Trim & Median Estimator.
//!
//! Per date, over the same MoM distribution:
//! - trimmed mean of the weight retained inside the `TrimWindow`
//! - weighted median (linear interpolation)
//!
//! Dates are independent, so they are evaluated with a rayon parallel iterator;
//! results land in ordered maps keyed by date, so scheduling never affects
//! output order.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{DistributionMethod, TrimWindow, WeightedDistribution};
use crate::error::{MeasureError, MeasureResult};
use crate::estimate::distribution::{as_pairs, replicate};
use crate::math::{quantile_sorted, trimmed_mean_sorted, weighted_quantile, weighted_trimmed_mean};

/// A date excluded from a measure, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: String,
}

/// Per-date trimmed mean and median (MoM decimal rates).
#[derive(Debug, Clone, Default)]
pub struct TrimMedianOutput {
    pub trim: BTreeMap<NaiveDate, f64>,
    pub median: BTreeMap<NaiveDate, f64>,
    pub skipped: Vec<SkippedDate>,
}

/// Trimmed mean and median for one period.
pub fn estimate_period(
    dist: &WeightedDistribution,
    window: TrimWindow,
    method: DistributionMethod,
) -> MeasureResult<(f64, f64)> {
    window.validate()?;
    let degenerate = |reason: &str| MeasureError::DegenerateDistribution {
        date: dist.date,
        reason: reason.to_string(),
    };

    if dist.is_empty() {
        return Err(degenerate("no component has both a change and a weight"));
    }

    let (trim, median) = match method {
        DistributionMethod::Exact => {
            let pairs = as_pairs(dist);
            (
                weighted_trimmed_mean(&pairs, window.lower, window.upper),
                weighted_quantile(&pairs, 0.5),
            )
        }
        DistributionMethod::Replicated { precision } => {
            let sample = replicate(dist, precision);
            if sample.is_empty() {
                return Err(degenerate("replicated sample is empty (precision too low for these weights)"));
            }
            (
                trimmed_mean_sorted(&sample, window.lower, window.upper),
                quantile_sorted(&sample, 0.5),
            )
        }
    };

    match (trim, median) {
        (Some(t), Some(m)) if t.is_finite() && m.is_finite() => Ok((t, m)),
        _ => Err(degenerate("order statistics are undefined for this distribution")),
    }
}

/// Run the estimator over every date.
pub fn estimate_trim_median(
    distributions: &BTreeMap<NaiveDate, WeightedDistribution>,
    window: TrimWindow,
    method: DistributionMethod,
) -> TrimMedianOutput {
    let results: Vec<(NaiveDate, MeasureResult<(f64, f64)>)> = distributions
        .par_iter()
        .map(|(&date, dist)| (date, estimate_period(dist, window, method)))
        .collect();

    let mut out = TrimMedianOutput::default();
    for (date, result) in results {
        match result {
            Ok((t, m)) => {
                out.trim.insert(date, t);
                out.median.insert(date, m);
            }
            Err(err) => {
                warn!(%date, %err, "date excluded from trim/median");
                out.skipped.push(SkippedDate {
                    date,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        dates = out.trim.len(),
        skipped = out.skipped.len(),
        lower = window.lower,
        upper = window.upper,
        "estimated trimmed mean and median"
    );
    out
}
