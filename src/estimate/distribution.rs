//! Weighted Distribution Sampler.
//!
//! Groups a horizon's `(change, share)` pairs by date. Components with a missing
//! change or a missing weight are excluded for that date; zero-weight components
//! carry no mass and are dropped too. A date whose rows all fail these checks
//! still gets an (empty) distribution so the estimators can report it.
//!
//! `replicate` implements the multiset convention: every point is repeated
//! `round(share * precision)` times. The precision multiplier trades memory for
//! quantile resolution; `Exact` estimation makes it unnecessary and is the
//! default.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{ComponentChange, Horizon, WeightedDistribution, WeightedPoint};

/// Build one distribution per date that has at least one row at `horizon`.
///
/// Points are sorted ascending by value; ties keep component order.
pub fn build_distributions(
    changes: &[ComponentChange],
    horizon: Horizon,
) -> BTreeMap<NaiveDate, WeightedDistribution> {
    let mut out: BTreeMap<NaiveDate, WeightedDistribution> = BTreeMap::new();

    for change in changes {
        let Some(value) = change.change(horizon) else {
            continue;
        };
        let dist = out.entry(change.date).or_insert_with(|| WeightedDistribution {
            date: change.date,
            points: Vec::new(),
        });
        if let Some(weight) = change.weight.filter(|w| w.is_finite() && *w > 0.0) {
            dist.points.push(WeightedPoint { value, weight });
        }
    }

    for dist in out.values_mut() {
        dist.points
            .sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal));
    }

    out
}

/// Expand a distribution into its weight-replicated sample.
///
/// The result has length `Σ round(share_i * precision)` and is sorted, because
/// the points are.
pub fn replicate(dist: &WeightedDistribution, precision: u32) -> Vec<f64> {
    let m = f64::from(precision);
    let counts: Vec<usize> = dist
        .points
        .iter()
        .map(|p| (p.weight * m).round().max(0.0) as usize)
        .collect();

    let mut out = Vec::with_capacity(counts.iter().sum());
    for (p, &n) in dist.points.iter().zip(&counts) {
        out.extend(std::iter::repeat_n(p.value, n));
    }
    debug_assert!(out.windows(2).all(|w| w[0] <= w[1]));
    out
}

/// `(value, weight)` pairs for the exact routines in `math::quantile`.
pub fn as_pairs(dist: &WeightedDistribution) -> Vec<(f64, f64)> {
    dist.points.iter().map(|p| (p.value, p.weight)).collect()
}
