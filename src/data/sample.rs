//! Synthetic CPI basket generation.
//!
//! The basket is built from a single AR(1) "common inflation" factor around a
//! trend, per-component loadings on that factor, Gaussian idiosyncratic noise,
//! and occasional one-month price jumps in either direction. Shares are drawn
//! once from a Gamma distribution and normalized, so the basket mimics a fixed
//! expenditure-weight vintage.
//!
//! Everything is driven by a seeded `StdRng`: the same `SampleConfig` always
//! yields the same basket.

use chrono::{Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Gamma, Normal};
use tracing::info;

use crate::domain::{RawObservation, SampleConfig};
use crate::error::{MeasureError, MeasureResult};
use crate::series::month_start;

const BASE_LEVEL: f64 = 100.0;

/// Floor on a single month's change so levels stay positive.
const MIN_MONTHLY_CHANGE: f64 = -0.5;

const COMPONENT_NAMES: [&str; 12] = [
    "food",
    "shelter",
    "household_operations",
    "clothing",
    "transportation",
    "energy",
    "health_care",
    "recreation",
    "education",
    "communication",
    "alcohol_tobacco",
    "other_goods_services",
];

/// Display name of the `idx`-th synthetic component.
pub fn component_name(idx: usize) -> String {
    COMPONENT_NAMES
        .get(idx)
        .map(|s| (*s).to_string())
        .unwrap_or_else(|| format!("component_{:02}", idx + 1))
}

/// Generate a tidy basket of `components × months` level observations with
/// inline weights.
pub fn generate_basket(config: &SampleConfig) -> MeasureResult<Vec<RawObservation>> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let unit_normal =
        Normal::new(0.0, 1.0).map_err(|e| MeasureError::Numerical(format!("noise distribution error: {e}")))?;
    let share_draw =
        Gamma::new(2.0, 1.0).map_err(|e| MeasureError::Numerical(format!("share distribution error: {e}")))?;

    let k = config.components;
    let loadings: Vec<f64> = (0..k).map(|_| rng.gen_range(0.5..1.5)).collect();
    let raw_shares: Vec<f64> = (0..k).map(|_| share_draw.sample(&mut rng)).collect();
    let share_total: f64 = raw_shares.iter().sum();
    if !(share_total.is_finite() && share_total > 0.0) {
        return Err(MeasureError::Numerical("degenerate basket shares".into()));
    }
    let shares: Vec<f64> = raw_shares.iter().map(|s| s / share_total).collect();

    let trend = (1.0 + config.trend_inflation).powf(1.0 / 12.0) - 1.0;
    let start = month_start(config.start);

    let mut levels = vec![BASE_LEVEL; k];
    let mut factor = trend;
    let mut out = Vec::with_capacity(k * config.months);

    for t in 0..config.months {
        let date = add_months(start, t)?;

        if t > 0 {
            factor = trend
                + config.factor_persistence * (factor - trend)
                + config.factor_vol * unit_normal.sample(&mut rng);

            for (idx, level) in levels.iter_mut().enumerate() {
                let jump = sample_jump(&mut rng, config.jump_prob_up, config.jump_prob_down) * config.jump_k;
                let change = trend
                    + loadings[idx] * (factor - trend)
                    + config.idio_vol * (unit_normal.sample(&mut rng) + jump);
                *level *= 1.0 + change.max(MIN_MONTHLY_CHANGE);
            }
        }

        for (idx, level) in levels.iter().enumerate() {
            out.push(RawObservation {
                date,
                component: component_name(idx),
                level: Some(*level),
                weight: Some(shares[idx]),
            });
        }
    }

    info!(
        seed = config.seed,
        components = k,
        months = config.months,
        "generated synthetic basket"
    );
    Ok(out)
}

fn add_months(start: NaiveDate, t: usize) -> MeasureResult<NaiveDate> {
    u32::try_from(t)
        .ok()
        .and_then(|m| start.checked_add_months(Months::new(m)))
        .ok_or_else(|| MeasureError::InvalidConfig(format!("date overflow {t} months after {start}")))
}

/// +1, -1 or 0 with the given probabilities.
fn sample_jump(rng: &mut StdRng, p_up: f64, p_down: f64) -> f64 {
    let roll: f64 = rng.r#gen();
    if roll < p_up {
        1.0
    } else if roll < p_up + p_down {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn same_seed_same_basket() {
        let cfg = SampleConfig::default();
        let a = generate_basket(&cfg).unwrap();
        let b = generate_basket(&cfg).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), cfg.components * cfg.months);

        let other = generate_basket(&SampleConfig { seed: 7, ..cfg }).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn shares_sum_to_one_and_levels_positive() {
        let cfg = SampleConfig {
            components: 5,
            months: 30,
            jump_prob_up: 0.2,
            jump_prob_down: 0.2,
            ..SampleConfig::default()
        };
        let basket = generate_basket(&cfg).unwrap();

        let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for obs in &basket {
            assert!(obs.level.unwrap() > 0.0);
            *totals.entry(obs.date).or_default() += obs.weight.unwrap();
        }
        assert_eq!(totals.len(), 30);
        assert!(totals.values().all(|t| (t - 1.0).abs() < 1e-12));
        assert_eq!(basket[0].level, Some(BASE_LEVEL));
    }

    #[test]
    fn names_extend_past_the_builtin_list() {
        assert_eq!(component_name(0), "food");
        assert_eq!(component_name(12), "component_13");
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = SampleConfig {
            components: 1,
            ..SampleConfig::default()
        };
        assert!(matches!(generate_basket(&cfg), Err(MeasureError::InvalidConfig(_))));
    }
}
