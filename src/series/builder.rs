//! Series Builder: index levels + basket weights -> `ComponentChange` rows.
//!
//! For every component, ordered by date:
//!
//! - `mom[t] = level[t] / level[t - 1 month] - 1`
//! - `yoy[t] = level[t] / level[t - 12 months] - 1`
//!
//! Lags are calendar months, not row offsets: a hole in a component's history
//! leaves the dependent changes undefined instead of silently spanning it.
//!
//! Nothing is ever zero-filled. A change without a lag base is dropped; a change
//! whose base is zero, negative, or non-finite is dropped and counted separately.
//! A row is kept when at least one horizon is defined.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{ComponentChange, RawObservation, WeightObservation, WeightUnit};
use crate::error::{MeasureError, MeasureResult};
use crate::series::{month_start, months_back};

/// Median per-date weight total above which `WeightUnit::Auto` assumes percent.
const PERCENT_THRESHOLD: f64 = 1.5;

/// Counters describing what the builder kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub rows_read: usize,
    pub duplicate_rows: usize,
    pub components: usize,
    pub dates: usize,
    pub rows_kept: usize,
    pub mom_defined: usize,
    pub yoy_defined: usize,
    /// Changes with no observation at the lag date (first observation, first
    /// 12 months, or a gap).
    pub missing_lag: usize,
    /// Rows whose own level is missing.
    pub missing_level: usize,
    /// Changes dropped because the computation produced a non-finite value.
    pub non_finite: usize,
    /// Kept rows that have no usable weight.
    pub missing_weight: usize,
    /// Factor applied to raw weights to obtain shares.
    pub weight_scale: f64,
    pub weight_note: Option<String>,
}

/// Output of the builder: all kept changes, sorted by (date, component).
#[derive(Debug, Clone)]
pub struct ChangeTable {
    pub changes: Vec<ComponentChange>,
    pub components: Vec<String>,
    pub stats: SeriesStats,
}

/// Build per-component MoM and YoY changes.
///
/// `weights`, when given, takes precedence over the inline `RawObservation::weight`.
pub fn build_changes(
    levels: &[RawObservation],
    weights: Option<&[WeightObservation]>,
    unit: WeightUnit,
) -> MeasureResult<ChangeTable> {
    let mut stats = SeriesStats {
        rows_read: levels.len(),
        ..SeriesStats::default()
    };

    // component -> date -> level
    let mut series: BTreeMap<String, BTreeMap<NaiveDate, Option<f64>>> = BTreeMap::new();
    let mut inline_weights: HashMap<(NaiveDate, String), f64> = HashMap::new();

    for obs in levels {
        let date = month_start(obs.date);
        let entry = series.entry(obs.component.clone()).or_default();
        if entry.contains_key(&date) {
            stats.duplicate_rows += 1;
            continue;
        }
        entry.insert(date, obs.level);
        if let Some(w) = obs.weight {
            inline_weights.insert((date, obs.component.clone()), w);
        }
    }
    if stats.duplicate_rows > 0 {
        warn!(duplicates = stats.duplicate_rows, "duplicate (date, component) rows ignored; first occurrence kept");
    }

    let raw_weights: HashMap<(NaiveDate, String), f64> = match weights {
        Some(table) => {
            let mut map = HashMap::with_capacity(table.len());
            for w in table {
                map.entry((month_start(w.date), w.component.clone())).or_insert(w.weight);
            }
            map
        }
        None => inline_weights,
    };

    let (scale, note) = resolve_weight_scale(&raw_weights, unit);
    stats.weight_scale = scale;
    stats.weight_note = note;

    let mut changes = Vec::new();
    let mut all_dates = BTreeSet::new();

    for (component, history) in &series {
        for (&date, &level) in history {
            let Some(level) = level else {
                stats.missing_level += 1;
                debug!(err = %missing(date, component, "index level"), "dropping row");
                continue;
            };

            let mom = change_at(component, date, level, history, 1, &mut stats);
            let yoy = change_at(component, date, level, history, 12, &mut stats);

            if mom.is_none() && yoy.is_none() {
                continue;
            }

            let weight = raw_weights
                .get(&(date, component.clone()))
                .copied()
                .filter(|w| w.is_finite() && *w >= 0.0)
                .map(|w| w * scale);
            if weight.is_none() {
                stats.missing_weight += 1;
                debug!(err = %missing(date, component, "basket weight"), "change kept without weight");
            }

            stats.mom_defined += usize::from(mom.is_some());
            stats.yoy_defined += usize::from(yoy.is_some());
            all_dates.insert(date);
            changes.push(ComponentChange {
                date,
                component: component.clone(),
                weight,
                mom,
                yoy,
            });
        }
    }

    changes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.component.cmp(&b.component)));

    stats.components = series.len();
    stats.dates = all_dates.len();
    stats.rows_kept = changes.len();

    info!(
        rows_read = stats.rows_read,
        rows_kept = stats.rows_kept,
        components = stats.components,
        dates = stats.dates,
        missing_lag = stats.missing_lag,
        non_finite = stats.non_finite,
        missing_weight = stats.missing_weight,
        "built component changes"
    );

    Ok(ChangeTable {
        changes,
        components: series.into_keys().collect(),
        stats,
    })
}

fn missing(date: NaiveDate, component: &str, what: &'static str) -> MeasureError {
    MeasureError::MissingData {
        date,
        component: component.to_string(),
        what,
    }
}

/// Percent change of `level` relative to the observation `lag` months earlier.
fn change_at(
    component: &str,
    date: NaiveDate,
    level: f64,
    history: &BTreeMap<NaiveDate, Option<f64>>,
    lag: u32,
    stats: &mut SeriesStats,
) -> Option<f64> {
    let base = months_back(date, lag).and_then(|d| history.get(&d).copied().flatten());
    let Some(base) = base else {
        stats.missing_lag += 1;
        return None;
    };

    match pct_change(component, date, level, base) {
        Ok(v) => Some(v),
        Err(err) => {
            debug!(%err, lag, "dropping change");
            stats.non_finite += 1;
            None
        }
    }
}

/// `(level - base) / base`, rejecting bases that are not strictly positive.
pub fn pct_change(component: &str, date: NaiveDate, level: f64, base: f64) -> MeasureResult<f64> {
    if !(base.is_finite() && base > 0.0) {
        return Err(MeasureError::NonFiniteValue {
            date,
            component: component.to_string(),
            what: "lag base level",
        });
    }
    let change = (level - base) / base;
    if change.is_finite() {
        Ok(change)
    } else {
        Err(MeasureError::NonFiniteValue {
            date,
            component: component.to_string(),
            what: "percent change",
        })
    }
}

fn resolve_weight_scale(weights: &HashMap<(NaiveDate, String), f64>, unit: WeightUnit) -> (f64, Option<String>) {
    match unit {
        WeightUnit::Share => (1.0, None),
        WeightUnit::Percent => (0.01, Some("weights: percent→share (÷100)".to_string())),
        WeightUnit::Auto => {
            let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
            for ((date, _), &w) in weights {
                if w.is_finite() && w >= 0.0 {
                    *totals.entry(*date).or_default() += w;
                }
            }
            let mut values: Vec<f64> = totals.into_values().collect();
            if values.is_empty() {
                return (1.0, None);
            }
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let median = values[values.len() / 2];
            if median > PERCENT_THRESHOLD {
                (0.01, Some(format!("weights: auto percent→share (median total {median:.2})")))
            } else {
                (1.0, None)
            }
        }
    }
}
