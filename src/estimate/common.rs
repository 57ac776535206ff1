//! Common-Factor Extractor.
//!
//! Three stages, each usable on its own:
//!
//! 1. `extract_factor` (global): PC1 score per date from the complete-case
//!    matrix of YoY changes (rows = dates, columns = components).
//! 2. `fit_components` (local): one OLS regression per component of its YoY
//!    change on the score, over the dates where both exist. Fitted values put
//!    the dimensionless score back into inflation units.
//! 3. `aggregate_common`: `Σ share · fitted` per date.
//!
//! The score's sign and scale are arbitrary. OLS fitted values are invariant to
//! any affine transform of the regressor, so the output does not depend on
//! them: negating the score negates every slope and nothing else.
//!
//! The complete-case requirement can leave far fewer dates than the trim/median
//! path, which tolerates partial coverage per date.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use nalgebra::DMatrix;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{ComponentChange, Horizon, RegressionFit};
use crate::error::{MeasureError, MeasureResult};
use crate::math::{column_std, first_principal_component, fit_simple};

/// Fewest components the factor can be extracted from.
pub const MIN_FACTOR_COMPONENTS: usize = 2;
/// Fewest complete-case dates for extraction, and fewest points per regression.
pub const MIN_FACTOR_DATES: usize = 3;

/// Population std dev below which a column is treated as constant.
const MIN_COLUMN_STD: f64 = 1e-12;

/// PC1 of the YoY change matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorScores {
    pub dates: Vec<NaiveDate>,
    pub scores: Vec<f64>,
    /// Components that entered the principal-component step, aligned with `loadings`.
    pub components: Vec<String>,
    pub loadings: Vec<f64>,
    pub explained_variance: f64,
    /// Components left out of the matrix, with the reason.
    pub excluded: Vec<(String, String)>,
}

impl FactorScores {
    pub fn score_map(&self) -> BTreeMap<NaiveDate, f64> {
        self.dates.iter().copied().zip(self.scores.iter().copied()).collect()
    }

    /// Same factor with the opposite orientation.
    pub fn negated(&self) -> Self {
        Self {
            scores: self.scores.iter().map(|v| -v).collect(),
            loadings: self.loadings.iter().map(|v| -v).collect(),
            ..self.clone()
        }
    }
}

/// Everything the common measure produced.
#[derive(Debug, Clone)]
pub struct CommonOutput {
    pub factor: FactorScores,
    pub fits: Vec<RegressionFit>,
    /// Common-factor inflation per date (YoY decimal rate).
    pub values: BTreeMap<NaiveDate, f64>,
}

/// component -> date -> change at `horizon`.
pub fn pivot_wide(changes: &[ComponentChange], horizon: Horizon) -> BTreeMap<String, BTreeMap<NaiveDate, f64>> {
    let mut wide: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for c in changes {
        if let Some(v) = c.change(horizon) {
            wide.entry(c.component.clone()).or_default().insert(c.date, v);
        }
    }
    wide
}

/// Stage 1: first principal component score per complete-case date.
pub fn extract_factor(changes: &[ComponentChange], min_coverage: f64) -> MeasureResult<FactorScores> {
    let wide = pivot_wide(changes, Horizon::Yoy);
    let all_dates: BTreeSet<NaiveDate> = wide.values().flat_map(|s| s.keys().copied()).collect();
    let n_all = all_dates.len().max(1) as f64;

    let mut excluded = Vec::new();
    let mut kept: Vec<&String> = Vec::new();
    for (component, series) in &wide {
        let coverage = series.len() as f64 / n_all;
        if coverage < min_coverage {
            excluded.push((
                component.clone(),
                format!("coverage {coverage:.2} below {min_coverage:.2}"),
            ));
        } else {
            kept.push(component);
        }
    }

    let dates: Vec<NaiveDate> = all_dates
        .iter()
        .copied()
        .filter(|d| kept.iter().all(|c| wide[*c].contains_key(d)))
        .collect();

    // Constant columns over the complete-case dates cannot be standardized.
    let mut components = Vec::new();
    if !dates.is_empty() {
        let matrix = build_matrix(&wide, &kept, &dates);
        for (component, sd) in kept.iter().zip(column_std(&matrix)) {
            if sd > MIN_COLUMN_STD {
                components.push((*component).clone());
            } else {
                excluded.push(((*component).clone(), "constant over complete-case dates".to_string()));
            }
        }
    }

    if components.len() < MIN_FACTOR_COMPONENTS || dates.len() < MIN_FACTOR_DATES {
        return Err(MeasureError::UndeterminedFactor {
            components: components.len(),
            dates: dates.len(),
        });
    }

    let refs: Vec<&String> = components.iter().collect();
    let matrix = build_matrix(&wide, &refs, &dates);
    let pc = first_principal_component(&matrix)
        .ok_or_else(|| MeasureError::Numerical("eigendecomposition of the correlation matrix failed".into()))?;

    info!(
        components = components.len(),
        excluded = excluded.len(),
        dates = dates.len(),
        explained_variance = pc.explained_variance,
        "extracted common factor"
    );

    Ok(FactorScores {
        dates,
        scores: pc.scores,
        components,
        loadings: pc.loadings,
        explained_variance: pc.explained_variance,
        excluded,
    })
}

fn build_matrix(
    wide: &BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    components: &[&String],
    dates: &[NaiveDate],
) -> DMatrix<f64> {
    DMatrix::from_fn(dates.len(), components.len(), |i, j| {
        wide[components[j]].get(&dates[i]).copied().unwrap_or(f64::NAN)
    })
}

/// Stage 2: regress every component's YoY change on the score.
///
/// Components with fewer than `MIN_FACTOR_DATES` overlapping dates are skipped.
pub fn fit_components(changes: &[ComponentChange], scores: &BTreeMap<NaiveDate, f64>) -> Vec<RegressionFit> {
    let wide = pivot_wide(changes, Horizon::Yoy);
    let mut fits = Vec::with_capacity(wide.len());

    for (component, series) in &wide {
        let (dates, (x, y)): (Vec<NaiveDate>, (Vec<f64>, Vec<f64>)) = series
            .iter()
            .filter_map(|(d, &v)| scores.get(d).map(|&s| (*d, (s, v))))
            .unzip();

        if dates.len() < MIN_FACTOR_DATES {
            debug!(component, points = dates.len(), "too few points to rescale");
            continue;
        }
        let Some(fit) = fit_simple(&x, &y) else {
            debug!(component, "regression on factor score failed");
            continue;
        };

        debug!(component, intercept = fit.intercept, slope = fit.slope, r2 = fit.r_squared, "rescaled");
        fits.push(RegressionFit {
            component: component.clone(),
            intercept: fit.intercept,
            slope: fit.slope,
            r_squared: fit.r_squared,
            fitted: dates.iter().zip(&x).map(|(&d, &s)| (d, fit.predict(s))).collect(),
        });
    }

    fits
}

/// Stage 3: basket-weighted sum of fitted values per date.
pub fn aggregate_common(changes: &[ComponentChange], fits: &[RegressionFit]) -> BTreeMap<NaiveDate, f64> {
    let weights: HashMap<(NaiveDate, &str), f64> = changes
        .iter()
        .filter_map(|c| {
            c.weight
                .filter(|w| w.is_finite())
                .map(|w| ((c.date, c.component.as_str()), w))
        })
        .collect();

    let mut out: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for fit in fits {
        for (&date, &value) in &fit.fitted {
            if let Some(&w) = weights.get(&(date, fit.component.as_str())) {
                *out.entry(date).or_default() += w * value;
            }
        }
    }
    out
}

/// All three stages.
pub fn estimate_common(changes: &[ComponentChange], min_coverage: f64) -> MeasureResult<CommonOutput> {
    let factor = extract_factor(changes, min_coverage)?;
    let fits = fit_components(changes, &factor.score_map());
    let values = aggregate_common(changes, &fits);

    info!(fits = fits.len(), dates = values.len(), "estimated common-factor measure");
    Ok(CommonOutput { factor, fits, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn month(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020 + (i / 12) as i32, (i % 12) as u32 + 1, 1).unwrap()
    }

    /// YoY-only changes from a (dates x components) grid; `None` cells are absent.
    fn grid(cells: &[Vec<Option<f64>>], weights: &[f64]) -> Vec<ComponentChange> {
        let mut out = Vec::new();
        for (i, row) in cells.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                if let Some(v) = cell {
                    out.push(ComponentChange {
                        date: month(i),
                        component: format!("c{j}"),
                        weight: Some(weights[j]),
                        mom: None,
                        yoy: Some(*v),
                    });
                }
            }
        }
        out
    }

    fn factor_grid(n: usize) -> Vec<Vec<Option<f64>>> {
        (0..n)
            .map(|i| {
                let f = 0.02 + 0.01 * ((i as f64) * 0.7).sin();
                vec![
                    Some(0.9 * f + 0.001 * ((i * 7 % 5) as f64)),
                    Some(1.2 * f - 0.002),
                    Some(0.5 * f + 0.01 + 0.0005 * ((i * 3 % 4) as f64)),
                ]
            })
            .collect()
    }

    #[test]
    fn common_tracks_shared_component() {
        let changes = grid(&factor_grid(24), &[0.5, 0.3, 0.2]);
        let out = estimate_common(&changes, 0.0).unwrap();
        assert_eq!(out.factor.components.len(), 3);
        assert_eq!(out.values.len(), 24);
        assert!(out.factor.explained_variance > 0.8);
        assert!(out.factor.loadings.iter().all(|l| *l > 0.0));

        // The weighted fitted values stay close to the weighted actual changes.
        for (i, (_, v)) in out.values.iter().enumerate() {
            let f = 0.02 + 0.01 * ((i as f64) * 0.7).sin();
            let actual = 0.5 * 0.9 * f + 0.3 * (1.2 * f - 0.002) + 0.2 * (0.5 * f + 0.01);
            assert!((v - actual).abs() < 0.003, "date {i}: {v} vs {actual}");
        }
    }

    #[test]
    fn incomplete_dates_drop_out_of_the_factor() {
        let mut cells = factor_grid(12);
        cells[4][1] = None;
        let changes = grid(&cells, &[0.5, 0.3, 0.2]);
        let out = estimate_common(&changes, 0.0).unwrap();

        assert_eq!(out.factor.dates.len(), 11);
        assert!(!out.values.contains_key(&month(4)));
        assert!(out.values.contains_key(&month(5)));
    }

    #[test]
    fn coverage_filter_keeps_sparse_component_out_of_the_matrix() {
        let mut cells = factor_grid(12);
        for row in cells.iter_mut().take(6) {
            row[2] = None;
        }
        let changes = grid(&cells, &[0.5, 0.3, 0.2]);

        let strict = extract_factor(&changes, 0.0).unwrap();
        assert_eq!(strict.dates.len(), 6);

        let relaxed = extract_factor(&changes, 0.9).unwrap();
        assert_eq!(relaxed.dates.len(), 12);
        assert_eq!(relaxed.components, vec!["c0".to_string(), "c1".to_string()]);
        assert_eq!(relaxed.excluded.len(), 1);

        // The sparse component is still rescaled where it has data.
        let fits = fit_components(&changes, &relaxed.score_map());
        let c2 = fits.iter().find(|f| f.component == "c2").unwrap();
        assert_eq!(c2.fitted.len(), 6);
    }

    #[test]
    fn single_component_is_undetermined() {
        let cells: Vec<Vec<Option<f64>>> = (0..10).map(|i| vec![Some(0.01 * i as f64)]).collect();
        let changes = grid(&cells, &[1.0]);
        let err = estimate_common(&changes, 0.0).unwrap_err();
        assert_eq!(err, MeasureError::UndeterminedFactor { components: 1, dates: 10 });
    }

    #[test]
    fn constant_component_is_excluded_from_pca() {
        let cells: Vec<Vec<Option<f64>>> = factor_grid(10)
            .into_iter()
            .map(|mut row| {
                row[2] = Some(0.03);
                row
            })
            .collect();
        let changes = grid(&cells, &[0.4, 0.4, 0.2]);
        let factor = extract_factor(&changes, 0.0).unwrap();
        assert_eq!(factor.components.len(), 2);
        assert!(factor.excluded.iter().any(|(c, _)| c == "c2"));
    }

    proptest! {
        #[test]
        fn sign_flip_leaves_output_unchanged(
            seed_rows in prop::collection::vec(
                (-0.05f64..0.05, -0.01f64..0.01, -0.01f64..0.01, -0.01f64..0.01),
                6..30,
            ),
        ) {
            let cells: Vec<Vec<Option<f64>>> = seed_rows
                .iter()
                .map(|&(f, a, b, c)| vec![Some(f + a), Some(0.8 * f + b), Some(1.5 * f + c)])
                .collect();
            let changes = grid(&cells, &[0.2, 0.3, 0.5]);

            let factor = extract_factor(&changes, 0.0);
            prop_assume!(factor.is_ok());
            let factor = factor.unwrap();

            let fits = fit_components(&changes, &factor.score_map());
            let flipped = fit_components(&changes, &factor.negated().score_map());
            prop_assert_eq!(fits.len(), flipped.len());

            for (a, b) in fits.iter().zip(&flipped) {
                prop_assert!((a.slope + b.slope).abs() < 1e-9);
                for (d, v) in &a.fitted {
                    prop_assert!((v - b.fitted[d]).abs() < 1e-9);
                }
            }

            let common = aggregate_common(&changes, &fits);
            let common_flipped = aggregate_common(&changes, &flipped);
            for (d, v) in &common {
                prop_assert!((v - common_flipped[d]).abs() < 1e-9);
            }
        }
    }
}
