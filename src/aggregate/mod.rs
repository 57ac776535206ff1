//! Aggregator: chain, annualize, and merge the three measures.
//!
//! Trim and median come out of the estimator as MoM rates. They are compounded
//! into an index anchored at `1.0` in the month before the first rate, and YoY is
//! read off that index twelve calendar months apart. A missing month ends the
//! current chain and the next available month starts a new one; YoY never spans
//! two chains. The common measure is already a YoY rate and passes through.
//!
//! Anchoring in the base month differs from the textbook recursion, which sets
//! `cumulative = 1` at the first rate and so discards that rate. Both give the
//! same YoY on every date they share; the anchored chain also yields a value at
//! the twelfth rate, which the textbook one cannot.
//!
//! The merge follows `JoinPolicy`, and every value is scaled to percentage
//! points.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{CoreRow, CoreSeries, JoinPolicy};
use crate::series::months_back;

/// Percent -> percentage points.
const PCT: f64 = 100.0;

/// One point on a chained index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainPoint {
    pub level: f64,
    /// Chains are numbered in date order; a gap starts a new one.
    pub segment: usize,
}

/// Compound MoM rates into an index. The base month of each chain is included
/// with level `1.0`.
pub fn chain_index(rates: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, ChainPoint> {
    let mut out = BTreeMap::new();
    let mut prev: Option<(NaiveDate, ChainPoint)> = None;
    let mut segment = 0usize;

    for (&date, &rate) in rates {
        let continues = prev.is_some_and(|(d, _)| months_back(date, 1) == Some(d));
        let base_level = match prev {
            Some((_, p)) if continues => p.level,
            Some(_) => {
                segment += 1;
                1.0
            }
            None => 1.0,
        };
        if !continues {
            if let Some(base) = months_back(date, 1) {
                out.insert(base, ChainPoint { level: 1.0, segment });
            }
        }

        let point = ChainPoint {
            level: base_level * (1.0 + rate),
            segment,
        };
        out.insert(date, point);
        prev = Some((date, point));
    }

    out
}

/// YoY rate from a chained index (same-chain points twelve months apart).
pub fn yoy_from_index(index: &BTreeMap<NaiveDate, ChainPoint>) -> BTreeMap<NaiveDate, f64> {
    index
        .iter()
        .filter_map(|(&date, point)| {
            let lag = index.get(&months_back(date, 12)?)?;
            if lag.segment != point.segment || lag.level == 0.0 {
                return None;
            }
            let yoy = (point.level - lag.level) / lag.level;
            yoy.is_finite().then_some((date, yoy))
        })
        .collect()
}

/// MoM rates -> YoY via the chained index.
pub fn chained_yoy(rates: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, f64> {
    yoy_from_index(&chain_index(rates))
}

/// Merge the three YoY series (decimal rates) into the output table.
pub fn merge(
    trim_yoy: &BTreeMap<NaiveDate, f64>,
    median_yoy: &BTreeMap<NaiveDate, f64>,
    common_yoy: &BTreeMap<NaiveDate, f64>,
    policy: JoinPolicy,
) -> CoreSeries {
    let dates: BTreeSet<NaiveDate> = match policy {
        JoinPolicy::Inner => trim_yoy
            .keys()
            .filter(|d| median_yoy.contains_key(d) && common_yoy.contains_key(d))
            .copied()
            .collect(),
        JoinPolicy::Outer => trim_yoy
            .keys()
            .chain(median_yoy.keys())
            .chain(common_yoy.keys())
            .copied()
            .collect(),
    };

    let pp = |m: &BTreeMap<NaiveDate, f64>, d: &NaiveDate| m.get(d).map(|v| v * PCT);
    let rows = dates
        .iter()
        .map(|d| CoreRow {
            date: *d,
            trim: pp(trim_yoy, d),
            median: pp(median_yoy, d),
            common: pp(common_yoy, d),
        })
        .collect();

    CoreSeries { rows }
}

/// Full aggregation from MoM trim/median rates and YoY common values.
pub fn aggregate(
    trim_mom: &BTreeMap<NaiveDate, f64>,
    median_mom: &BTreeMap<NaiveDate, f64>,
    common_yoy: &BTreeMap<NaiveDate, f64>,
    policy: JoinPolicy,
) -> CoreSeries {
    merge(&chained_yoy(trim_mom), &chained_yoy(median_mom), common_yoy, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn constant_rates(r: f64, months: usize) -> BTreeMap<NaiveDate, f64> {
        (0..months)
            .map(|i| (ym(2021 + (i / 12) as i32, (i % 12) as u32 + 1), r))
            .collect()
    }

    #[test]
    fn constant_rate_compounds_to_annual() {
        let r = 0.002;
        let yoy = chained_yoy(&constant_rates(r, 24));
        let expected = (1.0 + r).powi(12) - 1.0;

        // Base is Dec 2020, so the first YoY lands on Dec 2021.
        assert_eq!(yoy.keys().next().copied(), Some(ym(2021, 12)));
        assert_eq!(yoy.len(), 13);
        for v in yoy.values() {
            assert!((v - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn base_month_anchor_adds_the_twelfth_rate() {
        let rates: BTreeMap<_, _> = (1..=12)
            .map(|m| (ym(2021, m), 0.001 * m as f64))
            .chain([(ym(2022, 1), 0.02)])
            .collect();
        let yoy = chained_yoy(&rates);
        assert_eq!(yoy.keys().copied().collect::<Vec<_>>(), vec![ym(2021, 12), ym(2022, 1)]);

        let all_twelve: f64 = (1..=12).map(|m| 1.0 + 0.001 * m as f64).product::<f64>() - 1.0;
        assert!((yoy[&ym(2021, 12)] - all_twelve).abs() < 1e-12);

        // Jan 2022 matches the recursion that starts at 1.0 on Jan 2021.
        let from_first: f64 = (2..=12).map(|m| 1.0 + 0.001 * m as f64).product::<f64>() * 1.02 - 1.0;
        assert!((yoy[&ym(2022, 1)] - from_first).abs() < 1e-12);
    }

    #[test]
    fn gap_starts_a_new_chain() {
        let mut rates = constant_rates(0.01, 30);
        rates.remove(&ym(2022, 3));
        let index = chain_index(&rates);
        assert_eq!(index[&ym(2022, 2)].segment, 0);
        assert_eq!(index[&ym(2022, 4)].segment, 1);
        assert_eq!(index[&ym(2022, 3)].level, 1.0);

        let yoy = yoy_from_index(&index);
        // Apr 2022 would need Apr 2021 from the previous chain.
        assert!(!yoy.contains_key(&ym(2022, 4)));
        assert!(yoy.contains_key(&ym(2023, 3)));
        assert!(yoy.contains_key(&ym(2022, 2)));
    }

    #[test]
    fn inner_join_requires_all_measures() {
        let a: BTreeMap<_, _> = [(ym(2022, 1), 0.02), (ym(2022, 2), 0.021)].into();
        let b: BTreeMap<_, _> = [(ym(2022, 1), 0.019), (ym(2022, 2), 0.02)].into();
        let c: BTreeMap<_, _> = [(ym(2022, 2), 0.025), (ym(2022, 3), 0.03)].into();

        let inner = merge(&a, &b, &c, JoinPolicy::Inner);
        assert_eq!(inner.len(), 1);
        assert_eq!(inner.rows[0].date, ym(2022, 2));
        assert!((inner.rows[0].common.unwrap() - 2.5).abs() < 1e-12);

        let outer = merge(&a, &b, &c, JoinPolicy::Outer);
        assert_eq!(outer.len(), 3);
        assert_eq!(outer.rows[0].common, None);
        assert_eq!(outer.rows[2].trim, None);
        assert!(outer.rows.windows(2).all(|w| w[0].date < w[1].date));
    }
}
