//! End-to-end checks through the public library API.

use chrono::{Months, NaiveDate};

use core_cpi::app::pipeline::{LoadedInput, run_pipeline};
use core_cpi::data::generate_basket;
use core_cpi::domain::{
    DistributionMethod, EstimatorConfig, JoinPolicy, MeasureKind, RawObservation, SampleConfig,
};
use core_cpi::error::MeasureError;
use core_cpi::io::{parse_core_csv, read_levels, read_weights, write_core_csv};

fn month(i: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap() + Months::new(i)
}

/// Three components with steady MoM changes; `C` jumps 50% in month 13.
fn outlier_basket() -> Vec<RawObservation> {
    let basket = [("A", 0.5, 0.002), ("B", 0.3, 0.003), ("C", 0.2, 0.0025)];
    let mut out = Vec::new();
    for (name, weight, mom) in basket {
        let mut level = 100.0;
        for i in 0..14u32 {
            if i > 0 {
                let change = if name == "C" && i == 12 { 0.5 } else { mom };
                level *= 1.0 + change;
            }
            out.push(RawObservation {
                date: month(i),
                component: name.to_string(),
                level: Some(level),
                weight: Some(weight),
            });
        }
    }
    out
}

#[test]
fn trimmed_mean_ignores_a_single_outlier() {
    let input = LoadedInput::from_levels(outlier_basket());
    let config = EstimatorConfig {
        join: JoinPolicy::Outer,
        ..EstimatorConfig::default()
    };
    let out = run_pipeline(&input, &config).unwrap();

    // MoM in the outlier month: trim stays between A and B, the naive mean explodes.
    let jump = month(12);
    let trim = out.trim_median.trim[&jump];
    let median = out.trim_median.median[&jump];
    let naive = 0.5 * 0.002 + 0.3 * 0.003 + 0.2 * 0.5;
    assert!((trim - 0.0025).abs() < 1e-12, "trim {trim}");
    assert!((0.002..=0.003).contains(&median), "median {median}");
    assert!(naive > 0.1);

    // Ordinary months retain A (0.25), C (0.20) and B (0.05) of the weight.
    assert!((out.trim_median.trim[&month(3)] - 0.0023).abs() < 1e-12);

    // Only two YoY dates exist, so the common factor is undetermined.
    assert!(matches!(
        out.common,
        Err(MeasureError::UndeterminedFactor { dates: 2, .. })
    ));

    // Trim YoY: eleven ordinary months and the outlier month.
    let expected = (1.0023_f64.powi(11) * 1.0025 - 1.0) * 100.0;
    let trim_yoy = out.core.series(MeasureKind::Trim);
    assert_eq!(trim_yoy.len(), 2);
    assert_eq!(trim_yoy[0].0, month(12));
    for (_, v) in &trim_yoy {
        assert!((v - expected).abs() < 1e-9, "trim yoy {v}");
        assert!(*v < 3.0);
    }
    assert!(out.core.rows.iter().all(|r| r.common.is_none()));

    // The default inner join needs all three measures.
    let inner = run_pipeline(&input, &EstimatorConfig::default()).unwrap();
    assert!(inner.core.is_empty());
}

#[test]
fn synthetic_run_exports_a_complete_table() {
    let basket = generate_basket(&SampleConfig::default()).unwrap();
    let input = LoadedInput::from_levels(basket);

    let exact = run_pipeline(&input, &EstimatorConfig::default()).unwrap();
    assert!(exact.common.is_ok());
    assert!(!exact.core.is_empty());
    assert!(exact.core.rows.windows(2).all(|w| w[0].date < w[1].date));
    for row in &exact.core.rows {
        assert!(row.trim.is_some() && row.median.is_some() && row.common.is_some());
    }

    let replicated = run_pipeline(
        &input,
        &EstimatorConfig {
            method: DistributionMethod::Replicated { precision: 10_000 },
            ..EstimatorConfig::default()
        },
    )
    .unwrap();
    let a = exact.core.series(MeasureKind::Trim);
    let b = replicated.core.series(MeasureKind::Trim);
    assert_eq!(a.len(), b.len());
    for ((da, va), (db, vb)) in a.iter().zip(&b) {
        assert_eq!(da, db);
        assert!((va - vb).abs() < 0.01, "{da}: {va} vs {vb}");
    }

    let mut buf = Vec::new();
    write_core_csv(&mut buf, &exact.core).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert!(text.starts_with("date,CPI-trim,CPI-median,CPI-common\n"));
    assert_eq!(parse_core_csv(buf.as_slice()).unwrap().len(), exact.core.len());
}

#[test]
fn csv_input_with_percent_weight_table() {
    let mut levels = String::from("date,component,level\n");
    let mut weights = String::from("date,component,weight\n");
    for i in 0..30u32 {
        let d = month(i).format("%Y-%m");
        let wobble = (f64::from(i) / 3.0).sin() * 0.001;
        for (name, base, w) in [("food", 0.002, 40.0), ("rent", 0.003, 35.0), ("fuel", 0.001, 25.0)] {
            let level = 100.0 * (1.0 + base + wobble * if name == "fuel" { 3.0 } else { 1.0 }).powi(i as i32);
            levels.push_str(&format!("{d},{name},{level:.6}\n"));
            weights.push_str(&format!("{d},{name},{w}\n"));
        }
    }

    let levels = read_levels(levels.as_bytes(), "levels").unwrap();
    let weights = read_weights(weights.as_bytes(), "weights").unwrap();
    let input = LoadedInput {
        levels: levels.rows,
        weights: Some(weights.rows),
        row_errors: Vec::new(),
    };
    let out = run_pipeline(&input, &EstimatorConfig::default()).unwrap();

    assert_eq!(out.table.stats.weight_scale, 0.01);
    assert_eq!(out.table.stats.components, 3);
    assert!(out.trim_median.skipped.is_empty());
    let common = out.common.as_ref().unwrap();
    assert_eq!(common.factor.components.len(), 3);
    assert!(!out.core.is_empty());
}
