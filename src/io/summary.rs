//! JSON run summary.
//!
//! A machine-readable companion to the CSV export: the configuration that
//! produced the table, stage diagnostics, and the factor decomposition.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{CoreMeasure, EstimatorConfig};
use crate::error::AppError;
use crate::estimate::SkippedDate;
use crate::series::SeriesStats;

/// Per-component factor diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub component: String,
    /// `None` for components that did not enter the principal-component step.
    pub loading: Option<f64>,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Factor-step summary, or the reason it failed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FactorSummary {
    Ok {
        components_used: usize,
        dates_used: usize,
        explained_variance: f64,
        excluded: Vec<(String, String)>,
        components: Vec<ComponentSummary>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: String,
    pub version: String,
    pub generated: NaiveDate,
    pub config: EstimatorConfig,
    pub series: SeriesStats,
    pub distributions: usize,
    pub skipped: Vec<SkippedDate>,
    pub factor: FactorSummary,
    /// The output table in long form.
    pub measures: Vec<CoreMeasure>,
}

/// Write a pretty-printed JSON summary.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}
