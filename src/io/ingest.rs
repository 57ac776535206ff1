//! CSV ingest and normalization.
//!
//! This module is responsible for turning a tidy CPI table into
//! `RawObservation`s (and, optionally, a separate weight table into
//! `WeightObservation`s).
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no estimation logic here
//!
//! Expected columns (case-insensitive, aliases in parentheses):
//! - `date` (`period`, `month`)
//! - `component` (`item`, `series`)
//! - `level` (`index`, `value`)
//! - `weight` (optional)

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{RawObservation, WeightObservation};
use crate::error::AppError;
use crate::series::month_start;

const DATE_ALIASES: [&str; 3] = ["date", "period", "month"];
const COMPONENT_ALIASES: [&str; 3] = ["component", "item", "series"];
const LEVEL_ALIASES: [&str; 3] = ["level", "index", "value"];
const WEIGHT_ALIASES: [&str; 1] = ["weight"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub component: Option<String>,
    pub message: String,
}

/// Ingest output: normalized rows + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Resolved column positions.
struct Columns {
    date: usize,
    component: usize,
    value: usize,
    weight: Option<usize>,
}

/// Load the level table from a CSV file.
pub fn load_levels(path: &Path) -> Result<IngestedData<RawObservation>, AppError> {
    let file = open(path)?;
    read_levels(file, &path.display().to_string())
}

/// Load a separate weight table from a CSV file.
pub fn load_weights(path: &Path) -> Result<IngestedData<WeightObservation>, AppError> {
    let file = open(path)?;
    read_weights(file, &path.display().to_string())
}

fn open(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))
}

/// Parse a level table from any reader. `label` names the source in messages.
pub fn read_levels<R: Read>(reader: R, label: &str) -> Result<IngestedData<RawObservation>, AppError> {
    let (mut csv_reader, headers) = open_reader(reader, label)?;
    let cols = resolve_columns(&headers, &LEVEL_ALIASES, label)?;

    let mut out = Vec::new();
    let mut row_errors = Vec::new();
    let mut seen: HashSet<(NaiveDate, String)> = HashSet::new();
    let mut rows_read = 0usize;

    for (idx, result) in csv_reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    component: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_level_row(&record, &cols) {
            Ok(obs) => {
                if !seen.insert((obs.date, obs.component.clone())) {
                    row_errors.push(RowError {
                        line,
                        component: Some(obs.component),
                        message: "Duplicate (date, component) row.".to_string(),
                    });
                    continue;
                }
                out.push(obs);
            }
            Err((component, message)) => row_errors.push(RowError {
                line,
                component,
                message,
            }),
        }
    }

    finish(out, row_errors, rows_read, label)
}

/// Parse a weight table from any reader.
pub fn read_weights<R: Read>(reader: R, label: &str) -> Result<IngestedData<WeightObservation>, AppError> {
    let (mut csv_reader, headers) = open_reader(reader, label)?;
    let cols = resolve_columns(&headers, &WEIGHT_ALIASES, label)?;

    let mut out = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in csv_reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| (None, format!("CSV parse error: {e}")))
            .and_then(|record| {
                let date = parse_date(get_required(&record, cols.date, "date").map_err(|m| (None, m))?)
                    .map_err(|m| (None, m))?;
                let component = get_required(&record, cols.component, "component")
                    .map_err(|m| (None, m))?
                    .to_string();
                let weight = parse_opt_f64(get_optional(&record, Some(cols.value)))
                    .filter(|w| *w >= 0.0)
                    .ok_or_else(|| (Some(component.clone()), "Missing/invalid `weight` value.".to_string()))?;
                Ok(WeightObservation { date, component, weight })
            });

        match parsed {
            Ok(w) => out.push(w),
            Err((component, message)) => row_errors.push(RowError {
                line,
                component,
                message,
            }),
        }
    }

    finish(out, row_errors, rows_read, label)
}

fn open_reader<R: Read>(reader: R, label: &str) -> Result<(csv::Reader<R>, StringRecord), AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers of '{label}': {e}")))?
        .clone();
    Ok((csv_reader, headers))
}

fn resolve_columns(headers: &StringRecord, value_aliases: &[&str], label: &str) -> Result<Columns, AppError> {
    let header_map = build_header_map(headers);
    let find = |aliases: &[&str]| aliases.iter().find_map(|a| header_map.get(*a).copied());
    let require = |aliases: &[&str]| {
        find(aliases).ok_or_else(|| {
            AppError::new(
                2,
                format!("Missing required column in '{label}': `{}` (aliases: {})", aliases[0], aliases.join(", ")),
            )
        })
    };

    Ok(Columns {
        date: require(&DATE_ALIASES)?,
        component: require(&COMPONENT_ALIASES)?,
        value: require(value_aliases)?,
        weight: find(&WEIGHT_ALIASES),
    })
}

fn finish<T>(rows: Vec<T>, row_errors: Vec<RowError>, rows_read: usize, label: &str) -> Result<IngestedData<T>, AppError> {
    let rows_used = rows.len();
    if !row_errors.is_empty() {
        warn!(source = label, skipped = row_errors.len(), "rows skipped during ingest");
    }
    if rows_used == 0 {
        return Err(AppError::new(3, format!("No valid rows in '{label}'.")));
    }
    info!(source = label, rows_read, rows_used, "ingested CSV");
    Ok(IngestedData {
        rows,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn parse_level_row(record: &StringRecord, cols: &Columns) -> Result<RawObservation, (Option<String>, String)> {
    let component = get_required(record, cols.component, "component")
        .map_err(|m| (None, m))?
        .to_string();
    let date = parse_date(get_required(record, cols.date, "date").map_err(|m| (Some(component.clone()), m))?)
        .map_err(|m| (Some(component.clone()), m))?;

    // An empty level is a legitimate gap; an unparseable one is a row error.
    let level = match get_optional(record, Some(cols.value)) {
        None => None,
        Some(s) => Some(
            parse_opt_f64(Some(s)).ok_or_else(|| (Some(component.clone()), format!("Invalid level '{s}'.")))?,
        ),
    };
    let weight = parse_opt_f64(get_optional(record, cols.weight));

    Ok(RawObservation {
        date,
        component,
        level,
        weight,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    record.get(idx?).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a monthly date and normalize it to the first of the month.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(month_start(d));
        }
    }
    // chrono needs a day; month-only input is pinned to the 1st.
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, YYYY-MM."))
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tidy_table_with_aliases_and_bom() {
        let csv = "\u{feff}Period,Item,Index,Weight\n\
                   2021-01-15,food,100.0,0.6\n\
                   2021-02,food,101.0,0.6\n\
                   2021/03/01,food,,0.6\n";
        let data = read_levels(csv.as_bytes(), "test").unwrap();
        assert_eq!(data.rows_used, 3);
        assert_eq!(data.rows[0].date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(data.rows[1].date, NaiveDate::from_ymd_opt(2021, 2, 1).unwrap());
        assert_eq!(data.rows[2].level, None);
        assert_eq!(data.rows[0].weight, Some(0.6));
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let csv = "date,component,level\n\
                   2021-01-01,food,100\n\
                   2021-01-01,food,100\n\
                   not-a-date,food,100\n\
                   2021-02-01,food,abc\n";
        let data = read_levels(csv.as_bytes(), "test").unwrap();
        assert_eq!(data.rows_used, 1);
        assert_eq!(data.row_errors.len(), 3);
        assert_eq!(data.row_errors[0].line, 3);
    }

    #[test]
    fn missing_required_column_is_a_usage_error() {
        let err = read_levels("date,level\n2021-01-01,1\n".as_bytes(), "test").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("component"));
    }

    #[test]
    fn weight_table_parses() {
        let csv = "date,component,weight\n2021-01-01,food,12.5\n2021-01-01,rent,-1\n";
        let data = read_weights(csv.as_bytes(), "weights").unwrap();
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].weight, 12.5);
        assert_eq!(data.row_errors.len(), 1);
    }
}
