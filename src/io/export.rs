//! Export the core inflation table (and synthetic baskets) to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts:
//! one row per month, ascending, values in percentage points, empty cells for
//! measures that are undefined on that date.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{CoreRow, CoreSeries, MeasureKind, RawObservation};
use crate::error::AppError;
use crate::io::clock::Clock;
use crate::io::ingest::parse_date;

/// `core_inflation_<YYYYMMDD>.csv`, stamped with the clock's date.
pub fn core_file_name(clock: &dyn Clock) -> String {
    format!("core_inflation_{}.csv", clock.today().format("%Y%m%d"))
}

/// Header row of the core table.
pub fn core_header() -> [&'static str; 4] {
    [
        "date",
        MeasureKind::Trim.display_name(),
        MeasureKind::Median.display_name(),
        MeasureKind::Common.display_name(),
    ]
}

/// Write the core table to any writer.
pub fn write_core_csv<W: Write>(writer: W, series: &CoreSeries) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(core_header())
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let cell = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    for row in &series.rows {
        w.write_record([
            row.date.format("%Y-%m-%d").to_string(),
            cell(row.trim),
            cell(row.median),
            cell(row.common),
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write `<dir>/core_inflation_<YYYYMMDD>.csv` and return its path.
pub fn export_core_csv(dir: &Path, series: &CoreSeries, clock: &dyn Clock) -> Result<PathBuf, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display())))?;
    let path = dir.join(core_file_name(clock));
    let file = File::create(&path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_core_csv(file, series)?;
    info!(path = %path.display(), rows = series.len(), "exported core inflation table");
    Ok(path)
}

/// Read a previously exported core table.
pub fn read_core_csv(path: &Path) -> Result<CoreSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open core CSV '{}': {e}", path.display())))?;
    parse_core_csv(file)
}

/// Parse a core table from any reader.
pub fn parse_core_csv<R: Read>(reader: R) -> Result<CoreSeries, AppError> {
    let mut r = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = r
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read core CSV headers: {e}")))?
        .clone();
    let expected = core_header();
    if headers.len() < expected.len() || headers.iter().zip(expected).any(|(h, e)| !h.eq_ignore_ascii_case(e)) {
        return Err(AppError::new(
            2,
            format!("Unexpected core CSV header; expected `{}`.", expected.join(",")),
        ));
    }

    let mut rows = Vec::new();
    for (idx, record) in r.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| AppError::new(2, format!("Core CSV parse error on line {line}: {e}")))?;
        let date = parse_date(record.get(0).unwrap_or_default())
            .map_err(|m| AppError::new(2, format!("Core CSV line {line}: {m}")))?;
        let value = |i: usize| -> Result<Option<f64>, AppError> {
            match record.get(i).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(s) => s
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| AppError::new(2, format!("Core CSV line {line}: invalid value '{s}'"))),
            }
        };
        rows.push(CoreRow {
            date,
            trim: value(1)?,
            median: value(2)?,
            common: value(3)?,
        });
    }
    rows.sort_by_key(|r: &CoreRow| r.date);
    Ok(CoreSeries { rows })
}

/// Write observations as a tidy `date,component,level,weight` CSV.
pub fn write_levels_csv<W: Write>(writer: W, observations: &[RawObservation]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["date", "component", "level", "weight"])
        .map_err(|e| AppError::new(2, format!("Failed to write levels CSV header: {e}")))?;
    for obs in observations {
        w.write_record([
            obs.date.format("%Y-%m-%d").to_string(),
            obs.component.clone(),
            obs.level.map(|v| format!("{v:.6}")).unwrap_or_default(),
            obs.weight.map(|v| format!("{v:.8}")).unwrap_or_default(),
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write levels CSV row: {e}")))?;
    }
    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush levels CSV: {e}")))?;
    Ok(())
}

/// Dates of a series as `YYYY-MM` labels (used by plot axes).
pub fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
