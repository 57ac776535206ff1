//! Interactive input picker for `corecpi run` without `--input`.
//!
//! The picker lists candidate level tables (`*.csv`) under the working
//! directory. Core tables this tool exported earlier (`core_inflation_*.csv`)
//! are not inputs and are left out of the list.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

const SEARCH_DEPTH: usize = 4;
const EXPORT_PREFIX: &str = "core_inflation_";

/// Ask the user to pick a level table from stdin.
///
/// Accepts a list number or an explicit path; `q` cancels.
pub fn prompt_for_csv_path() -> Result<PathBuf, AppError> {
    let files = discover_input_files(Path::new("."));
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No input CSV found. Provide one with `corecpi run -f <levels.csv>` or try `corecpi demo`.",
        ));
    }

    println!("Found {} candidate CPI table(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Levels CSV [1-{}, path, q]: ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let Some(line) = lines.next() else {
            return Err(AppError::new(2, "No selection made. Pass `-f <levels.csv>`."));
        };
        let line = line.map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        match resolve_choice(line.trim(), &files) {
            Ok(Some(path)) => return Ok(path),
            Ok(None) => return Err(AppError::new(2, "Canceled.")),
            Err(err) => println!("{err}"),
        }
    }
}

/// `Ok(None)` means the user canceled.
fn resolve_choice(input: &str, files: &[PathBuf]) -> Result<Option<PathBuf>, AppError> {
    if input.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if let Ok(choice) = input.parse::<usize>() {
        return match choice.checked_sub(1).and_then(|i| files.get(i)) {
            Some(path) => validate_csv_path(path).map(Some),
            None => Err(AppError::new(2, format!("No entry {choice}; pick 1-{}.", files.len()))),
        };
    }
    validate_csv_path(Path::new(input)).map(Some)
}

/// The path must be an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.is_file() {
        return Err(AppError::new(2, format!("CSV file not found: {}", path.display())));
    }
    if !has_csv_extension(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .csv file (got: {}).", path.display()),
        ));
    }
    Ok(path.to_path_buf())
}

/// Candidate input tables under `root`, sorted by display path.
pub fn discover_input_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, 0, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if !matches!(name, ".git" | "target" | "node_modules") {
                walk(&path, depth + 1, out);
            }
        } else if file_type.is_file() && has_csv_extension(&path) && !is_core_export(&path) {
            out.push(path);
        }
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn is_core_export(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with(EXPORT_PREFIX))
}

fn pretty_path(path: &Path) -> String {
    path.strip_prefix("./").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("corecpi-picker-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("nested")).unwrap();
        dir
    }

    #[test]
    fn discovery_skips_exports_and_non_csv() {
        let dir = scratch_dir("discover");
        fs::write(dir.join("levels.csv"), "date,component,level\n").unwrap();
        fs::write(dir.join("nested").join("weights.CSV"), "date,component,weight\n").unwrap();
        fs::write(dir.join("core_inflation_20240101.csv"), "date\n").unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();

        let found = discover_input_files(&dir);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["levels.csv", "weights.CSV"]);

        assert_eq!(resolve_choice("1", &found).unwrap(), Some(found[0].clone()));
        assert_eq!(resolve_choice("Q", &found).unwrap(), None);
        assert!(resolve_choice("3", &found).is_err());
        assert!(validate_csv_path(&dir.join("notes.txt")).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
