//! Error types.
//!
//! - `AppError`: what the binary reports (message + process exit code).
//! - `MeasureError`: typed failures raised by the estimators. Most are recovered
//!   locally by excluding a date or a component; `UndeterminedFactor` aborts the
//!   common-factor measure only.
//!
//! Exit codes:
//! - 2: usage, configuration, or I/O problems
//! - 3: the data is insufficient to produce the requested output
//! - 4: internal/runtime failures (terminal, numerical breakdown)

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Estimator-level failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("Missing data for {component} at {date}: {what}")]
    MissingData {
        date: NaiveDate,
        component: String,
        what: &'static str,
    },

    #[error("Degenerate distribution at {date}: {reason}")]
    DegenerateDistribution { date: NaiveDate, reason: String },

    #[error(
        "Common factor is undetermined: {components} usable component(s) over {dates} complete date(s) (need >= 2 and >= 3)"
    )]
    UndeterminedFactor { components: usize, dates: usize },

    #[error("Non-finite {what} for {component} at {date}")]
    NonFiniteValue {
        date: NaiveDate,
        component: String,
        what: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

/// Result type for estimator operations.
pub type MeasureResult<T> = std::result::Result<T, MeasureError>;

impl From<MeasureError> for AppError {
    fn from(err: MeasureError) -> Self {
        let code = match &err {
            MeasureError::InvalidConfig(_) => 2,
            MeasureError::Numerical(_) => 4,
            MeasureError::MissingData { .. }
            | MeasureError::DegenerateDistribution { .. }
            | MeasureError::UndeterminedFactor { .. }
            | MeasureError::NonFiniteValue { .. } => 3,
        };
        AppError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_errors_map_to_exit_codes() {
        let cfg: AppError = MeasureError::InvalidConfig("bad window".into()).into();
        assert_eq!(cfg.exit_code(), 2);

        let factor: AppError = MeasureError::UndeterminedFactor { components: 1, dates: 10 }.into();
        assert_eq!(factor.exit_code(), 3);
        assert!(factor.to_string().contains("1 usable component"));
    }
}
