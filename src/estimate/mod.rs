//! Core inflation estimators.
//!
//! - `distribution`: per-date weighted distributions (and the replicated form)
//! - `trim`: trimmed mean and weighted median per date
//! - `common`: principal-component factor, per-component rescaling, re-weighting

pub mod common;
pub mod distribution;
pub mod trim;

pub use common::{CommonOutput, FactorScores, estimate_common};
pub use distribution::build_distributions;
pub use trim::{SkippedDate, TrimMedianOutput, estimate_trim_median};
