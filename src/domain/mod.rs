//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw inputs and derived per-component changes (`RawObservation`, `ComponentChange`)
//! - per-period weighted distributions (`WeightedDistribution`)
//! - estimator outputs (`CoreMeasure`, `RegressionFit`, `CoreSeries`)
//! - configuration (`EstimatorConfig`, `RunConfig`, `SampleConfig`)

pub mod types;

pub use types::*;
