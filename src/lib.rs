//! `core-cpi` library crate.
//!
//! Computes three core inflation measures from a weighted basket of CPI
//! components: a weighted trimmed mean (CPI-trim), a weighted median
//! (CPI-median) and a common-factor measure (CPI-common).
//!
//! The binary (`corecpi`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the estimators are reusable from other front-ends (TUI, notebooks, etc.)

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod series;
pub mod telemetry;
pub mod tui;
