//! Terminal reports: run diagnostics and the final core table.

pub mod format;

pub use format::*;
