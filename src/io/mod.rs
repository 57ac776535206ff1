//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - core table export and re-read (`export`)
//! - JSON run summary (`summary`)
//! - injectable date source for file stamps (`clock`)

pub mod clock;
pub mod export;
pub mod ingest;
pub mod summary;

pub use clock::*;
pub use export::*;
pub use ingest::*;
pub use summary::*;
