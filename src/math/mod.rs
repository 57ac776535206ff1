//! Mathematical utilities: least squares, principal components, weighted
//! order statistics.

pub mod ols;
pub mod pca;
pub mod quantile;

pub use ols::*;
pub use pca::*;
pub use quantile::*;
