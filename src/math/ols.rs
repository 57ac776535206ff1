//! Least squares solver and simple linear regression.
//!
//! The common-factor measure rescales a dimensionless factor score back into
//! inflation units with one regression per CPI component:
//!
//! ```text
//! minimize Σ (y_i - a - b·x_i)^2
//! ```
//!
//! Implementation choices:
//! - We build the `[1, x]` design matrix and solve with SVD, which is robust
//!   when the design is tall (many more dates than parameters).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - A regressor with no variance leaves the slope unidentified; SVD then
//!   returns the minimum-norm solution, which we reject explicitly instead.

use nalgebra::{DMatrix, DVector};

/// Relative variance below which a regressor is considered constant.
const MIN_REGRESSOR_VAR: f64 = 1e-14;

/// Intercept/slope estimate with goodness of fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
}

impl SimpleFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = a + b·x` by ordinary least squares.
///
/// Returns `None` when fewer than two points are given, when any input is
/// non-finite, or when `x` is constant.
pub fn fit_simple(x: &[f64], y: &[f64]) -> Option<SimpleFit> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let var_x = x.iter().map(|v| (v - mean_x).powi(2)).sum::<f64>() / n as f64;
    let scale = x.iter().map(|v| v * v).sum::<f64>() / n as f64;
    if var_x <= MIN_REGRESSOR_VAR * scale.max(1.0) {
        return None;
    }

    let mut design = DMatrix::zeros(n, 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
    }
    let target = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &target)?;

    let fit = SimpleFit {
        intercept: beta[0],
        slope: beta[1],
        r_squared: 0.0,
    };

    let mean_y = y.iter().sum::<f64>() / n as f64;
    let sst: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let sse: f64 = x.iter().zip(y).map(|(&xi, &yi)| (yi - fit.predict(xi)).powi(2)).sum();
    // A constant response is fitted perfectly by the intercept.
    let r_squared = if sst > 0.0 { (1.0 - sse / sst).clamp(0.0, 1.0) } else { 1.0 };

    Some(SimpleFit { r_squared, ..fit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn simple_fit_recovers_line_and_r2() {
        let x = [-1.5, -0.5, 0.0, 0.5, 1.5];
        let y: Vec<f64> = x.iter().map(|v| 0.02 + 0.004 * v).collect();
        let fit = fit_simple(&x, &y).unwrap();
        assert!((fit.intercept - 0.02).abs() < 1e-12);
        assert!((fit.slope - 0.004).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn simple_fit_rejects_constant_regressor() {
        assert!(fit_simple(&[1.0, 1.0, 1.0], &[0.1, 0.2, 0.3]).is_none());
        assert!(fit_simple(&[1.0], &[0.1]).is_none());
        assert!(fit_simple(&[0.0, f64::NAN], &[0.1, 0.2]).is_none());
    }

    #[test]
    fn constant_response_has_zero_slope() {
        let fit = fit_simple(&[-1.0, 0.0, 1.0], &[0.03, 0.03, 0.03]).unwrap();
        assert!(fit.slope.abs() < 1e-12);
        assert!((fit.intercept - 0.03).abs() < 1e-12);
    }
}
