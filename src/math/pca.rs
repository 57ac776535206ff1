//! First principal component of a complete data matrix.
//!
//! Rows are observations (dates), columns are variables (CPI components).
//! Columns are standardized to zero mean and unit population variance, so the
//! eigendecomposition runs on the correlation matrix.
//!
//! The eigenvector's sign is arbitrary. We normalize it so the loadings sum to
//! a non-negative value: for CPI data that orients the factor with inflation
//! rather than against it. Downstream regressions do not depend on the choice.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Population variance below which a column is treated as constant.
const MIN_COLUMN_VAR: f64 = 1e-18;

#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalComponent {
    /// Score per row (observation).
    pub scores: Vec<f64>,
    /// Loading per column (unit-norm eigenvector).
    pub loadings: Vec<f64>,
    pub eigenvalue: f64,
    /// Share of total standardized variance captured by this component.
    pub explained_variance: f64,
}

/// Population standard deviation of each column.
pub fn column_std(m: &DMatrix<f64>) -> Vec<f64> {
    let n = m.nrows() as f64;
    m.column_iter()
        .map(|col| {
            let mean = col.sum() / n;
            (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        })
        .collect()
}

/// Standardize every column to zero mean and unit population variance.
///
/// Returns `None` for fewer than two rows or when any column is constant.
pub fn standardize(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if m.nrows() < 2 || m.ncols() == 0 {
        return None;
    }
    let n = m.nrows() as f64;
    let mut z = m.clone();
    for mut col in z.column_iter_mut() {
        let mean = col.sum() / n;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        if !(var.is_finite() && var > MIN_COLUMN_VAR) {
            return None;
        }
        let sd = var.sqrt();
        col.apply(|v| *v = (*v - mean) / sd);
    }
    Some(z)
}

/// Extract the first principal component of `m`.
pub fn first_principal_component(m: &DMatrix<f64>) -> Option<PrincipalComponent> {
    let z = standardize(m)?;
    let n = z.nrows() as f64;
    let p = z.ncols();

    let corr = (z.transpose() * &z) / n;
    let eig = SymmetricEigen::new(corr);

    let (idx, &eigenvalue) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let mut v: DVector<f64> = eig.eigenvectors.column(idx).into_owned();
    if v.sum() < 0.0 {
        v.neg_mut();
    }

    let scores = &z * &v;
    let explained_variance = eigenvalue / p as f64;

    let pc = PrincipalComponent {
        scores: scores.iter().copied().collect(),
        loadings: v.iter().copied().collect(),
        eigenvalue,
        explained_variance,
    };

    let finite = pc.scores.iter().chain(pc.loadings.iter()).all(|x| x.is_finite());
    if finite && eigenvalue.is_finite() { Some(pc) } else { None }
}
