// src/utils/linalg.rs
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::core::{ExplainError, Result};

/// Solves `min_b Σ w_i (y_i - x_i·b)^2` without an intercept column.
///
/// Rows with a weight below `1e-12` do not contribute. Without the `linalg`
/// feature the normal equations are solved by Gaussian elimination, with a
/// small ridge term added when the system is singular.
pub fn weighted_least_squares(
    features: ArrayView2<f64>,
    target: ArrayView1<f64>,
    weights: ArrayView1<f64>,
) -> Result<Array1<f64>> {
    let n_samples = features.nrows();
    let n_coeffs = features.ncols();
    if target.len() != n_samples || weights.len() != n_samples {
        return Err(ExplainError::IncompatibleDimensions(format!(
            "WLS got {} rows, {} targets and {} weights",
            n_samples,
            target.len(),
            weights.len()
        )));
    }
    if n_coeffs == 0 {
        return Ok(Array1::zeros(0));
    }

    let effective_samples = weights.iter().filter(|&&w| w > 1e-12).count();
    if effective_samples < n_coeffs {
        return Err(ExplainError::Numerical(format!(
            "Underdetermined system in WLS: {} effective samples, {} coefficients to solve.",
            effective_samples, n_coeffs
        )));
    }

    let mut x_w = Array2::zeros((n_samples, n_coeffs));
    let mut y_w = Array1::zeros(n_samples);
    for i in 0..n_samples {
        let sqrt_w = if weights[i] > 1e-12 { weights[i].sqrt() } else { 0.0 };
        for j in 0..n_coeffs {
            x_w[[i, j]] = features[[i, j]] * sqrt_w;
        }
        y_w[i] = target[i] * sqrt_w;
    }

    #[cfg(feature = "linalg")]
    {
        use ndarray_linalg::LeastSquaresSvd;
        let results = x_w
            .least_squares(&y_w)
            .map_err(|e| ExplainError::Numerical(format!("WLS solver SVD failed: {}", e)))?;
        if results.rank < n_coeffs as i32 {
            tracing::warn!(rank = results.rank, n_coeffs, "rank deficient WLS system");
        }
        Ok(results.solution)
    }
    #[cfg(not(feature = "linalg"))]
    {
        let xtx = x_w.t().dot(&x_w);
        let xty = x_w.t().dot(&y_w);
        match solve(xtx.clone(), xty.clone()) {
            Ok(solution) => Ok(solution),
            Err(_) => {
                let trace: f64 = xtx.diag().sum();
                let ridge = 1e-10 * (trace / n_coeffs as f64).max(1.0);
                tracing::warn!(ridge, "singular WLS normal equations, retrying with ridge term");
                let mut regularized = xtx;
                for j in 0..n_coeffs {
                    regularized[[j, j]] += ridge;
                }
                solve(regularized, xty)
            }
        }
    }
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
pub fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(ExplainError::IncompatibleDimensions(format!(
            "solve needs a square system, got {}x{} with {} right-hand values",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1e-300);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() <= 1e-12 * scale {
            return Err(ExplainError::Numerical(format!(
                "singular matrix at column {}",
                col
            )));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[[row, k]] * x[k];
        }
        x[row] = acc / a[[row, row]];
    }
    Ok(x)
}
