//! Least-squares polynomial regression.

use serde::{Deserialize, Serialize};

const PIVOT_EPSILON: f64 = 1e-12;

/// A polynomial stored lowest power first: `c0 + c1*x + c2*x^2 + ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn zero() -> Self {
        Self {
            coefficients: vec![0.0],
        }
    }

    /// Fit `ys ≈ p(xs)` by least squares.
    ///
    /// The requested degree is lowered to `distinct(xs) - 1` when the
    /// samples cannot determine it, so the fit never fails. No samples
    /// yield the zero polynomial.
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Self {
        let n = xs.len().min(ys.len());
        let distinct = count_distinct(&xs[..n]);
        if distinct == 0 {
            log::warn!("Polynomial fit over no samples, using the zero polynomial");
            return Self::zero();
        }
        let effective = degree.min(distinct - 1);
        if effective < degree {
            log::warn!(
                "Polynomial fit is poorly conditioned: {distinct} distinct x values, \
                 degree lowered from {degree} to {effective}"
            );
        }

        let size = effective + 1;
        // Normal equations: (VᵀV) c = Vᵀy
        let mut matrix = vec![vec![0.0; size + 1]; size];
        for (&x, &y) in xs[..n].iter().zip(&ys[..n]) {
            let powers: Vec<f64> = (0..size).map(|p| x.powi(p as i32)).collect();
            for row in 0..size {
                for col in 0..size {
                    matrix[row][col] += powers[row] * powers[col];
                }
                matrix[row][size] += powers[row] * y;
            }
        }

        Self {
            coefficients: solve(matrix),
        }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

fn count_distinct(xs: &[f64]) -> usize {
    let mut sorted: Vec<f64> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    sorted.len()
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
/// Columns without a usable pivot get a zero coefficient.
fn solve(mut matrix: Vec<Vec<f64>>) -> Vec<f64> {
    let size = matrix.len();
    for col in 0..size {
        let pivot_row = (col..size)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);
        matrix.swap(col, pivot_row);
        let pivot = matrix[col][col];
        if pivot.abs() < PIVOT_EPSILON {
            continue;
        }
        for row in col + 1..size {
            let factor = matrix[row][col] / pivot;
            for k in col..=size {
                matrix[row][k] -= factor * matrix[col][k];
            }
        }
    }

    let mut solution = vec![0.0; size];
    for row in (0..size).rev() {
        let pivot = matrix[row][row];
        if pivot.abs() < PIVOT_EPSILON {
            continue;
        }
        let tail: f64 = (row + 1..size).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (matrix[row][size] - tail) / pivot;
    }
    solution
}
