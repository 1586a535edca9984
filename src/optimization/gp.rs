//! Gaussian-process surrogate and acquisition functions
//!
//! Inputs live in the unit cube produced by [`SearchSpace::encode`](super::SearchSpace::encode).
//! Targets are standardized before fitting, so the RBF kernel runs with unit signal variance.

use crate::{Error, Result};
use std::f64::consts::{PI, SQRT_2};

const DEFAULT_LENGTH_SCALE: f64 = 0.5;
const DEFAULT_NOISE: f64 = 1e-6;
const MAX_JITTER_ATTEMPTS: usize = 6;
const MIN_STD: f64 = 1e-9;

/// How to score a candidate from the posterior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    /// Expected improvement over the incumbent, with exploration margin `xi`
    ExpectedImprovement {
        /// Exploration margin in score units
        xi: f64,
    },
    /// `mean + kappa * std`
    UpperConfidenceBound {
        /// Exploration weight
        kappa: f64,
    },
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::ExpectedImprovement { xi: 0.01 }
    }
}

impl Acquisition {
    /// Score a posterior `(mean, std)` against the best observed score (larger is better).
    #[must_use]
    pub fn score(self, mean: f64, std: f64, best: f64) -> f64 {
        match self {
            Self::ExpectedImprovement { xi } => {
                let improvement = mean - best - xi;
                if std < MIN_STD {
                    return improvement.max(0.0);
                }
                let z = improvement / std;
                improvement.mul_add(normal_cdf(z), std * normal_pdf(z))
            }
            Self::UpperConfidenceBound { kappa } => kappa.mul_add(std, mean),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExpectedImprovement { .. } => "EI",
            Self::UpperConfidenceBound { .. } => "UCB",
        }
    }
}

/// Exact GP regression with an RBF kernel.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    points: Vec<Vec<f64>>,
    /// Lower Cholesky factor of `K + jitter * I`
    chol: Vec<Vec<f64>>,
    /// `K^-1 y` on standardized targets
    alpha: Vec<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    /// Fit with the default length scale and noise.
    ///
    /// # Errors
    ///
    /// See [`GaussianProcess::fit_with`].
    pub fn fit(points: &[Vec<f64>], scores: &[f64]) -> Result<Self> {
        Self::fit_with(points, scores, DEFAULT_LENGTH_SCALE, DEFAULT_NOISE)
    }

    /// Fit on `points` (rows of equal width) and their `scores`.
    ///
    /// Jitter on the diagonal is raised tenfold until the Cholesky factorization succeeds.
    ///
    /// # Errors
    ///
    /// Returns an optimization error for empty or mismatched inputs, non-finite scores, or a
    /// kernel matrix that stays singular.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit_with(points: &[Vec<f64>], scores: &[f64], length_scale: f64, noise: f64) -> Result<Self> {
        if points.is_empty() || points.len() != scores.len() {
            return Err(Error::Optimization(format!(
                "Cannot fit surrogate on {} points and {} scores",
                points.len(),
                scores.len()
            )));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(Error::Optimization(
                "Cannot fit surrogate on non-finite scores".to_string(),
            ));
        }

        let n = scores.len() as f64;
        let y_mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if variance.sqrt() > MIN_STD { variance.sqrt() } else { 1.0 };
        let y: Vec<f64> = scores.iter().map(|s| (s - y_mean) / y_std).collect();

        let kernel: Vec<Vec<f64>> = points
            .iter()
            .map(|a| points.iter().map(|b| rbf(a, b, length_scale)).collect())
            .collect();

        let mut jitter = noise;
        for _ in 0..MAX_JITTER_ATTEMPTS {
            if let Some(chol) = cholesky(&kernel, jitter) {
                let alpha = solve_upper_transposed(&chol, &solve_lower(&chol, &y));
                return Ok(Self {
                    points: points.to_vec(),
                    chol,
                    alpha,
                    length_scale,
                    y_mean,
                    y_std,
                });
            }
            jitter *= 10.0;
        }
        Err(Error::Optimization(format!(
            "Surrogate kernel matrix is singular (jitter up to {jitter:e})"
        )))
    }

    /// Posterior `(mean, std)` at `x`, in score units.
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star: Vec<f64> = self
            .points
            .iter()
            .map(|p| rbf(p, x, self.length_scale))
            .collect();
        let mean = dot(&k_star, &self.alpha);
        let v = solve_lower(&self.chol, &k_star);
        let variance = (1.0 - dot(&v, &v)).max(0.0);
        (
            mean.mul_add(self.y_std, self.y_mean),
            variance.sqrt() * self.y_std,
        )
    }
}

fn rbf(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-0.5 * sq / (length_scale * length_scale)).exp()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cholesky(matrix: &[Vec<f64>], jitter: f64) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = matrix[i][i] + jitter - sum;
                if d <= 0.0 || !d.is_finite() {
                    return None;
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Some(l)
}

/// Solve `L x = b` by forward substitution.
fn solve_lower(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let mut x = vec![0.0; b.len()];
    for i in 0..b.len() {
        let sum: f64 = (0..i).map(|k| l[i][k] * x[k]).sum();
        x[i] = (b[i] - sum) / l[i][i];
    }
    x
}

/// Solve `L^T x = b` by back substitution.
fn solve_upper_transposed(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (b[i] - sum) / l[i][i];
    }
    x
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7
fn erf(x: f64) -> f64 {
    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / 0.327_591_1f64.mul_add(x, 1.0);
    let poly = t * (0.254_829_592
        + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}
