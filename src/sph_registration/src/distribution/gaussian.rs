//! Multivariate Gaussian fitted from weighted samples.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gaussian {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
}

impl Gaussian {
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Self {
        Self { mean, cov }
    }

    /// Weighted mean and covariance of samples stored as matrix columns.
    ///
    /// Returns `None` when there are no samples or the weights sum to zero.
    pub fn fit_weighted(samples: &DMatrix<f64>, weights: &[f64]) -> Option<Self> {
        let total: f64 = weights.iter().sum();
        if samples.ncols() == 0 || samples.ncols() != weights.len() || total <= 0.0 {
            return None;
        }
        let dim = samples.nrows();

        let mut mean = DVector::<f64>::zeros(dim);
        for (col, w) in samples.column_iter().zip(weights) {
            mean += col * (*w / total);
        }

        let mut cov = DMatrix::<f64>::zeros(dim, dim);
        for (col, w) in samples.column_iter().zip(weights) {
            let d = col - &mean;
            cov += (&d * d.transpose()) * (*w / total);
        }

        Some(Self { mean, cov })
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Add `variance` to every diagonal entry.
    pub fn inflate(&mut self, variance: f64) {
        for i in 0..self.dim() {
            self.cov[(i, i)] += variance;
        }
    }
}
