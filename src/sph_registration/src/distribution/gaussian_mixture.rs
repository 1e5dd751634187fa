//! Gaussian mixture with moment-matched summary statistics.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::gaussian::Gaussian;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianMixture {
    components: Vec<Gaussian>,
    weights: Vec<f64>,
}

impl GaussianMixture {
    /// Create a mixture. Weights are normalized to sum to one.
    ///
    /// # Panics
    /// If the counts differ or the mixture is empty.
    pub fn new(components: Vec<Gaussian>, weights: Vec<f64>) -> Self {
        assert_eq!(components.len(), weights.len(), "GaussianMixture: weight count");
        assert!(!components.is_empty(), "GaussianMixture: no components");
        let total: f64 = weights.iter().sum();
        let weights = weights.into_iter().map(|w| w / total).collect();
        Self {
            components,
            weights,
        }
    }

    pub fn components(&self) -> &[Gaussian] {
        &self.components
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }

    pub fn mixture_mean(&self) -> DVector<f64> {
        self.components
            .iter()
            .zip(&self.weights)
            .fold(DVector::zeros(self.dim()), |acc, (c, w)| acc + c.mean() * *w)
    }

    /// Covariance of the mixture: `sum w (S + m m') - mu mu'`.
    pub fn mixture_cov(&self) -> DMatrix<f64> {
        let dim = self.dim();
        let mu = self.mixture_mean();
        let second = self
            .components
            .iter()
            .zip(&self.weights)
            .fold(DMatrix::zeros(dim, dim), |acc, (c, w)| {
                acc + (c.cov() + c.mean() * c.mean().transpose()) * *w
            });
        second - &mu * mu.transpose()
    }
}
