//! Weighted mixture of Bingham distributions.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::bingham::Bingham;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinghamMixture {
    components: Vec<Bingham>,
    weights: Vec<f64>,
}

impl BinghamMixture {
    /// Create a mixture. Weights are normalized to sum to one.
    ///
    /// # Panics
    /// If the component and weight counts differ, the mixture is empty, or
    /// the components have different dimensions.
    pub fn new(components: Vec<Bingham>, weights: Vec<f64>) -> Self {
        assert_eq!(components.len(), weights.len(), "BinghamMixture: weight count");
        assert!(!components.is_empty(), "BinghamMixture: no components");
        let dim = components[0].dim();
        assert!(
            components.iter().all(|c| c.dim() == dim),
            "BinghamMixture: dimension mismatch"
        );
        let total: f64 = weights.iter().sum();
        let weights = weights.into_iter().map(|w| w / total).collect();
        Self {
            components,
            weights,
        }
    }

    pub fn components(&self) -> &[Bingham] {
        &self.components
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }

    /// Mode of the heaviest component.
    pub fn mode(&self) -> DVector<f64> {
        let best = self
            .weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.components[best].mode()
    }

    /// Weighted sum of the component second moments.
    pub fn moment(&self) -> DMatrix<f64> {
        let dim = self.dim();
        self.components
            .iter()
            .zip(&self.weights)
            .fold(DMatrix::zeros(dim, dim), |acc, (c, w)| acc + c.moment() * *w)
    }

    pub fn pdf(&self, x: &DVector<f64>) -> f64 {
        self.components
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| w * c.pdf(x))
            .sum()
    }
}
