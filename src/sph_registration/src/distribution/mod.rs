//! Probability models for registration uncertainty.
//!
//! Rotations are uncertain on the quaternion hypersphere, where the Bingham
//! family respects the `q ~ -q` symmetry. Translations use Gaussians.

pub mod bingham;
pub mod bingham_mixture;
pub mod gaussian;
pub mod gaussian_mixture;
pub mod normalization;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

pub use bingham::Bingham;
pub use bingham_mixture::BinghamMixture;
pub use gaussian::Gaussian;
pub use gaussian_mixture::GaussianMixture;

/// Uncertainty estimate attached to a registration result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UncertaintyDistribution {
    Bingham(Bingham),
    BinghamMixture(BinghamMixture),
    Gaussian(Gaussian),
    GaussianMixture(GaussianMixture),
}

impl UncertaintyDistribution {
    /// Covariance for Gaussian models, second moment for Bingham models.
    pub fn covariance(&self) -> DMatrix<f64> {
        match self {
            Self::Bingham(b) => b.moment(),
            Self::BinghamMixture(b) => b.moment(),
            Self::Gaussian(g) => g.cov().clone(),
            Self::GaussianMixture(g) => g.mixture_cov(),
        }
    }

    pub fn trace(&self) -> f64 {
        self.covariance().trace()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bingham(_) => "bingham",
            Self::BinghamMixture(_) => "bmm",
            Self::Gaussian(_) => "gaussian",
            Self::GaussianMixture(_) => "gmm",
        }
    }
}
