//! Equiangular sampling grid on the unit sphere.
//!
//! For bandwidth `b` the grid has `2b` polar angles
//! `theta_j = pi (2j + 1) / 4b` and `2b` azimuths `phi_k = pi k / b`.
//! Cells are stored polar-major: index `j * 2b + k`.

use std::f64::consts::PI;

/// Precomputed grid directions for one bandwidth.
#[derive(Debug, Clone)]
pub struct SphericalGrid {
    bandwidth: usize,
    thetas: Vec<f64>,
    phis: Vec<f64>,
    directions: Vec<[f32; 3]>,
}

impl SphericalGrid {
    pub fn new(bandwidth: usize) -> Self {
        let n = 2 * bandwidth;
        let thetas: Vec<f64> = (0..n)
            .map(|j| PI * (2 * j + 1) as f64 / (4 * bandwidth) as f64)
            .collect();
        let phis: Vec<f64> = (0..n).map(|k| PI * k as f64 / bandwidth as f64).collect();

        let mut directions = Vec::with_capacity(n * n);
        for &theta in &thetas {
            let (st, ct) = theta.sin_cos();
            for &phi in &phis {
                let (sp, cp) = phi.sin_cos();
                directions.push([(st * cp) as f32, (st * sp) as f32, ct as f32]);
            }
        }

        Self {
            bandwidth,
            thetas,
            phis,
            directions,
        }
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    /// Number of samples per angle, `2b`.
    pub fn side(&self) -> usize {
        2 * self.bandwidth
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    pub fn phis(&self) -> &[f64] {
        &self.phis
    }

    /// Cartesian unit vectors in grid order.
    pub fn directions(&self) -> &[[f32; 3]] {
        &self.directions
    }
}
