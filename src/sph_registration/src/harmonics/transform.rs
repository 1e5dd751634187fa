//! Forward spherical harmonic transform on the equiangular grid.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::legendre::{quadrature_weights, LegendreTable};
use crate::error::{RegistrationError, Result};

/// Spherical harmonic coefficients `f_lm` for `l < b`, `-l <= m <= l`.
///
/// Stored in a flat array of length `b^2`: non-negative orders first, each as
/// a run over `l = m..b`, then negative orders from `-(b-1)` up to `-1` so
/// that the lowest orders sit at both ends of the array.
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalCoefficients {
    bandwidth: usize,
    data: Vec<Complex<f64>>,
}

impl SphericalCoefficients {
    pub fn zeros(bandwidth: usize) -> Self {
        Self {
            bandwidth,
            data: vec![Complex::new(0.0, 0.0); bandwidth * bandwidth],
        }
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    /// Flat index of `(l, m)`.
    pub fn index(&self, l: usize, m: i64) -> usize {
        let b = self.bandwidth;
        let am = m.unsigned_abs() as usize;
        debug_assert!(am <= l && l < b);
        if m >= 0 {
            // Orders 0..am hold b, b-1, ... entries.
            am * b - am * am.saturating_sub(1) / 2 + (l - am)
        } else {
            let tail: usize = (1..=am).map(|k| b - k).sum();
            b * b - tail + (l - am)
        }
    }

    pub fn get(&self, l: usize, m: i64) -> Complex<f64> {
        self.data[self.index(l, m)]
    }

    pub fn set(&mut self, l: usize, m: i64, value: Complex<f64>) {
        let idx = self.index(l, m);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[Complex<f64>] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex<f64>] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sum of `|f_lm|^2`.
    pub fn energy(&self) -> f64 {
        self.data.iter().map(|c| c.norm_sqr()).sum()
    }
}

/// Precomputed forward transform for one bandwidth.
pub struct SphericalTransform {
    bandwidth: usize,
    weights: Vec<f64>,
    legendre: Vec<LegendreTable>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for SphericalTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SphericalTransform")
            .field("bandwidth", &self.bandwidth)
            .finish()
    }
}

impl SphericalTransform {
    pub fn new(bandwidth: usize) -> Self {
        let n = 2 * bandwidth;
        let legendre = (0..n)
            .map(|j| {
                let theta = PI * (2 * j + 1) as f64 / (4 * bandwidth) as f64;
                LegendreTable::new(bandwidth, theta.cos())
            })
            .collect();
        let fft = FftPlanner::new().plan_fft_forward(n);

        Self {
            bandwidth,
            weights: quadrature_weights(bandwidth),
            legendre,
            fft,
        }
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    /// Expected signal length, `(2b)^2`.
    pub fn signal_len(&self) -> usize {
        4 * self.bandwidth * self.bandwidth
    }

    /// Project a grid signal onto the spherical harmonics.
    ///
    /// # Errors
    /// [`RegistrationError::SignalLengthMismatch`] unless the signal has one
    /// value per grid cell.
    pub fn forward(&self, signal: &[f64]) -> Result<SphericalCoefficients> {
        if signal.len() != self.signal_len() {
            return Err(RegistrationError::SignalLengthMismatch {
                expected: self.signal_len(),
                actual: signal.len(),
            });
        }
        let b = self.bandwidth;
        let n = 2 * b;
        let azimuth_step = 2.0 * PI / n as f64;
        let mut coeffs = SphericalCoefficients::zeros(b);
        let mut ring = vec![Complex::new(0.0, 0.0); n];

        for (j, table) in self.legendre.iter().enumerate() {
            for (k, value) in ring.iter_mut().enumerate() {
                *value = Complex::new(signal[j * n + k], 0.0);
            }
            // ring[m mod n] = sum_k f e^{-i m phi_k}
            self.fft.process(&mut ring);

            let w = self.weights[j] * azimuth_step;
            for m in -(b as i64 - 1)..(b as i64) {
                let fm = ring[m.rem_euclid(n as i64) as usize] * w;
                for l in m.unsigned_abs() as usize..b {
                    let idx = coeffs.index(l, m);
                    coeffs.data[idx] += fm * table.signed(l, m);
                }
            }
        }

        Ok(coeffs)
    }
}
