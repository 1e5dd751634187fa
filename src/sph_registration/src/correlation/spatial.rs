//! 3D phase correlation of voxelized clouds.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{RegistrationError, Result};

/// Magnitudes below this are left unnormalized in the cross-power spectrum.
pub const CROSS_POWER_EPSILON: f64 = 1e-12;

/// Cross-correlation of two cubic grids of equal size.
///
/// Implementations return `c[s] = sum_x f(x) g(x - s)` over cyclic shifts `s`,
/// optionally whitened to unit magnitude in the frequency domain.
pub trait SpatialCorrelation: Send {
    fn voxels_per_dim(&self) -> usize;

    fn correlate(&mut self, f: &[f64], g: &[f64], normalize: bool) -> Result<Vec<f64>>;
}

/// Shift a cyclic correlation so zero offset sits at index `n/2` per axis.
pub fn center_zero_offset(values: &[f64], n: usize) -> Vec<f64> {
    let half = n / 2;
    let mut out = vec![0.0; values.len()];
    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                let src = (x * n + y) * n + z;
                let dst = (((x + half) % n) * n + (y + half) % n) * n + (z + half) % n;
                out[dst] = values[src];
            }
        }
    }
    out
}

/// FFT-based correlation on the CPU.
pub struct SpatialCorrelationCpu {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for SpatialCorrelationCpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialCorrelationCpu")
            .field("n", &self.n)
            .finish()
    }
}

impl SpatialCorrelationCpu {
    pub fn new(voxels_per_dim: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n: voxels_per_dim,
            forward: planner.plan_fft_forward(voxels_per_dim),
            inverse: planner.plan_fft_inverse(voxels_per_dim),
        }
    }

    fn fft3(&self, data: &mut [Complex<f64>], fft: &Arc<dyn Fft<f64>>) {
        let n = self.n;
        let mut line = vec![Complex::new(0.0, 0.0); n];
        // z is contiguous
        for chunk in data.chunks_mut(n) {
            fft.process(chunk);
        }
        for stride in [n, n * n] {
            for base in 0..n * n * n {
                // First element of each line along the axis with this stride.
                if (base / stride) % n != 0 {
                    continue;
                }
                for (k, v) in line.iter_mut().enumerate() {
                    *v = data[base + k * stride];
                }
                fft.process(&mut line);
                for (k, v) in line.iter().enumerate() {
                    data[base + k * stride] = *v;
                }
            }
        }
    }
}

impl SpatialCorrelation for SpatialCorrelationCpu {
    fn voxels_per_dim(&self) -> usize {
        self.n
    }

    fn correlate(&mut self, f: &[f64], g: &[f64], normalize: bool) -> Result<Vec<f64>> {
        let len = self.n.pow(3);
        for grid in [f, g] {
            if grid.len() != len {
                return Err(RegistrationError::SignalLengthMismatch {
                    expected: len,
                    actual: grid.len(),
                });
            }
        }

        let to_complex = |v: &[f64]| -> Vec<Complex<f64>> {
            v.iter().map(|x| Complex::new(*x, 0.0)).collect()
        };
        let mut fs = to_complex(f);
        let mut gs = to_complex(g);
        self.fft3(&mut fs, &self.forward);
        self.fft3(&mut gs, &self.forward);

        for (a, b) in fs.iter_mut().zip(&gs) {
            let mut c = *a * b.conj();
            if normalize {
                let mag = c.norm();
                if mag > CROSS_POWER_EPSILON {
                    c /= mag;
                }
            }
            *a = c;
        }

        self.fft3(&mut fs, &self.inverse);
        let scale = 1.0 / len as f64;
        Ok(fs.into_iter().map(|c| c.re * scale).collect())
    }
}
