//! Cross-spectra of spherical coefficients and their synthesis on SO(3).
//!
//! For the rotation `R = Rz(alpha) Ry(beta) Rz(gamma)` the correlation of two
//! band-limited signals expands as
//!
//! ```text
//! C(alpha, beta, gamma) = sum_{m, m'} e^{i m alpha} e^{i m' gamma} S_beta(m, m')
//! S_beta(m, m') = sum_l f_lm conj(h_lm') d^l_{m m'}(beta)
//! ```
//!
//! so every `beta` ring is an unnormalized 2D inverse DFT of its slice.

use std::f64::consts::PI;

use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::harmonics::{wigner_d_series, SphericalCoefficients};

/// Polar angle of ring `j` of the SO(3) grid.
pub fn beta_at(bandwidth: usize, j: usize) -> f64 {
    PI * (2 * j + 1) as f64 / (4 * bandwidth) as f64
}

/// Cross-spectrum slice of one `beta`, laid out `[m mod 2b][m' mod 2b]`.
///
/// Channels are summed with `weights`.
pub fn cross_spectrum_slice(
    f: &[SphericalCoefficients],
    h: &[SphericalCoefficients],
    weights: &[f64],
    beta: f64,
) -> Vec<Complex<f64>> {
    let b = f.first().map(|c| c.bandwidth()).unwrap_or(0);
    let n = 2 * b;
    let bi = b as i64;
    let mut slice = vec![Complex::new(0.0, 0.0); n * n];
    let mut d = vec![0.0; b];

    for m in -(bi - 1)..bi {
        for mp in -(bi - 1)..bi {
            wigner_d_series(m, mp, beta, &mut d);
            let l0 = m.unsigned_abs().max(mp.unsigned_abs()) as usize;
            let mut acc = Complex::new(0.0, 0.0);
            for (l, dl) in d.iter().enumerate().skip(l0) {
                for ((fc, hc), w) in f.iter().zip(h).zip(weights) {
                    acc += fc.get(l, m) * hc.get(l, mp).conj() * (*w * dl);
                }
            }
            let row = m.rem_euclid(n as i64) as usize;
            let col = mp.rem_euclid(n as i64) as usize;
            slice[row * n + col] = acc;
        }
    }
    slice
}

/// Cross-spectrum slices of all `2b` rings, computed in parallel.
pub fn cross_spectra(
    f: &[SphericalCoefficients],
    h: &[SphericalCoefficients],
    weights: &[f64],
) -> Vec<Vec<Complex<f64>>> {
    let b = f.first().map(|c| c.bandwidth()).unwrap_or(0);
    (0..2 * b)
        .into_par_iter()
        .map(|j| cross_spectrum_slice(f, h, weights, beta_at(b, j)))
        .collect()
}

/// Synthesize the real correlation surface from its slices on the CPU.
///
/// Output layout is `[beta][alpha][gamma]`.
pub fn synthesize(bandwidth: usize, slices: &[Vec<Complex<f64>>]) -> Vec<f64> {
    let n = 2 * bandwidth;
    let ifft = FftPlanner::<f64>::new().plan_fft_inverse(n);

    slices
        .par_iter()
        .flat_map_iter(|slice| {
            let mut grid = slice.clone();
            // Along m' for each m: T[m][gamma]
            for row in grid.chunks_mut(n) {
                ifft.process(row);
            }
            // Along m for each gamma: C[alpha][gamma]
            let mut column = vec![Complex::new(0.0, 0.0); n];
            for g in 0..n {
                for (m, c) in column.iter_mut().enumerate() {
                    *c = grid[m * n + g];
                }
                ifft.process(&mut column);
                for (a, c) in column.iter().enumerate() {
                    grid[a * n + g] = *c;
                }
            }
            grid.into_iter().map(|c| c.re)
        })
        .collect()
}
