//! Orthonormal associated Legendre functions and equiangular quadrature.

use std::f64::consts::PI;

/// Table of orthonormal associated Legendre values at one abscissa.
///
/// Entry `(l, m)` for `0 <= m <= l < b` holds `Pbar_l^m(x)`, scaled so that
/// `Y_l^m = Pbar_l^m(cos theta) e^{i m phi}` is orthonormal on the sphere,
/// including the Condon-Shortley phase.
#[derive(Debug, Clone)]
pub struct LegendreTable {
    bandwidth: usize,
    values: Vec<f64>,
}

impl LegendreTable {
    pub fn new(bandwidth: usize, x: f64) -> Self {
        let b = bandwidth;
        let mut values = vec![0.0; b * b];
        let s = (1.0 - x * x).max(0.0).sqrt();
        let mut pmm = (1.0 / (4.0 * PI)).sqrt();

        for m in 0..b {
            if m > 0 {
                let mf = m as f64;
                pmm *= -s * ((2.0 * mf + 1.0) / (2.0 * mf)).sqrt();
            }
            values[m * b + m] = pmm;
            if m + 1 < b {
                values[(m + 1) * b + m] = x * (2.0 * m as f64 + 3.0).sqrt() * pmm;
            }
            for l in (m + 2)..b {
                let lf = l as f64;
                let mf = m as f64;
                let a = ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt();
                let lp = lf - 1.0;
                let bb = ((lp * lp - mf * mf) / (4.0 * lp * lp - 1.0)).sqrt();
                values[l * b + m] = a * (x * values[(l - 1) * b + m] - bb * values[(l - 2) * b + m]);
            }
        }

        Self { bandwidth, values }
    }

    /// `Pbar_l^m` for `m >= 0`.
    #[inline]
    pub fn get(&self, l: usize, m: usize) -> f64 {
        self.values[l * self.bandwidth + m]
    }

    /// Legendre factor of `Y_l^m` for signed `m`.
    #[inline]
    pub fn signed(&self, l: usize, m: i64) -> f64 {
        let am = m.unsigned_abs() as usize;
        let v = self.get(l, am);
        if m < 0 && am % 2 == 1 {
            -v
        } else {
            v
        }
    }
}

/// Quadrature weights of the `2b` polar rings of the equiangular grid.
///
/// Together with the uniform azimuth step `2 pi / 2b` they integrate
/// band-limited functions exactly; the weights sum to two.
pub fn quadrature_weights(bandwidth: usize) -> Vec<f64> {
    let b = bandwidth as f64;
    (0..2 * bandwidth)
        .map(|j| {
            let theta = PI * (2 * j + 1) as f64 / (4.0 * b);
            let series: f64 = (0..bandwidth)
                .map(|k| {
                    let odd = (2 * k + 1) as f64;
                    (odd * theta).sin() / odd
                })
                .sum();
            (2.0 / b) * theta.sin() * series
        })
        .collect()
}
