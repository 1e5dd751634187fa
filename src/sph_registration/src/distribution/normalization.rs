//! Bingham normalization constant, second moments and their inversion.
//!
//! The normalization integral of a Bingham density on S^(d-1) is evaluated in
//! coordinates where it separates into circles:
//!
//! - d = 2: a single circle, closed form with modified Bessel functions.
//! - d = 3: `x3 = t` and a circle of radius `sqrt(1 - t^2)`.
//! - d = 4: `|(x1, x2)|^2 = 1 - u`, `|(x3, x4)|^2 = u` and two circles.
//!
//! The remaining one-dimensional integral uses Gauss-Legendre quadrature on
//! panels that are geometrically refined toward both ends, where strongly
//! concentrated densities put all of their mass.
//!
//! Concentrations are shifted so that their maximum is zero before any
//! evaluation; the shift factors out of the moments and keeps every exponent
//! non-positive.

use std::f64::consts::PI;

/// 8-point Gauss-Legendre nodes and weights on [-1, 1].
const GAUSS_LEGENDRE_8: [(f64, f64); 8] = [
    (-0.960_289_856_497_536_3, 0.101_228_536_290_376_3),
    (-0.796_666_477_413_626_7, 0.222_381_034_453_374_5),
    (-0.525_532_409_916_329_0, 0.313_706_645_877_887_3),
    (-0.183_434_642_495_649_8, 0.362_683_783_378_362_0),
    (0.183_434_642_495_649_8, 0.362_683_783_378_362_0),
    (0.525_532_409_916_329_0, 0.313_706_645_877_887_3),
    (0.796_666_477_413_626_7, 0.222_381_034_453_374_5),
    (0.960_289_856_497_536_3, 0.101_228_536_290_376_3),
];

/// Smallest panel width at either end of [0, 1].
const FIRST_PANEL: f64 = 1e-12;

/// Number of uniform panels covering [0.25, 0.75].
const MIDDLE_PANELS: usize = 8;

/// Eigenvalue floor used when inverting moments.
pub const MIN_MOMENT: f64 = 1e-6;

const NEWTON_TOLERANCE: f64 = 1e-10;
const NEWTON_MAX_ITERATIONS: usize = 60;

/// Exponentially scaled modified Bessel function `exp(-|x|) I0(x)`.
///
/// Polynomial approximations from Abramowitz & Stegun 9.8.1 and 9.8.2.
pub fn bessel_i0e(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        let p = 1.0
            + y * (3.515_622_9
                + y * (3.089_942_4
                    + y * (1.206_749_2 + y * (0.265_973_2 + y * (0.036_076_8 + y * 0.004_581_3)))));
        (-ax).exp() * p
    } else {
        let y = 3.75 / ax;
        let p = 0.398_942_28
            + y * (0.013_285_92
                + y * (0.002_253_19
                    + y * (-0.001_575_65
                        + y * (0.009_162_81
                            + y * (-0.020_577_06
                                + y * (0.026_355_37 + y * (-0.016_476_33 + y * 0.003_923_77)))))));
        p / ax.sqrt()
    }
}

/// Exponentially scaled modified Bessel function `exp(-|x|) I1(x)`.
///
/// Polynomial approximations from Abramowitz & Stegun 9.8.3 and 9.8.4.
pub fn bessel_i1e(x: f64) -> f64 {
    let ax = x.abs();
    let r = if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        let p = ax
            * (0.5
                + y * (0.878_905_94
                    + y * (0.514_988_69
                        + y * (0.150_849_34 + y * (0.026_587_33 + y * (0.003_015_32 + y * 0.000_324_11))))));
        p * (-ax).exp()
    } else {
        let y = 3.75 / ax;
        let tail = 0.022_829_67 + y * (-0.028_953_12 + y * (0.017_876_54 - y * 0.004_200_59));
        let p = 0.398_942_28
            + y * (-0.039_880_24 + y * (-0.003_620_18 + y * (0.001_638_01 + y * (-0.010_315_55 + y * tail))));
        p / ax.sqrt()
    };
    if x < 0.0 {
        -r
    } else {
        r
    }
}

/// Integrals over the unit circle of `exp(p cos^2 + q sin^2)`.
///
/// Returns `(total, cos^2 weighted, sin^2 weighted)`. Requires `p, q <= 0`.
fn circle(p: f64, q: f64) -> (f64, f64, f64) {
    let r = 0.5 * (p - q);
    let scale = p.max(q).exp();
    let i0 = bessel_i0e(r);
    let i1 = bessel_i1e(r);
    (
        2.0 * PI * scale * i0,
        PI * scale * (i0 + i1),
        PI * scale * (i0 - i1),
    )
}

fn panels() -> Vec<(f64, f64)> {
    let mut edges = vec![0.0];
    let mut h = FIRST_PANEL;
    while h < 0.25 {
        edges.push(h);
        h *= 2.0;
    }
    for k in 0..=MIDDLE_PANELS {
        edges.push(0.25 + 0.5 * k as f64 / MIDDLE_PANELS as f64);
    }
    let mirrored: Vec<f64> = edges.iter().rev().map(|e| 1.0 - e).collect();
    edges.extend(mirrored);
    edges.sort_by(f64::total_cmp);
    edges.dedup_by(|a, b| (*a - *b).abs() < 1e-15);
    edges.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Integrate a vector-valued integrand over [0, 1].
fn integrate<const N: usize>(f: impl Fn(f64) -> [f64; N]) -> [f64; N] {
    let mut acc = [0.0; N];
    for (a, b) in panels() {
        let c = 0.5 * (a + b);
        let h = 0.5 * (b - a);
        for (x, w) in GAUSS_LEGENDRE_8 {
            let v = f(c + h * x);
            for k in 0..N {
                acc[k] += w * h * v[k];
            }
        }
    }
    acc
}

/// Normalization constant and unnormalized second moments for shifted
/// concentrations (max zero).
fn shifted_integrals(z: &[f64]) -> (f64, Vec<f64>) {
    match z.len() {
        1 => (2.0, vec![2.0]),
        2 => {
            let (f, c, s) = circle(z[0], z[1]);
            (f, vec![c, s])
        }
        3 => {
            let v = integrate(|t| {
                let a = 1.0 - t * t;
                let (f, c, s) = circle(a * z[0], a * z[1]);
                let e = (z[2] * t * t).exp();
                [f * e, a * c * e, a * s * e, t * t * f * e]
            });
            (2.0 * v[0], vec![2.0 * v[1], 2.0 * v[2], 2.0 * v[3]])
        }
        4 => {
            let v = integrate(|u| {
                let (a, ac, as_) = circle((1.0 - u) * z[0], (1.0 - u) * z[1]);
                let (b, bc, bs) = circle(u * z[2], u * z[3]);
                [
                    a * b,
                    (1.0 - u) * ac * b,
                    (1.0 - u) * as_ * b,
                    u * a * bc,
                    u * a * bs,
                ]
            });
            (0.5 * v[0], v[1..].iter().map(|x| 0.5 * x).collect())
        }
        d => {
            // Gaussian approximation of the tangent directions.
            let raw: Vec<f64> = z.iter().map(|zi| 1.0 / (1.0 - 2.0 * zi)).collect();
            let total: f64 = raw.iter().sum();
            let area = 2.0 * PI.powf(d as f64 / 2.0) / gamma_half(d);
            (area, raw.iter().map(|r| area * r / total).collect())
        }
    }
}

/// `Gamma(d / 2)` for positive integer `d`.
fn gamma_half(d: usize) -> f64 {
    if d % 2 == 0 {
        (1..d / 2).map(|k| k as f64).product()
    } else {
        let mut g = PI.sqrt();
        let mut x = 0.5;
        while x < d as f64 / 2.0 - 0.25 {
            g *= x;
            x += 1.0;
        }
        g
    }
}

/// Normalization constant of a Bingham density with concentrations `z`.
pub fn normalization_constant(z: &[f64]) -> f64 {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shifted: Vec<f64> = z.iter().map(|zi| zi - max).collect();
    let (f, _) = shifted_integrals(&shifted);
    f * max.exp()
}

/// Second moments `E[x_i^2]` along the axes of the concentration basis.
///
/// The result sums to one.
pub fn second_moments(z: &[f64]) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shifted: Vec<f64> = z.iter().map(|zi| zi - max).collect();
    let (f, parts) = shifted_integrals(&shifted);
    parts.into_iter().map(|p| p / f).collect()
}

/// Find concentrations whose second moments match `moments`.
///
/// The concentration of the largest moment is fixed at zero and the rest are
/// solved by a damped Newton iteration with a finite-difference Jacobian.
/// Moments are floored at [`MIN_MOMENT`] and renormalized first.
///
/// # Returns
/// Concentrations in the input order, all non-positive. `None` when the
/// iteration does not converge.
pub fn invert_moments(moments: &[f64]) -> Option<Vec<f64>> {
    let d = moments.len();
    if d == 0 {
        return None;
    }
    let floored: Vec<f64> = moments.iter().map(|m| m.max(MIN_MOMENT)).collect();
    let total: f64 = floored.iter().sum();
    let target: Vec<f64> = floored.iter().map(|m| m / total).collect();

    let dominant = (0..d).max_by(|&a, &b| target[a].total_cmp(&target[b]))?;
    let free: Vec<usize> = (0..d).filter(|&i| i != dominant).collect();
    if free.is_empty() {
        return Some(vec![0.0]);
    }

    let mut z = vec![0.0; d];
    for &i in &free {
        if target[i] < target[dominant] {
            z[i] = -0.5 / target[i] + 0.5 / target[dominant];
        }
    }

    let residual = |z: &[f64]| -> Vec<f64> {
        let m = second_moments(z);
        free.iter().map(|&i| m[i] - target[i]).collect()
    };
    let max_abs = |r: &[f64]| r.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));

    let mut r = residual(&z);
    for _ in 0..NEWTON_MAX_ITERATIONS {
        if max_abs(&r) < NEWTON_TOLERANCE {
            return Some(z);
        }

        let n = free.len();
        let mut jacobian = nalgebra::DMatrix::<f64>::zeros(n, n);
        for (col, &j) in free.iter().enumerate() {
            let h = 1e-6 * z[j].abs().max(1.0);
            let mut zp = z.clone();
            let mut zm = z.clone();
            zp[j] += h;
            zm[j] -= h;
            let rp = residual(&zp);
            let rm = residual(&zm);
            for row in 0..n {
                jacobian[(row, col)] = (rp[row] - rm[row]) / (2.0 * h);
            }
        }

        let rhs = -nalgebra::DVector::from_vec(r.clone());
        let step = jacobian.lu().solve(&rhs)?;

        let current = max_abs(&r);
        let mut scale = 1.0;
        loop {
            let mut candidate = z.clone();
            for (k, &j) in free.iter().enumerate() {
                candidate[j] = (z[j] + scale * step[k]).min(0.0);
            }
            let candidate_r = residual(&candidate);
            if max_abs(&candidate_r) < current || scale < 1e-4 {
                z = candidate;
                r = candidate_r;
                break;
            }
            scale *= 0.5;
        }
    }

    (max_abs(&r) < NEWTON_TOLERANCE.sqrt()).then_some(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bessel_values() {
        // I0(1) = 1.2660658, I1(1) = 0.5651591, I0(5) = 27.239872
        assert_relative_eq!(bessel_i0e(1.0) * 1f64.exp(), 1.266_065_8, epsilon = 1e-6);
        assert_relative_eq!(bessel_i1e(1.0) * 1f64.exp(), 0.565_159_1, epsilon = 1e-6);
        assert_relative_eq!(bessel_i0e(5.0) * 5f64.exp(), 27.239_872, epsilon = 1e-4);
        assert_relative_eq!(bessel_i1e(-1.0), -bessel_i1e(1.0));
    }

    #[test]
    fn test_uniform_constants_are_sphere_areas() {
        assert_relative_eq!(normalization_constant(&[0.0, 0.0]), 2.0 * PI, epsilon = 1e-9);
        assert_relative_eq!(normalization_constant(&[0.0, 0.0, 0.0]), 4.0 * PI, epsilon = 1e-9);
        assert_relative_eq!(
            normalization_constant(&[0.0, 0.0, 0.0, 0.0]),
            2.0 * PI * PI,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_uniform_moments() {
        for d in 2..=4 {
            let m = second_moments(&vec![0.0; d]);
            for v in m {
                assert_relative_eq!(v, 1.0 / d as f64, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_circle_moments() {
        let m = second_moments(&[-3.0, 0.0]);
        assert_relative_eq!(m[0], 0.201_933_380_584_355, epsilon = 1e-6);
        assert_relative_eq!(m[1], 0.798_066_619_415_645, epsilon = 1e-6);
    }

    #[test]
    fn test_concentrated_moments_approach_tangent_gaussian() {
        let m = second_moments(&[-1e4, -5e3, -100.0, 0.0]);
        assert_relative_eq!(m[0], 1.0 / 2e4, max_relative = 0.02);
        assert_relative_eq!(m[1], 1.0 / 1e4, max_relative = 0.02);
        assert_relative_eq!(m[2], 1.0 / 200.0, max_relative = 0.02);
    }

    #[test]
    fn test_invert_moments() {
        for target in [
            vec![0.1, 0.2, 0.3, 0.4],
            vec![0.05, 0.15, 0.8],
            vec![0.201_933_380_584_355, 0.798_066_619_415_645],
        ] {
            let z = invert_moments(&target).unwrap();
            assert!(z.iter().all(|&zi| zi <= 0.0));
            let m = second_moments(&z);
            for (a, b) in m.iter().zip(&target) {
                assert_relative_eq!(a, b, epsilon = 1e-8);
            }
        }
        let z = invert_moments(&[0.201_933_380_584_355, 0.798_066_619_415_645]).unwrap();
        assert_relative_eq!(z[0], -3.0, epsilon = 1e-4);
        assert_relative_eq!(z[1], 0.0);
    }

    #[test]
    fn test_invert_uniform() {
        let z = invert_moments(&[0.25; 4]).unwrap();
        assert!(z.iter().all(|zi| zi.abs() < 1e-12));
    }
}
