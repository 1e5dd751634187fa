//! Bingham distribution on the unit hypersphere.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::normalization::{invert_moments, normalization_constant, second_moments};

/// Eigenvalue spread below which a scatter matrix is treated as uniform.
const ISOTROPIC_SPREAD: f64 = 1e-9;

/// Antipodally symmetric density `exp(x' M diag(Z) M' x) / F(Z)`.
///
/// Columns of `M` are orthonormal axes and `Z` holds one non-positive
/// concentration per axis. Fitted distributions order the axes by
/// ascending concentration, so the mode is the last column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bingham {
    z: DVector<f64>,
    m: DMatrix<f64>,
    normalization: f64,
    moments: DVector<f64>,
}

impl Bingham {
    /// Create a distribution from concentrations and orientation.
    ///
    /// # Panics
    /// If `m` is not square or its size differs from `z`.
    pub fn new(z: DVector<f64>, m: DMatrix<f64>) -> Self {
        assert!(m.is_square() && m.nrows() == z.len(), "Bingham: Z and M dimensions differ");
        let normalization = normalization_constant(z.as_slice());
        let moments = DVector::from_vec(second_moments(z.as_slice()));
        Self {
            z,
            m,
            normalization,
            moments,
        }
    }

    /// Uniform distribution on the sphere in `dim` dimensions.
    pub fn uniform(dim: usize) -> Self {
        Self::new(DVector::zeros(dim), DMatrix::identity(dim, dim))
    }

    /// Fit to unit-vector samples stored as matrix columns.
    pub fn fit(samples: &DMatrix<f64>) -> Self {
        let weights = DVector::from_element(samples.ncols(), 1.0);
        Self::fit_weighted(samples, &weights)
    }

    /// Weighted fit to unit-vector samples stored as matrix columns.
    ///
    /// The axes are the eigenvectors of the weighted scatter matrix and the
    /// concentrations are found by matching the Bingham second moments to its
    /// eigenvalues. Degenerate scatter falls back to the uniform concentration.
    pub fn fit_weighted(samples: &DMatrix<f64>, weights: &DVector<f64>) -> Self {
        let dim = samples.nrows();
        let total: f64 = weights.iter().sum();
        if samples.ncols() == 0 || samples.ncols() != weights.len() || total <= 0.0 {
            warn!("Bingham fit without usable samples, returning uniform distribution");
            return Self::uniform(dim);
        }

        let mut scatter = DMatrix::<f64>::zeros(dim, dim);
        for (col, w) in samples.column_iter().zip(weights.iter()) {
            let col = col.into_owned();
            scatter += (&col * col.transpose()) * *w;
        }
        scatter /= total;

        let eigen = SymmetricEigen::new(scatter);
        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        let eigenvalues: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
        let mut m = DMatrix::<f64>::zeros(dim, dim);
        for (dst, &src) in order.iter().enumerate() {
            let mut axis = eigen.eigenvectors.column(src).into_owned();
            if axis[0] < 0.0 {
                axis = -axis;
            }
            m.set_column(dst, &axis);
        }

        let spread = eigenvalues[dim - 1] - eigenvalues[0];
        let z = if spread < ISOTROPIC_SPREAD {
            warn!("Near-uniform scatter in Bingham fit, using isotropic concentration");
            DVector::zeros(dim)
        } else {
            match invert_moments(&eigenvalues) {
                Some(z) => DVector::from_vec(z),
                None => {
                    warn!("Bingham concentration inversion did not converge, using isotropic concentration");
                    DVector::zeros(dim)
                }
            }
        };

        Self::new(z, m)
    }

    pub fn dim(&self) -> usize {
        self.z.len()
    }

    pub fn concentrations(&self) -> &DVector<f64> {
        &self.z
    }

    pub fn orientation(&self) -> &DMatrix<f64> {
        &self.m
    }

    pub fn normalization_constant(&self) -> f64 {
        self.normalization
    }

    /// Dominant axis, the column of `M` with the largest concentration.
    pub fn mode(&self) -> DVector<f64> {
        let idx = self.z.imax();
        self.m.column(idx).into_owned()
    }

    /// Second moment matrix `E[x x']`.
    pub fn moment(&self) -> DMatrix<f64> {
        &self.m * DMatrix::from_diagonal(&self.moments) * self.m.transpose()
    }

    /// Density at a unit vector.
    pub fn pdf(&self, x: &DVector<f64>) -> f64 {
        let projected = self.m.transpose() * x;
        let exponent: f64 = projected
            .iter()
            .zip(self.z.iter())
            .map(|(p, z)| z * p * p)
            .sum();
        exponent.exp() / self.normalization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn regression_samples() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            3,
            &[
                0.956_937_406_927_354, 0.960_768_653_534_504, 0.957_187_982_859_276,
                0.058_856_783_978_165, 0.065_511_336_552_757, 0.050_483_920_758_591,
                0.168_490_940_966_118, 0.177_531_610_326_744, 0.190_308_650_775_464,
                0.228_948_642_746_032, 0.202_766_827_916_600, 0.212_191_320_874_942,
            ],
        )
    }

    #[test]
    fn test_constructor_mode_and_moment() {
        let bingham = Bingham::new(DVector::from_vec(vec![-3.0, 0.0]), DMatrix::identity(2, 2));
        assert_relative_eq!(bingham.mode(), DVector::from_vec(vec![0.0, 1.0]));

        let moment = bingham.moment();
        assert_relative_eq!(moment[(0, 0)], 0.201_933_380_584_355, epsilon = 1e-6);
        assert_relative_eq!(moment[(1, 1)], 0.798_066_619_415_645, epsilon = 1e-6);
        assert_relative_eq!(moment[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_mode() {
        let bingham = Bingham::fit(&regression_samples());
        let expected = DVector::from_vec(vec![
            0.958_412_197_672_200,
            0.058_290_946_520_010,
            0.178_798_556_011_915,
            0.214_660_898_337_351,
        ]);
        assert_relative_eq!(bingham.mode(), expected, epsilon = 1e-4);
        assert!(bingham.concentrations().iter().all(|&z| z <= 0.0));
        assert!(bingham.moment().trace() <= 1.2);
    }

    #[test]
    fn test_weighted_fit_mode() {
        let weights = DVector::from_vec(vec![0.2, 0.7, 0.1]);
        let bingham = Bingham::fit_weighted(&regression_samples(), &weights);
        let expected = DVector::from_vec(vec![
            0.959_724_413_089_442,
            0.062_683_254_650_737,
            0.177_016_105_317_784,
            0.208_962_099_349_714,
        ]);
        assert_relative_eq!(bingham.mode(), expected, epsilon = 1e-4);
    }

    #[test]
    fn test_equal_weights_match_unweighted() {
        let samples = regression_samples();
        let plain = Bingham::fit(&samples);
        let weighted = Bingham::fit_weighted(&samples, &DVector::from_element(3, 0.4));
        assert_relative_eq!(plain.mode(), weighted.mode(), epsilon = 1e-12);
        assert_relative_eq!(plain.moment(), weighted.moment(), epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_is_orthonormal() {
        let bingham = Bingham::fit(&regression_samples());
        let m = bingham.orientation();
        assert_relative_eq!(m.transpose() * m, DMatrix::identity(4, 4), epsilon = 1e-9);
        let z = bingham.concentrations();
        for i in 1..z.len() {
            assert!(z[i - 1] <= z[i]);
        }
    }

    #[test]
    fn test_spread_increases_off_mode_moment() {
        let off_mode_moment = |spread: f64| {
            let (s, c) = spread.sin_cos();
            let bingham = Bingham::fit(&DMatrix::from_row_slice(2, 2, &[c, c, s, -s]));
            let mode = bingham.mode();
            1.0 - (mode.transpose() * bingham.moment() * &mode)[(0, 0)]
        };
        let tight = off_mode_moment(0.3);
        let loose = off_mode_moment(0.6);
        assert_relative_eq!(tight, 0.3f64.sin().powi(2), epsilon = 1e-4);
        assert!(loose > tight);
    }

    #[test]
    fn test_degenerate_scatter_is_isotropic() {
        let samples = DMatrix::from_row_slice(2, 4, &[1.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0, -1.0]);
        let bingham = Bingham::fit(&samples);
        assert!(bingham.concentrations().iter().all(|z| *z == 0.0));
        assert_relative_eq!(bingham.moment(), DMatrix::identity(2, 2) * 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_pdf_integrates_to_one_on_circle() {
        let bingham = Bingham::new(DVector::from_vec(vec![-2.0, 0.0]), DMatrix::identity(2, 2));
        let n = 2000;
        let step = std::f64::consts::TAU / n as f64;
        let integral: f64 = (0..n)
            .map(|k| {
                let t = k as f64 * step;
                bingham.pdf(&DVector::from_vec(vec![t.cos(), t.sin()])) * step
            })
            .sum();
        assert_relative_eq!(integral, 1.0, epsilon = 1e-6);
    }
}
