//! Translation from range differences of matched grid cells.
//!
//! Both clouds are sampled about their own centroids, so the centroid
//! difference is the first guess of the translation. A remaining shift `s`
//! changes the range seen along direction `u` by roughly `u . s`. Collecting
//! `dr = r_f - r_h` over all cells sampled in both clouds gives the
//! least-squares problem `sum(u u^T) s = sum(u dr)`.

use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

use super::TranslationAligner;
use crate::correlation::TranslationSurface;
use crate::error::{RegistrationError, Result};
use crate::model::{FunctionValue, PointCloud};

/// Minimum determinant of the normal matrix before falling back.
const MIN_DETERMINANT: f64 = 1e-9;

/// Maximum condition number of the normal matrix for a trusted solve.
const MAX_CONDITION: f64 = 1e6;

/// Outcome of one range-averaging estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAlignment {
    pub translation: Vector3<f64>,
    /// False when no cell matched or the directions did not span 3D and the
    /// mean point difference was used instead of the least-squares solve.
    pub solved: bool,
}

#[derive(Debug, Default)]
pub struct RangeAveragingAligner {
    solved: bool,
}

impl RangeAveragingAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Arguments
    /// * `f_values` - Sampling pass of the reference cloud
    /// * `f_origin` - Sampling origin of the reference cloud
    /// * `h_values` - Sampling pass of the rotated current cloud, same grid
    /// * `h_origin` - Sampling origin of the rotated current cloud
    ///
    /// # Returns
    /// Least-squares translation, or the mean point difference of the matched
    /// cells when their directions do not span 3D.
    pub fn estimate(
        f_values: &[FunctionValue],
        f_origin: &Vector3<f64>,
        h_values: &[FunctionValue],
        h_origin: &Vector3<f64>,
    ) -> Result<RangeAlignment> {
        if f_values.len() != h_values.len() {
            return Err(RegistrationError::SignalLengthMismatch {
                expected: f_values.len(),
                actual: h_values.len(),
            });
        }

        let mut normal = Matrix3::<f64>::zeros();
        let mut rhs = Vector3::<f64>::zeros();
        let mut point_diff = Vector3::<f64>::zeros();
        let mut matched = 0usize;

        for (f, h) in f_values.iter().zip(h_values) {
            if f.is_empty() || h.is_empty() {
                continue;
            }
            let range_f = f.averaged_range();
            if range_f <= 0.0 {
                continue;
            }
            let u = (f.averaged_point() - f_origin) / range_f;
            let dr = range_f - h.averaged_range();
            normal += u * u.transpose();
            rhs += u * dr;
            point_diff += f.averaged_point() - h.averaged_point();
            matched += 1;
        }

        if matched == 0 {
            warn!("No matched cells for range averaging, returning zero translation");
            return Ok(RangeAlignment {
                translation: Vector3::zeros(),
                solved: false,
            });
        }

        if normal.determinant().abs() > MIN_DETERMINANT && well_conditioned(&normal) {
            if let Some(inverse) = normal.try_inverse() {
                return Ok(RangeAlignment {
                    translation: (f_origin - h_origin) + inverse * rhs,
                    solved: true,
                });
            }
        }
        warn!(
            "Degenerate direction set over {} cells, using mean point difference",
            matched
        );
        Ok(RangeAlignment {
            translation: point_diff / matched as f64,
            solved: false,
        })
    }

    /// Whether the last alignment came from a well-posed least-squares solve.
    pub fn solved(&self) -> bool {
        self.solved
    }
}

/// Ratio of the extreme eigenvalues of the symmetric normal matrix.
fn well_conditioned(normal: &Matrix3<f64>) -> bool {
    let eigenvalues = normal.symmetric_eigenvalues();
    let max = eigenvalues.max();
    let min = eigenvalues.min();
    min > 0.0 && max / min < MAX_CONDITION
}

impl TranslationAligner for RangeAveragingAligner {
    fn align_registered(
        &mut self,
        prev: &PointCloud,
        f_values: &[FunctionValue],
        rotated: &PointCloud,
        h_values: &[FunctionValue],
    ) -> Result<Vector3<f64>> {
        let f_origin = prev.sampling_origin().cast::<f64>();
        let h_origin = rotated.sampling_origin().cast::<f64>();
        let alignment = Self::estimate(f_values, &f_origin, h_values, &h_origin)?;
        self.solved = alignment.solved;
        debug!(
            "Range averaging translation {:?} (solved: {})",
            alignment.translation, alignment.solved
        );
        Ok(alignment.translation)
    }

    fn translation_surface(&self) -> Option<&TranslationSurface> {
        None
    }

    fn found_solution(&self) -> bool {
        self.solved
    }

    fn uses_sampled_values(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "averaging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NeighborQuery;
    use crate::sampling::SphericalSampler;
    use crate::test_utils::make_room_cloud;
    use approx::assert_relative_eq;

    fn cell(point: Vector3<f64>, range: f64) -> FunctionValue {
        let mut value = FunctionValue::new();
        value.add_point(&point.cast::<f32>());
        value.add_range(range);
        value
    }

    fn zero() -> Vector3<f64> {
        Vector3::zeros()
    }

    #[test]
    fn test_exact_range_model() {
        let t = Vector3::new(0.4, -0.3, 0.2);
        let directions = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(-1.0, 1.0, 0.0).normalize(),
            Vector3::new(0.0, -1.0, 1.0).normalize(),
            Vector3::new(1.0, 1.0, 1.0).normalize(),
        ];

        let mut f_values = Vec::new();
        let mut h_values = Vec::new();
        for (i, u) in directions.iter().enumerate() {
            let range = 4.0 + i as f64;
            f_values.push(cell(u * range, range));
            let range_h = range - u.dot(&t);
            h_values.push(cell(u * range_h, range_h));
        }
        // Skipped cells do not contribute.
        f_values.push(FunctionValue::new());
        h_values.push(cell(Vector3::new(3.0, 0.0, 0.0), 3.0));

        let alignment = RangeAveragingAligner::estimate(&f_values, &zero(), &h_values, &zero()).unwrap();
        assert!(alignment.solved);
        assert_relative_eq!(alignment.translation, t, epsilon = 1e-4);
    }

    #[test]
    fn test_origins_add_centroid_shift() {
        let f_origin = Vector3::new(1.0, 2.0, -1.0);
        let h_origin = Vector3::new(0.5, 2.5, -1.0);
        let directions = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
        ];
        // Same centred geometry in both clouds.
        let f_values: Vec<_> = directions.iter().map(|u| cell(f_origin + u * 3.0, 3.0)).collect();
        let h_values: Vec<_> = directions.iter().map(|u| cell(h_origin + u * 3.0, 3.0)).collect();

        let alignment = RangeAveragingAligner::estimate(&f_values, &f_origin, &h_values, &h_origin).unwrap();
        assert!(alignment.solved);
        assert_relative_eq!(alignment.translation, f_origin - h_origin, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_directions_fall_back_to_point_difference() {
        let u = Vector3::new(1.0, 0.0, 0.0);
        let f_values = vec![cell(u * 5.0, 5.0), cell(u * 6.0, 6.0)];
        let h_values = vec![cell(u * 4.5, 4.5), cell(u * 5.5, 5.5)];

        let alignment = RangeAveragingAligner::estimate(&f_values, &zero(), &h_values, &zero()).unwrap();
        assert!(!alignment.solved);
        assert_relative_eq!(alignment.translation, Vector3::new(0.5, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_ill_conditioned_directions_are_not_solved() {
        // Cells around a flat ring barely tilted out of the xy plane. The
        // determinant stays clear of zero, the condition number does not.
        let f_values: Vec<_> = (0..100)
            .map(|k| {
                let phi = k as f64 * std::f64::consts::TAU / 100.0;
                let tilt = if k % 2 == 0 { 1e-4 } else { -1e-4 };
                let u = Vector3::new(phi.cos(), phi.sin(), tilt).normalize();
                cell(u * 5.0, 5.0)
            })
            .collect();
        let h_values: Vec<_> = f_values
            .iter()
            .map(|f| {
                let range = f.averaged_range() - 0.1;
                cell(f.averaged_point() * (range / 5.0), range)
            })
            .collect();

        let alignment = RangeAveragingAligner::estimate(&f_values, &zero(), &h_values, &zero()).unwrap();
        assert!(!alignment.solved);
        assert!(alignment.translation.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_no_matches_and_length_mismatch() {
        let empty = vec![FunctionValue::new(); 4];
        let alignment = RangeAveragingAligner::estimate(&empty, &zero(), &empty, &zero()).unwrap();
        assert_eq!(alignment.translation, Vector3::zeros());
        assert!(!alignment.solved);

        assert!(matches!(
            RangeAveragingAligner::estimate(&empty, &zero(), &empty[..3], &zero()),
            Err(RegistrationError::SignalLengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_room_shift_is_recovered() {
        let mut prev = make_room_cloud(3, 1.0);
        let t = Vector3::new(0.8, 0.5, -0.3);
        let mut rotated = prev.translate_copy(&-t);
        prev.build_index();
        rotated.build_index();

        let sampler = SphericalSampler::new(8);
        let query = NeighborQuery::default();
        let f_values = sampler.sample_uniformly(&prev, &query).unwrap();
        let h_values = sampler.sample_uniformly(&rotated, &query).unwrap();

        let mut aligner = RangeAveragingAligner::new();
        assert!(aligner.uses_sampled_values());
        let xyz = aligner
            .align_registered(&prev, &f_values, &rotated, &h_values)
            .unwrap();

        assert!((xyz - t).norm() < 0.05, "{xyz:?}");
        assert!(aligner.found_solution());
        assert!(aligner.translation_surface().is_none());
    }
}
