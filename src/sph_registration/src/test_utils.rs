//! Synthetic scenes and fixed surfaces for tests.
//!
//! The room generator mimics a small indoor scan: six walls of a box around
//! the sensor plus one obstacle, each plane with its own intensity, so both
//! correlation channels carry structure.

use nalgebra::{Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::alignment::TranslationAligner;
use crate::correlation::{CorrelationSurface, SphericalCorrelation, TranslationSurface};
use crate::error::{RegistrationError, Result};
use crate::model::{FunctionValue, Point, PointCloud};
use crate::rotation::zyz_to_rotation;
use crate::sampling::SphericalGrid;

/// Generate the room scene.
///
/// The box spans `[-6, 8] x [-4, 5] x [-1.5, 3]` times `scale` with the
/// sensor at the origin, 4500 points in total.
///
/// # Arguments
/// * `seed` - Seed of the point placement
/// * `scale` - Uniform scale of the scene
pub fn make_room_cloud(seed: u64, scale: f32) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    const X0: f32 = -6.0;
    const X1: f32 = 8.0;
    const Y0: f32 = -4.0;
    const Y1: f32 = 5.0;
    const Z0: f32 = -1.5;
    const Z1: f32 = 3.0;

    type Plane = (usize, fn(f32, f32) -> [f32; 3], f32);
    let planes: [Plane; 8] = [
        (900, |u, v| [X0 + u * (X1 - X0), Y0 + v * (Y1 - Y0), Z0], 10.0),
        (600, |u, v| [X0 + u * (X1 - X0), Y0 + v * (Y1 - Y0), Z1], 20.0),
        (500, |u, v| [X0, Y0 + u * (Y1 - Y0), Z0 + v * (Z1 - Z0)], 30.0),
        (700, |u, v| [X1, Y0 + u * (Y1 - Y0), Z0 + v * (Z1 - Z0)], 40.0),
        (600, |u, v| [X0 + u * (X1 - X0), Y0, Z0 + v * (Z1 - Z0)], 50.0),
        (600, |u, v| [X0 + u * (X1 - X0), Y1, Z0 + v * (Z1 - Z0)], 60.0),
        // Obstacle on the floor.
        (300, |u, v| [2.0 + u * 1.5, 1.0 + v, Z0 + 1.2], 90.0),
        (300, |u, v| [2.0, 1.0 + u, Z0 + v * 1.2], 80.0),
    ];

    let mut points = Vec::with_capacity(4500);
    for (count, place, intensity) in planes {
        for _ in 0..count {
            let p = place(rng.gen::<f32>(), rng.gen::<f32>());
            points.push(Point::new(p[0] * scale, p[1] * scale, p[2] * scale, intensity));
        }
    }
    PointCloud::new(points)
}

/// Copy with `R(zyz) * p + translation` applied to every point.
pub fn make_transformed_copy(
    cloud: &PointCloud,
    rotation_zyz: &[f64; 3],
    translation: &Vector3<f64>,
) -> PointCloud {
    cloud.rotate_zyz_copy(rotation_zyz).translate_copy(translation)
}

/// Copy with Gaussian position noise of standard deviation `sigma`.
pub fn make_noisy_copy(cloud: &PointCloud, seed: u64, sigma: f32) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, sigma).unwrap();
    cloud
        .iter()
        .map(|p| {
            let noise = Vector3::new(
                normal.sample(&mut rng),
                normal.sample(&mut rng),
                normal.sample(&mut rng),
            );
            Point {
                position: p.position + noise,
                intensity: p.intensity,
            }
        })
        .collect()
}

/// Smooth polynomial on the sphere, evaluated at `R^-1 w` for every grid
/// direction `w`, so the signal is the base signal rotated by `R`.
pub fn smooth_test_signal(grid: &SphericalGrid, rotation: &Rotation3<f64>) -> Vec<f64> {
    let inverse = rotation.inverse();
    let mut out = Vec::with_capacity(grid.len());
    for &theta in grid.thetas() {
        let (st, ct) = theta.sin_cos();
        for &phi in grid.phis() {
            let (sp, cp) = phi.sin_cos();
            let v = inverse * Vector3::new(st * cp, st * sp, ct);
            let (x, y, z) = (v.x, v.y, v.z);
            out.push(x + 0.5 * y * y + 0.8 * z * x + 0.3 * z * z * z - 0.6 * x * y + 0.4 * y);
        }
    }
    out
}

/// Cubic surface of side `side` with unit Gaussian bumps at `centres`.
///
/// Distances wrap around. A faint ripple keeps the running deviation of
/// the peak extraction non-zero away from the bumps.
pub fn make_peak_surface(side: usize, centres: &[[usize; 3]], sigma: f64) -> Vec<f64> {
    let wrap = |a: usize, b: usize| {
        let d = a.abs_diff(b);
        d.min(side - d) as f64
    };
    let mut values = Vec::with_capacity(side * side * side);
    for x in 0..side {
        for y in 0..side {
            for z in 0..side {
                let index = values.len();
                let mut v = 0.01 * (index as f64 * 0.7).sin();
                for c in centres {
                    let d2 = wrap(x, c[0]).powi(2) + wrap(y, c[1]).powi(2) + wrap(z, c[2]).powi(2);
                    v += (-d2 / (2.0 * sigma * sigma)).exp();
                }
                values.push(v);
            }
        }
    }
    values
}

/// Spherical engine returning a preset surface.
pub struct FixedCorrelation {
    bandwidth: usize,
    surface: Option<CorrelationSurface>,
}

impl FixedCorrelation {
    pub fn new(bandwidth: usize, values: Vec<f64>) -> Self {
        Self {
            bandwidth,
            surface: Some(CorrelationSurface::new(bandwidth, values)),
        }
    }

    /// Engine that has not correlated anything yet.
    pub fn empty() -> Self {
        Self {
            bandwidth: 1,
            surface: None,
        }
    }
}

impl SphericalCorrelation for FixedCorrelation {
    fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    fn correlate_signals(&mut self, _f: &[Vec<f64>], _h: &[Vec<f64>]) -> Result<[f64; 3]> {
        Ok(self.correlation()?.max_angles())
    }

    fn correlation(&self) -> Result<&CorrelationSurface> {
        self.surface.as_ref().ok_or(RegistrationError::TransformNotComputed)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Aligner reporting a preset translation surface.
pub struct FixedSurfaceAligner {
    surface: Option<TranslationSurface>,
}

impl FixedSurfaceAligner {
    pub fn new(voxels_per_dim: usize, voxel_size: f64, values: Vec<f64>) -> Self {
        Self {
            surface: Some(TranslationSurface::new(voxels_per_dim, voxel_size, values)),
        }
    }

    /// Attach the bound the surface's peak is measured against.
    pub fn with_reference(mut self, reference: f64) -> Self {
        self.surface = self.surface.map(|s| s.with_reference(reference));
        self
    }

    /// Aligner without a surface, like range averaging.
    pub fn missing() -> Self {
        Self { surface: None }
    }
}

impl TranslationAligner for FixedSurfaceAligner {
    fn align_registered(
        &mut self,
        _prev: &PointCloud,
        _f_values: &[FunctionValue],
        _rotated: &PointCloud,
        _h_values: &[FunctionValue],
    ) -> Result<Vector3<f64>> {
        Ok(self
            .surface
            .as_ref()
            .map(|s| s.refined_peak_offset())
            .unwrap_or_else(Vector3::zeros))
    }

    fn translation_surface(&self) -> Option<&TranslationSurface> {
        self.surface.as_ref()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_cloud_is_deterministic() {
        let a = make_room_cloud(4, 1.0);
        let b = make_room_cloud(4, 1.0);
        assert_eq!(a.len(), 4500);
        assert_eq!(a.points(), b.points());
        assert!(a.iter().all(|p| p.position.norm() > 1.0));
    }

    #[test]
    fn test_noisy_copy_stays_close() {
        let cloud = make_room_cloud(2, 1.0);
        let noisy = make_noisy_copy(&cloud, 9, 0.01);
        assert_eq!(noisy.len(), cloud.len());
        let max = cloud
            .iter()
            .zip(noisy.iter())
            .map(|(a, b)| (a.position - b.position).norm())
            .fold(0.0f32, f32::max);
        assert!(max < 0.1);
    }

    #[test]
    fn test_peak_surface_maximum() {
        let values = make_peak_surface(8, &[[2, 3, 4]], 1.0);
        let best = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, (2 * 8 + 3) * 8 + 4);
    }
}
