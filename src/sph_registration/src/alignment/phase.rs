//! Translation by 3D phase correlation of voxel occupancy grids.

use nalgebra::Vector3;
use tracing::debug;

use super::TranslationAligner;
use crate::config::PhaseCorrelationConfig;
use crate::correlation::{center_zero_offset, SpatialCorrelation, TranslationSurface};
use crate::error::Result;
use crate::model::{FunctionValue, PointCloud};

/// Count points per voxel of the cube `[-extent, extent)^3` split into
/// `voxels_per_dim` cells per axis. Points outside are ignored.
pub fn voxelize(cloud: &PointCloud, voxels_per_dim: usize, extent: f64) -> Vec<f64> {
    let n = voxels_per_dim;
    let voxel_size = 2.0 * extent / n as f64;
    let mut grid = vec![0.0; n * n * n];

    for point in cloud.iter() {
        let p = point.position.cast::<f64>();
        let mut idx = [0usize; 3];
        let mut inside = true;
        for axis in 0..3 {
            let cell = ((p[axis] + extent) / voxel_size).floor();
            if !cell.is_finite() || cell < 0.0 || cell >= n as f64 {
                inside = false;
                break;
            }
            idx[axis] = cell as usize;
        }
        if inside {
            grid[(idx[0] * n + idx[1]) * n + idx[2]] += 1.0;
        }
    }
    grid
}

/// Phase-correlation aligner.
pub struct PhaseAligner {
    config: PhaseCorrelationConfig,
    correlation: Box<dyn SpatialCorrelation>,
    surface: Option<TranslationSurface>,
}

impl PhaseAligner {
    pub fn new(config: PhaseCorrelationConfig, correlation: Box<dyn SpatialCorrelation>) -> Self {
        Self {
            config,
            correlation,
            surface: None,
        }
    }

    pub fn config(&self) -> &PhaseCorrelationConfig {
        &self.config
    }
}

impl TranslationAligner for PhaseAligner {
    fn align_registered(
        &mut self,
        prev: &PointCloud,
        _f_values: &[FunctionValue],
        rotated: &PointCloud,
        _h_values: &[FunctionValue],
    ) -> Result<Vector3<f64>> {
        let n = self.correlation.voxels_per_dim();
        let extent = self.config.extent;
        let f = voxelize(prev, n, extent);
        let g = voxelize(rotated, n, extent);

        let cyclic = self.correlation.correlate(&f, &g, self.config.normalize)?;
        let voxel_size = 2.0 * extent / n as f64;
        // Unit cross-power bounds the peak by 1, otherwise Cauchy-Schwarz does.
        let reference = if self.config.normalize {
            1.0
        } else {
            let energy = |grid: &[f64]| grid.iter().map(|v| v * v).sum::<f64>();
            (energy(&f) * energy(&g)).sqrt()
        };
        let surface = TranslationSurface::new(n, voxel_size, center_zero_offset(&cyclic, n))
            .with_reference(reference);

        let xyz = surface.refined_peak_offset();
        debug!("Phase correlation peak at {:?} (voxel size {:.3})", xyz, voxel_size);
        self.surface = Some(surface);
        Ok(xyz)
    }

    fn translation_surface(&self) -> Option<&TranslationSurface> {
        self.surface.as_ref()
    }

    fn name(&self) -> &'static str {
        "phase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::SpatialCorrelationCpu;
    use crate::test_utils::make_room_cloud;
    use approx::assert_relative_eq;

    fn aligner() -> PhaseAligner {
        let config = PhaseCorrelationConfig {
            voxels_per_dim: 32,
            extent: 10.0,
            normalize: true,
        };
        PhaseAligner::new(config, Box::new(SpatialCorrelationCpu::new(32)))
    }

    #[test]
    fn test_voxelize_counts_inside_points() {
        let cloud = PointCloud::from_positions(&[[0.1, 0.1, 0.1], [0.2, 0.2, 0.2], [50.0, 0.0, 0.0]]);
        let grid = voxelize(&cloud, 4, 2.0);
        assert_eq!(grid.iter().sum::<f64>(), 2.0);
        assert_eq!(grid[(2 * 4 + 2) * 4 + 2], 2.0);
    }

    #[test]
    fn test_recovers_voxel_aligned_shift() {
        let prev = make_room_cloud(7, 0.5);
        // prev = rotated + t with t a whole number of 0.625 m voxels
        let t = Vector3::new(1.25, -0.625, 0.625);
        let rotated = prev.translate_copy(&-t);

        let mut aligner = aligner();
        let xyz = aligner.align_registered(&prev, &[], &rotated, &[]).unwrap();
        assert_relative_eq!(xyz, t, epsilon = 0.2);
        let coherence = aligner.translation_surface().unwrap().coherence().unwrap();
        assert!(coherence > 0.3 && coherence <= 1.0, "{coherence}");
        assert_eq!(aligner.name(), "phase");
    }

    #[test]
    fn test_zero_shift() {
        let prev = make_room_cloud(11, 0.5);
        let mut aligner = aligner();
        let xyz = aligner
            .align_registered(&prev, &[], &prev.clone(), &[])
            .unwrap();
        assert!(xyz.norm() < 0.2, "{xyz:?}");
    }

    #[test]
    fn test_unnormalized_coherence_of_identical_grids() {
        let config = PhaseCorrelationConfig {
            voxels_per_dim: 16,
            extent: 10.0,
            normalize: false,
        };
        let mut aligner = PhaseAligner::new(config, Box::new(SpatialCorrelationCpu::new(16)));
        let prev = make_room_cloud(3, 0.5);
        aligner
            .align_registered(&prev, &[], &prev.clone(), &[])
            .unwrap();
        let coherence = aligner.translation_surface().unwrap().coherence().unwrap();
        assert_relative_eq!(coherence, 1.0, epsilon = 1e-6);
    }
}
