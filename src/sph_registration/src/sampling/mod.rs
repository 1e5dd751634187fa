//! Projection of point clouds onto the spherical sampling grid.

pub mod grid;

use tracing::debug;

use crate::error::{RegistrationError, Result};
use crate::model::{FunctionValue, NeighborQuery, PointCloud};

pub use grid::SphericalGrid;

/// Samples point clouds on the equiangular grid of one bandwidth.
#[derive(Debug, Clone, Default)]
pub struct SphericalSampler {
    grid: Option<SphericalGrid>,
}

impl SphericalSampler {
    /// Create a sampler initialized at `bandwidth`.
    pub fn new(bandwidth: usize) -> Self {
        let mut sampler = Self::default();
        sampler.initialize(bandwidth);
        sampler
    }

    /// Precompute the grid. Keeps the existing grid when the bandwidth matches.
    pub fn initialize(&mut self, bandwidth: usize) {
        if self.grid.as_ref().map(|g| g.bandwidth()) == Some(bandwidth) {
            return;
        }
        debug!("Initializing spherical grid with bandwidth {}", bandwidth);
        self.grid = Some(SphericalGrid::new(bandwidth));
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    pub fn grid(&self) -> Result<&SphericalGrid> {
        self.grid.as_ref().ok_or(RegistrationError::SamplerNotInitialized)
    }

    /// Bandwidth of the current grid.
    pub fn initialized_bandwidth(&self) -> Result<usize> {
        self.grid().map(|g| g.bandwidth())
    }

    /// Aggregate the cloud's nearest points for every grid direction.
    ///
    /// # Errors
    /// [`RegistrationError::SamplerNotInitialized`] before [`initialize`](Self::initialize),
    /// [`RegistrationError::IndexNotBuilt`] when the cloud has no index.
    pub fn sample_uniformly(
        &self,
        cloud: &PointCloud,
        query: &NeighborQuery,
    ) -> Result<Vec<FunctionValue>> {
        let grid = self.grid()?;
        let values = cloud.nearest_values(grid.directions(), query)?;
        let skipped = values.iter().filter(|v| v.is_empty()).count();
        if skipped > 0 {
            debug!("Sampling skipped {} of {} grid cells", skipped, values.len());
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    #[test]
    fn test_uninitialized_sampler_fails() {
        let sampler = SphericalSampler::default();
        assert!(matches!(
            sampler.initialized_bandwidth(),
            Err(RegistrationError::SamplerNotInitialized)
        ));
        let mut cloud = PointCloud::new(vec![Point::new(1.0, 0.0, 0.0, 1.0)]);
        cloud.build_index();
        assert!(matches!(
            sampler.sample_uniformly(&cloud, &NeighborQuery::default()),
            Err(RegistrationError::SamplerNotInitialized)
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut sampler = SphericalSampler::new(4);
        assert_eq!(sampler.initialized_bandwidth().unwrap(), 4);
        sampler.initialize(4);
        assert_eq!(sampler.grid().unwrap().len(), 64);
        sampler.initialize(8);
        assert_eq!(sampler.grid().unwrap().len(), 256);
    }

    #[test]
    fn test_sampling_matches_grid_order() {
        let sampler = SphericalSampler::new(4);
        let mut cloud = crate::test_utils::make_room_cloud(1, 0.25);
        cloud.build_index();
        let values = sampler.sample_uniformly(&cloud, &NeighborQuery::default()).unwrap();
        assert_eq!(values.len(), 64);
        assert!(values.iter().all(|v| !v.is_empty()));
        assert!(values.iter().all(|v| v.averaged_range() > 0.3));
    }

    #[test]
    fn test_sampling_requires_index() {
        let sampler = SphericalSampler::new(2);
        let cloud = PointCloud::new(vec![Point::new(1.0, 0.0, 0.0, 1.0)]);
        assert!(matches!(
            sampler.sample_uniformly(&cloud, &NeighborQuery::default()),
            Err(RegistrationError::IndexNotBuilt)
        ));
    }
}
