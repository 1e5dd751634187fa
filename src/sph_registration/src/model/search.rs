//! KD-tree nearest-neighbour search over unit-projected point directions.
//!
//! The sampler queries the cloud with unit vectors of the spherical grid, so
//! the tree is built from each point's direction as seen from the sampling
//! origin rather than from its raw position. Points on the origin have no
//! direction and are left out of the tree.

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Vector3;

/// Bucket size for the KD-tree.
///
/// Directions of dense scans cluster tightly on the sphere, so a larger bucket
/// than kiddo's default keeps construction from splitting degenerate leaves.
const BUCKET_SIZE: usize = 256;

/// Squared norm below which a point is considered to sit on the origin.
const MIN_NORM_SQ: f32 = 1e-12;

/// Nearest-neighbour index over point directions.
#[derive(Debug)]
pub struct DirectionIndex {
    /// Generic args: A=f32, T=u64 (tree-local index), K=3, B=bucket size
    kdtree: Option<ImmutableKdTree<f32, u64, 3, BUCKET_SIZE>>,
    /// Maps tree-local indices back to point indices.
    point_indices: Vec<usize>,
}

impl DirectionIndex {
    /// Build an index from point positions.
    ///
    /// # Arguments
    /// * `positions` - Point positions relative to the sampling origin
    pub fn from_positions<'a, I>(positions: I) -> Self
    where
        I: IntoIterator<Item = &'a Vector3<f32>>,
    {
        let mut directions: Vec<[f32; 3]> = Vec::new();
        let mut point_indices = Vec::new();

        for (idx, p) in positions.into_iter().enumerate() {
            let norm_sq = p.norm_squared();
            if !norm_sq.is_finite() || norm_sq < MIN_NORM_SQ {
                continue;
            }
            let d = p / norm_sq.sqrt();
            directions.push([d.x, d.y, d.z]);
            point_indices.push(idx);
        }

        let kdtree = if directions.is_empty() {
            None
        } else {
            Some((&*directions).into())
        };

        Self {
            kdtree,
            point_indices,
        }
    }

    /// Find up to `k` points whose directions are closest to `direction`.
    ///
    /// # Arguments
    /// * `direction` - Unit query direction
    /// * `k` - Number of neighbours
    /// * `max_distance` - Maximum chord distance between directions
    ///
    /// # Returns
    /// Point indices with their squared chord distance, nearest first. Empty
    /// when the index holds no points or nothing lies within `max_distance`.
    pub fn nearest(&self, direction: &[f32; 3], k: usize, max_distance: f32) -> Vec<(usize, f32)> {
        let Some(kdtree) = &self.kdtree else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let max_dist_sq = max_distance * max_distance;
        kdtree
            .nearest_n::<SquaredEuclidean>(direction, k)
            .into_iter()
            .filter(|nn| nn.distance <= max_dist_sq)
            .map(|nn| (self.point_indices[nn.item as usize], nn.distance))
            .collect()
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.point_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions() -> Vec<Vector3<f32>> {
        vec![
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -7.0),
        ]
    }

    #[test]
    fn test_nearest_uses_directions() {
        let index = DirectionIndex::from_positions(&positions());
        assert_eq!(index.len(), 3);

        let result = index.nearest(&[0.0, 1.0, 0.0], 1, 5.0);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, 1);
        assert!(result[0].1 < 1e-6);

        // The origin point is skipped, so index 3 keeps its identity.
        let result = index.nearest(&[0.1, 0.0, -0.99], 1, 5.0);
        assert_eq!(result[0].0, 3);
    }

    #[test]
    fn test_max_distance_filters() {
        let index = DirectionIndex::from_positions(&positions());
        let result = index.nearest(&[0.0, 0.0, 1.0], 3, 0.5);
        assert!(result.is_empty());

        let result = index.nearest(&[0.0, 0.0, 1.0], 3, 5.0);
        assert_eq!(result.len(), 3);
        assert_eq!(result[2].0, 3);
    }

    #[test]
    fn test_empty_index() {
        let index = DirectionIndex::from_positions(&Vec::<Vector3<f32>>::new());
        assert!(index.is_empty());
        assert!(index.nearest(&[1.0, 0.0, 0.0], 1, 5.0).is_empty());
    }
}
