//! Point cloud with per-point ranges and a lazily built direction index.
//!
//! Ranges and directions are taken about the cloud's centroid, the sampling
//! origin. A rigid motion moves the centroid with the points, so the sampled
//! signals of a moved copy differ from the original only by the rotation.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use rayon::prelude::*;
use tracing::trace;

use super::function_value::FunctionValue;
use super::search::DirectionIndex;
use crate::error::{RegistrationError, Result};
use crate::rotation::zyz_to_rotation;

/// A single measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub position: Vector3<f32>,
    pub intensity: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, z: f32, intensity: f32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            intensity,
        }
    }
}

/// Parameters of the neighbour aggregation done for each grid direction.
#[derive(Debug, Clone, Copy)]
pub struct NeighborQuery {
    /// Number of nearest points aggregated per direction.
    pub neighbors: usize,
    /// Maximum chord distance between query and point directions.
    pub max_distance: f32,
    /// Intensity share of the interpolation channel; range gets the rest.
    pub interpolation_weight: f64,
}

impl Default for NeighborQuery {
    fn default() -> Self {
        Self {
            neighbors: 1,
            max_distance: 5.0,
            interpolation_weight: 0.5,
        }
    }
}

/// Ordered set of points with a parallel array of ranges.
///
/// Ranges are filled when the index is built. Any transform invalidates both
/// the index and the ranges; callers rebuild before issuing further queries.
#[derive(Debug, Default)]
pub struct PointCloud {
    points: Vec<Point>,
    ranges: Vec<f32>,
    origin: Vector3<f32>,
    index: Option<DirectionIndex>,
}

impl Clone for PointCloud {
    /// Deep copy of points and ranges. The index is never shared.
    fn clone(&self) -> Self {
        Self {
            points: self.points.clone(),
            ranges: self.ranges.clone(),
            origin: self.origin,
            index: None,
        }
    }
}

impl PointCloud {
    pub fn new(points: Vec<Point>) -> Self {
        let ranges = vec![0.0; points.len()];
        Self {
            points,
            ranges,
            origin: Vector3::zeros(),
            index: None,
        }
    }

    /// Build a cloud from raw positions with zero intensity.
    pub fn from_positions(positions: &[[f32; 3]]) -> Self {
        Self::new(
            positions
                .iter()
                .map(|p| Point::new(p[0], p[1], p[2], 0.0))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point(&self, idx: usize) -> Option<&Point> {
        self.points.get(idx)
    }

    /// Ranges about [`sampling_origin`](Self::sampling_origin).
    pub fn ranges(&self) -> &[f32] {
        &self.ranges
    }

    /// Point the ranges and directions are measured from. Zero until the
    /// index is built, then the centroid of the points.
    pub fn sampling_origin(&self) -> Vector3<f32> {
        self.origin
    }

    /// Mean point position, zero for an empty cloud.
    pub fn centroid(&self) -> Vector3<f32> {
        if self.points.is_empty() {
            return Vector3::zeros();
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::<f64>::zeros(), |acc, p| acc + p.position.cast::<f64>());
        (sum / self.points.len() as f64).cast::<f32>()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn index_built(&self) -> bool {
        self.index.is_some()
    }

    /// Compute ranges and build the direction index about the centroid.
    /// No-op when already built.
    pub fn build_index(&mut self) {
        if self.index.is_some() {
            return;
        }
        self.origin = self.centroid();
        let centred: Vec<Vector3<f32>> = self
            .points
            .iter()
            .map(|p| p.position - self.origin)
            .collect();
        self.ranges = centred.iter().map(|p| p.norm()).collect();
        self.index = Some(DirectionIndex::from_positions(&centred));
    }

    /// Aggregate the nearest points of every query direction.
    ///
    /// The output has one entry per direction, in query order. Directions
    /// without any neighbour yield an empty [`FunctionValue`].
    ///
    /// # Errors
    /// [`RegistrationError::IndexNotBuilt`] when [`build_index`](Self::build_index)
    /// has not been called since the last modification.
    pub fn nearest_values(
        &self,
        directions: &[[f32; 3]],
        query: &NeighborQuery,
    ) -> Result<Vec<FunctionValue>> {
        let index = self.index.as_ref().ok_or(RegistrationError::IndexNotBuilt)?;
        let w = query.interpolation_weight;

        let values = directions
            .par_iter()
            .map(|direction| {
                let mut value = FunctionValue::new();
                let neighbors = index.nearest(direction, query.neighbors, query.max_distance);
                if neighbors.is_empty() {
                    trace!("No neighbor found for direction {:?}, skipping cell", direction);
                    return value;
                }
                for (idx, _) in neighbors {
                    let point = &self.points[idx];
                    let range = self.ranges[idx] as f64;
                    let intensity = point.intensity as f64;
                    value.add_point(&point.position);
                    value.add_range(range);
                    value.add_intensity(intensity);
                    value.add_interpolation(w * intensity + (1.0 - w) * range);
                }
                value
            })
            .collect();

        Ok(values)
    }

    /// Apply a rigid transform in place.
    pub fn transform(&mut self, isometry: &Isometry3<f32>) {
        for p in &mut self.points {
            p.position = isometry.transform_point(&Point3::from(p.position)).coords;
        }
        self.invalidate();
    }

    /// Transformed deep copy. Ranges of the copy are reset until it is indexed.
    pub fn transformed_copy(&self, isometry: &Isometry3<f32>) -> PointCloud {
        let mut copy = self.clone();
        copy.transform(isometry);
        copy
    }

    /// Copy rotated by the ZYZ Euler triple `[alpha, beta, gamma]`.
    pub fn rotate_zyz_copy(&self, zyz: &[f64; 3]) -> PointCloud {
        let rotation = zyz_to_rotation(zyz).cast::<f32>();
        let isometry = Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_rotation_matrix(&rotation),
        );
        self.transformed_copy(&isometry)
    }

    /// Copy translated by `xyz`.
    pub fn translate_copy(&self, xyz: &Vector3<f64>) -> PointCloud {
        let t = xyz.cast::<f32>();
        let isometry = Isometry3::from_parts(
            Translation3::new(t.x, t.y, t.z),
            UnitQuaternion::identity(),
        );
        self.transformed_copy(&isometry)
    }

    fn invalidate(&mut self) {
        self.index = None;
        self.origin = Vector3::zeros();
        self.ranges.clear();
        self.ranges.resize(self.points.len(), 0.0);
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
