//! Correlation surfaces over the rotation group and over 3D offsets.

use std::f64::consts::PI;

use nalgebra::Vector3;

/// Correlation sampled on the SO(3) grid of one bandwidth.
///
/// Layout is `[beta][alpha][gamma]`, each axis of length `2b`, with
/// `alpha = 2 pi a / 2b`, `beta = pi (2j + 1) / 4b` and `gamma = 2 pi g / 2b`.
///
/// The beta samples never include 0. The identity is not on the grid: the
/// closest rotation is `pi / 4b` away, so correlating a signal with itself
/// reports a small non-zero angle.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSurface {
    bandwidth: usize,
    values: Vec<f64>,
    reference: Option<f64>,
}

impl CorrelationSurface {
    /// # Panics
    /// If `values.len() != (2b)^3`.
    pub fn new(bandwidth: usize, values: Vec<f64>) -> Self {
        let n = 2 * bandwidth;
        assert_eq!(values.len(), n * n * n, "CorrelationSurface: length");
        Self {
            bandwidth,
            values,
            reference: None,
        }
    }

    /// Attach the value a perfect match would reach, an upper bound of the
    /// surface.
    pub fn with_reference(mut self, reference: f64) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Peak value relative to the reference, in `[0, 1]`.
    pub fn coherence(&self) -> Option<f64> {
        coherence(&self.values, self.reference)
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    pub fn side(&self) -> usize {
        2 * self.bandwidth
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grid spacing in `alpha` and `gamma`, in radians.
    pub fn angular_step(&self) -> f64 {
        2.0 * PI / self.side() as f64
    }

    /// ZYZ angles `[alpha, beta, gamma]` of a flat index.
    pub fn angles_at(&self, index: usize) -> [f64; 3] {
        let n = self.side();
        let j = index / (n * n);
        let a = (index / n) % n;
        let g = index % n;
        [
            self.angular_step() * a as f64,
            PI * (2 * j + 1) as f64 / (4 * self.bandwidth) as f64,
            self.angular_step() * g as f64,
        ]
    }

    /// Index of the global maximum; the first one on ties.
    pub fn argmax(&self) -> usize {
        argmax(&self.values)
    }

    pub fn max_angles(&self) -> [f64; 3] {
        self.angles_at(self.argmax())
    }
}

/// Correlation over a cubic grid of 3D offsets, centred on zero offset.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationSurface {
    voxels_per_dim: usize,
    voxel_size: f64,
    values: Vec<f64>,
    reference: Option<f64>,
}

impl TranslationSurface {
    /// # Panics
    /// If `values.len() != voxels_per_dim^3`.
    pub fn new(voxels_per_dim: usize, voxel_size: f64, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            voxels_per_dim.pow(3),
            "TranslationSurface: length"
        );
        Self {
            voxels_per_dim,
            voxel_size,
            values,
            reference: None,
        }
    }

    /// See [`CorrelationSurface::with_reference`].
    pub fn with_reference(mut self, reference: f64) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn coherence(&self) -> Option<f64> {
        coherence(&self.values, self.reference)
    }

    pub fn voxels_per_dim(&self) -> usize {
        self.voxels_per_dim
    }

    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Integer voxel coordinates of a flat index.
    pub fn coords(&self, index: usize) -> [usize; 3] {
        let n = self.voxels_per_dim;
        [index / (n * n), (index / n) % n, index % n]
    }

    /// Metric offset of a flat index; the centre voxel is zero offset.
    pub fn offset_of(&self, index: usize) -> Vector3<f64> {
        let c = self.coords(index);
        let half = (self.voxels_per_dim / 2) as f64;
        Vector3::new(
            (c[0] as f64 - half) * self.voxel_size,
            (c[1] as f64 - half) * self.voxel_size,
            (c[2] as f64 - half) * self.voxel_size,
        )
    }

    pub fn argmax(&self) -> usize {
        argmax(&self.values)
    }

    /// Peak offset refined by the weighted centroid of the positive
    /// 3x3x3 neighbourhood around the maximum.
    pub fn refined_peak_offset(&self) -> Vector3<f64> {
        let n = self.voxels_per_dim as i64;
        let peak = self.argmax();
        let c = self.coords(peak);
        let mut acc = Vector3::zeros();
        let mut total = 0.0;
        for dx in -1..=1_i64 {
            for dy in -1..=1_i64 {
                for dz in -1..=1_i64 {
                    let x = c[0] as i64 + dx;
                    let y = c[1] as i64 + dy;
                    let z = c[2] as i64 + dz;
                    if x < 0 || y < 0 || z < 0 || x >= n || y >= n || z >= n {
                        continue;
                    }
                    let w = self.values[((x * n + y) * n + z) as usize].max(0.0);
                    acc += Vector3::new(dx as f64, dy as f64, dz as f64) * w;
                    total += w;
                }
            }
        }
        let base = self.offset_of(peak);
        if total > 0.0 {
            base + acc * (self.voxel_size / total)
        } else {
            base
        }
    }
}

fn coherence(values: &[f64], reference: Option<f64>) -> Option<f64> {
    let reference = reference.filter(|r| *r > 0.0 && r.is_finite())?;
    let max = values.get(argmax(values))?;
    Some((max / reference).clamp(0.0, 1.0))
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_angles_at() {
        let mut values = vec![0.0; 64];
        // beta index 1, alpha index 2, gamma index 3
        let index = (4 + 2) * 4 + 3;
        values[index] = 1.0;
        let surface = CorrelationSurface::new(2, values);
        let angles = surface.max_angles();
        assert_relative_eq!(angles[0], PI);
        assert_relative_eq!(angles[1], 3.0 * PI / 8.0);
        assert_relative_eq!(angles[2], 1.5 * PI);
    }

    #[test]
    fn test_closest_grid_rotation_to_identity() {
        let bandwidth = 8;
        let n = 2 * bandwidth;
        let mut values = vec![0.0; n * n * n];
        values[0] = 1.0;
        let surface = CorrelationSurface::new(bandwidth, values);
        let angles = surface.max_angles();
        assert_eq!(angles[0], 0.0);
        assert_relative_eq!(angles[1], PI / (4 * bandwidth) as f64);
        assert_eq!(angles[2], 0.0);
    }

    #[test]
    fn test_coherence_against_reference() {
        let mut values = vec![0.0; 64];
        values[5] = 2.0;
        let surface = CorrelationSurface::new(2, values.clone());
        assert_eq!(surface.coherence(), None);
        assert_relative_eq!(surface.clone().with_reference(8.0).coherence().unwrap(), 0.25);
        assert_eq!(surface.clone().with_reference(0.0).coherence(), None);

        let translation = TranslationSurface::new(4, 1.0, values).with_reference(1.0);
        assert_eq!(translation.coherence(), Some(1.0));
    }

    #[test]
    fn test_translation_offsets() {
        let n = 8;
        let mut values = vec![0.0; n * n * n];
        // voxel (5, 4, 2) -> offset (1, 0, -2) voxels
        let peak = (5 * n + 4) * n + 2;
        values[peak] = 4.0;
        values[(6 * n + 4) * n + 2] = 4.0;
        let surface = TranslationSurface::new(n, 0.5, values);

        assert_relative_eq!(surface.offset_of(peak), Vector3::new(0.5, 0.0, -1.0));
        // Equal neighbour pulls the estimate halfway.
        assert_relative_eq!(surface.refined_peak_offset(), Vector3::new(0.75, 0.0, -1.0));
    }
}
