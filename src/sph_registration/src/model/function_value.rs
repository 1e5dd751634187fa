//! Per-cell aggregation of the neighbours found for one grid direction.

use nalgebra::Vector3;

/// Signal channel read from a [`FunctionValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalChannel {
    Intensity,
    Range,
    Interpolation,
}

/// Aggregated neighbours of one spherical grid cell.
///
/// Sums are accumulated while the sampler walks the neighbours of a cell and
/// read back as averages. A value with no contributions belongs to a skipped
/// cell and reads as zero on every channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionValue {
    point_sum: Vector3<f64>,
    range_sum: f64,
    intensity_sum: f64,
    interpolation_sum: f64,
    num_points: usize,
    num_ranges: usize,
    num_intensities: usize,
    num_interpolations: usize,
}

impl FunctionValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, point: &Vector3<f32>) {
        self.point_sum += point.cast::<f64>();
        self.num_points += 1;
    }

    pub fn add_range(&mut self, range: f64) {
        self.range_sum += range;
        self.num_ranges += 1;
    }

    pub fn add_intensity(&mut self, intensity: f64) {
        self.intensity_sum += intensity;
        self.num_intensities += 1;
    }

    pub fn add_interpolation(&mut self, value: f64) {
        self.interpolation_sum += value;
        self.num_interpolations += 1;
    }

    /// True when no neighbour contributed to this cell.
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn averaged_point(&self) -> Vector3<f64> {
        if self.num_points == 0 {
            return Vector3::zeros();
        }
        self.point_sum / self.num_points as f64
    }

    pub fn averaged_range(&self) -> f64 {
        average(self.range_sum, self.num_ranges)
    }

    pub fn averaged_intensity(&self) -> f64 {
        average(self.intensity_sum, self.num_intensities)
    }

    pub fn averaged_interpolation(&self) -> f64 {
        average(self.interpolation_sum, self.num_interpolations)
    }

    pub fn channel(&self, channel: SignalChannel) -> f64 {
        match channel {
            SignalChannel::Intensity => self.averaged_intensity(),
            SignalChannel::Range => self.averaged_range(),
            SignalChannel::Interpolation => self.averaged_interpolation(),
        }
    }
}

fn average(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Extract one channel of a sampling pass as a flat signal in grid order.
pub fn extract_channel(values: &[FunctionValue], channel: SignalChannel) -> Vec<f64> {
    values.iter().map(|v| v.channel(channel)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_averages() {
        let mut value = FunctionValue::new();
        value.add_point(&Vector3::new(1.0, 2.0, 3.0));
        value.add_point(&Vector3::new(3.0, 2.0, 1.0));
        value.add_range(2.0);
        value.add_range(4.0);
        value.add_intensity(10.0);
        value.add_intensity(20.0);
        value.add_interpolation(6.0);
        value.add_interpolation(12.0);

        assert_eq!(value.num_points(), 2);
        assert_relative_eq!(value.averaged_point(), Vector3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(value.averaged_range(), 3.0);
        assert_relative_eq!(value.channel(SignalChannel::Intensity), 15.0);
        assert_relative_eq!(value.channel(SignalChannel::Interpolation), 9.0);
    }

    #[test]
    fn test_empty_value_reads_zero() {
        let value = FunctionValue::default();
        assert!(value.is_empty());
        assert_eq!(value.averaged_range(), 0.0);
        assert_eq!(value.averaged_point(), Vector3::zeros());
        let signal = extract_channel(&[value.clone(), value], SignalChannel::Range);
        assert_eq!(signal, vec![0.0, 0.0]);
    }
}
