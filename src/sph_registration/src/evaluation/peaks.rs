//! Smoothed z-score peak extraction.
//!
//! Walks the flattened surface once. Each value is compared against the mean
//! and deviation of the preceding `max_lag` filtered values and flagged when it
//! exceeds the mean by `score_threshold` deviations. Flagged values enter the
//! filtered history damped by `influence`, so a broad peak does not raise its
//! own baseline. The surfaces are periodic, so the history of the first values
//! is seeded with the tail of the surface.

use crate::config::PeakExtractionConfig;

#[derive(Debug, Clone)]
pub struct ZScorePeakExtraction {
    config: PeakExtractionConfig,
}

impl ZScorePeakExtraction {
    pub fn new(config: PeakExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakExtractionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PeakExtractionConfig {
        &mut self.config
    }

    /// Indices of all values flagged as peaks, in ascending order.
    pub fn extract_peaks(&self, values: &[f64]) -> Vec<usize> {
        let len = values.len();
        let lag = self.config.max_lag.min(len.saturating_sub(1));
        if lag == 0 {
            return Vec::new();
        }
        let threshold = self.config.score_threshold;
        let influence = self.config.influence;

        // filtered[k] holds the history value for surface index k - lag.
        let mut filtered = Vec::with_capacity(len + lag);
        filtered.extend_from_slice(&values[len - lag..]);
        let mut sum: f64 = filtered.iter().sum();
        let mut sum_sq: f64 = filtered.iter().map(|v| v * v).sum();

        let mut peaks = Vec::new();
        for (i, &value) in values.iter().enumerate() {
            let mean = sum / lag as f64;
            let std = (sum_sq / lag as f64 - mean * mean).max(0.0).sqrt();

            let next = if std > 0.0 && value - mean > threshold * std {
                peaks.push(i);
                let previous = filtered[i + lag - 1];
                influence * value + (1.0 - influence) * previous
            } else {
                value
            };

            let leaving = filtered[i];
            filtered.push(next);
            sum += next - leaving;
            sum_sq += next * next - leaving * leaving;
        }
        peaks
    }
}

impl Default for ZScorePeakExtraction {
    fn default() -> Self {
        Self::new(PeakExtractionConfig::default())
    }
}
