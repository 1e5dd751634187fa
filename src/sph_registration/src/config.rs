//! Registration configuration and its builder.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::correlation::LowPassFilter;
use crate::error::{RegistrationError, Result};
use crate::evaluation::{EvaluationAlgorithm, EvaluationTarget};
use crate::model::NeighborQuery;
use crate::registration::SphRegistration;

/// Translation estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentAlgorithm {
    /// 3D phase correlation of voxel occupancy grids.
    Phase,
    /// Least squares over range differences of matched grid cells.
    Averaging,
}

impl FromStr for AlignmentAlgorithm {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "phase" => Ok(Self::Phase),
            "averaging" => Ok(Self::Averaging),
            other => Err(RegistrationError::UnknownAlgorithm {
                kind: "alignment",
                name: other.to_string(),
            }),
        }
    }
}

/// Where the correlation transforms run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationBackend {
    #[default]
    Cpu,
    /// CUDA through CubeCL. Falls back to the CPU without the `cuda` feature
    /// or without a device.
    Gpu,
}

impl FromStr for CorrelationBackend {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            other => Err(RegistrationError::UnknownAlgorithm {
                kind: "correlation backend",
                name: other.to_string(),
            }),
        }
    }
}

/// Smoothed z-score peak extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakExtractionConfig {
    /// Deviations above the running mean for a value to count as a peak.
    pub score_threshold: f64,
    /// Length of the running window.
    pub max_lag: usize,
    /// Weight of a flagged value in the running window (0 = ignored).
    pub influence: f64,
}

impl Default for PeakExtractionConfig {
    fn default() -> Self {
        Self {
            score_threshold: 3.0,
            max_lag: 100,
            influence: 0.5,
        }
    }
}

/// Voxel grid of the phase aligner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCorrelationConfig {
    /// Voxels per axis.
    pub voxels_per_dim: usize,
    /// Half side of the voxelized cube in meters, centred on the sensor.
    pub extent: f64,
    /// Normalize the cross-power spectrum to unit magnitude.
    pub normalize: bool,
}

impl Default for PhaseCorrelationConfig {
    fn default() -> Self {
        Self {
            voxels_per_dim: 64,
            extent: 25.6,
            normalize: true,
        }
    }
}

/// Configuration for [`SphRegistration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Spherical bandwidth `b`; the grid has `(2b)^2` cells.
    pub bandwidth: usize,

    pub alignment: AlignmentAlgorithm,

    /// Distribution fitted to the rotation peaks.
    pub rotation_evaluation: EvaluationAlgorithm,

    /// Distribution fitted to the translation peaks. Gaussian families only.
    pub translation_evaluation: EvaluationAlgorithm,

    pub correlation_backend: CorrelationBackend,

    /// Band of kept frequency bins. `None` disables filtering.
    pub low_pass: Option<LowPassFilter>,

    /// Nearest points aggregated per grid direction.
    pub sampling_neighbors: usize,

    /// Maximum chord distance of an aggregated point direction.
    pub neighbor_max_distance: f32,

    /// Weights of the intensity and range channels in the correlation sum.
    pub channel_weights: [f64; 2],

    /// Intensity share of the interpolation channel.
    pub interpolation_weight: f64,

    pub peak_extraction: PeakExtractionConfig,

    pub phase_correlation: PhaseCorrelationConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            bandwidth: 70,
            alignment: AlignmentAlgorithm::Phase,
            rotation_evaluation: EvaluationAlgorithm::Bingham,
            translation_evaluation: EvaluationAlgorithm::Gaussian,
            correlation_backend: CorrelationBackend::Cpu,
            low_pass: None,
            sampling_neighbors: 1,
            neighbor_max_distance: 5.0,
            channel_weights: [0.5, 0.5],
            interpolation_weight: 0.5,
            peak_extraction: PeakExtractionConfig::default(),
            phase_correlation: PhaseCorrelationConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Check every field for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bandwidth == 0 {
            return Err(RegistrationError::InvalidConfig(
                "bandwidth must be at least 1".to_string(),
            ));
        }
        if let Some(filter) = &self.low_pass {
            filter.validate()?;
        }
        if self.sampling_neighbors == 0 {
            return Err(RegistrationError::InvalidConfig(
                "sampling_neighbors must be at least 1".to_string(),
            ));
        }
        if !(self.neighbor_max_distance > 0.0) {
            return Err(RegistrationError::InvalidConfig(
                "neighbor_max_distance must be positive".to_string(),
            ));
        }
        if self.channel_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RegistrationError::InvalidConfig(
                "channel weights must be finite and non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.interpolation_weight) {
            return Err(RegistrationError::InvalidConfig(
                "interpolation_weight must lie in [0, 1]".to_string(),
            ));
        }
        if self.phase_correlation.voxels_per_dim < 2 {
            return Err(RegistrationError::InvalidConfig(
                "voxels_per_dim must be at least 2".to_string(),
            ));
        }
        if !(self.phase_correlation.extent > 0.0) {
            return Err(RegistrationError::InvalidConfig(
                "phase correlation extent must be positive".to_string(),
            ));
        }
        if self.peak_extraction.max_lag == 0 {
            return Err(RegistrationError::InvalidConfig(
                "max_lag must be at least 1".to_string(),
            ));
        }
        for (algorithm, target) in [
            (self.rotation_evaluation, EvaluationTarget::Rotation),
            (self.translation_evaluation, EvaluationTarget::Translation),
        ] {
            if target == EvaluationTarget::Translation
                && matches!(algorithm, EvaluationAlgorithm::Bingham | EvaluationAlgorithm::Bmm)
            {
                return Err(RegistrationError::InvalidConfig(format!(
                    "{algorithm:?} evaluation is only defined for rotations"
                )));
            }
        }
        Ok(())
    }

    /// Neighbour query derived from the sampling fields.
    pub fn neighbor_query(&self) -> NeighborQuery {
        NeighborQuery {
            neighbors: self.sampling_neighbors,
            max_distance: self.neighbor_max_distance,
            interpolation_weight: self.interpolation_weight,
        }
    }
}

/// Builder for [`SphRegistration`].
#[derive(Debug, Clone, Default)]
pub struct RegistrationConfigBuilder {
    config: RegistrationConfig,
}

impl RegistrationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: RegistrationConfig) -> Self {
        Self { config }
    }

    pub fn bandwidth(mut self, bandwidth: usize) -> Self {
        self.config.bandwidth = bandwidth;
        self
    }

    pub fn alignment(mut self, alignment: AlignmentAlgorithm) -> Self {
        self.config.alignment = alignment;
        self
    }

    /// Set the alignment by name.
    ///
    /// # Errors
    /// [`RegistrationError::UnknownAlgorithm`] outside {"phase", "averaging"}.
    pub fn alignment_name(self, name: &str) -> Result<Self> {
        Ok(self.alignment(name.parse()?))
    }

    pub fn rotation_evaluation(mut self, algorithm: EvaluationAlgorithm) -> Self {
        self.config.rotation_evaluation = algorithm;
        self
    }

    pub fn translation_evaluation(mut self, algorithm: EvaluationAlgorithm) -> Self {
        self.config.translation_evaluation = algorithm;
        self
    }

    /// Set both evaluators by name.
    ///
    /// # Errors
    /// [`RegistrationError::UnknownAlgorithm`] outside
    /// {"gaussian", "gmm", "bingham", "bmm"}.
    pub fn evaluation_names(self, rotation: &str, translation: &str) -> Result<Self> {
        Ok(self
            .rotation_evaluation(rotation.parse()?)
            .translation_evaluation(translation.parse()?))
    }

    pub fn correlation_backend(mut self, backend: CorrelationBackend) -> Self {
        self.config.correlation_backend = backend;
        self
    }

    /// Enable the low-pass variant of the spherical correlation.
    pub fn low_pass(mut self, lower_bound: i64, upper_bound: i64) -> Self {
        self.config.low_pass = Some(LowPassFilter {
            lower_bound,
            upper_bound,
        });
        self
    }

    pub fn sampling_neighbors(mut self, neighbors: usize) -> Self {
        self.config.sampling_neighbors = neighbors;
        self
    }

    pub fn neighbor_max_distance(mut self, distance: f32) -> Self {
        self.config.neighbor_max_distance = distance;
        self
    }

    pub fn channel_weights(mut self, intensity: f64, range: f64) -> Self {
        self.config.channel_weights = [intensity, range];
        self
    }

    pub fn interpolation_weight(mut self, weight: f64) -> Self {
        self.config.interpolation_weight = weight;
        self
    }

    pub fn score_threshold(mut self, threshold: f64) -> Self {
        self.config.peak_extraction.score_threshold = threshold;
        self
    }

    pub fn max_lag(mut self, max_lag: usize) -> Self {
        self.config.peak_extraction.max_lag = max_lag;
        self
    }

    pub fn influence(mut self, influence: f64) -> Self {
        self.config.peak_extraction.influence = influence;
        self
    }

    /// Set the phase aligner's voxel grid.
    pub fn phase_grid(mut self, voxels_per_dim: usize, extent: f64) -> Self {
        self.config.phase_correlation.voxels_per_dim = voxels_per_dim;
        self.config.phase_correlation.extent = extent;
        self
    }

    pub fn normalize_phase(mut self, normalize: bool) -> Self {
        self.config.phase_correlation.normalize = normalize;
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Validate and build the registration pipeline.
    pub fn build(self) -> Result<SphRegistration> {
        SphRegistration::with_config(self.config)
    }
}
