//! Command-line parameters of the registration host.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sph_registration::{CorrelationBackend, RegistrationConfig, RegistrationConfigBuilder, SphRegistration};

/// Register successive PLY clouds of a directory.
#[derive(Debug, Clone, Parser)]
#[command(name = "sph_registration_app", version, about)]
pub struct Params {
    /// Directory with the input `*.ply` clouds, registered in file name order.
    pub input: PathBuf,

    /// Index of the first cloud to read.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// JSON registration config; flags below override its fields.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory receiving every registered cloud.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// File name prefix of written clouds.
    #[arg(long, default_value = "registered_")]
    pub output_prefix: String,

    /// Spherical bandwidth.
    #[arg(long)]
    pub bandwidth: Option<usize>,

    /// Translation method: phase or averaging.
    #[arg(long)]
    pub alignment: Option<String>,

    /// Rotation uncertainty: gaussian, gmm, bingham or bmm.
    #[arg(long)]
    pub rotation_evaluation: Option<String>,

    /// Translation uncertainty: gaussian or gmm.
    #[arg(long)]
    pub translation_evaluation: Option<String>,

    /// Correlation backend: cpu or gpu.
    #[arg(long)]
    pub backend: Option<String>,

    /// Low-pass band `LOWER,UPPER` of kept coefficient indices.
    #[arg(long, value_delimiter = ',', num_args = 2)]
    pub low_pass: Option<Vec<i64>>,

    /// Nearest points aggregated per grid cell.
    #[arg(long)]
    pub neighbors: Option<usize>,

    /// Maximum neighbour distance on the unit sphere.
    #[arg(long)]
    pub max_distance: Option<f32>,

    /// Z-score threshold of peak extraction.
    #[arg(long)]
    pub score_threshold: Option<f64>,

    /// Window length of peak extraction.
    #[arg(long)]
    pub max_lag: Option<usize>,

    /// Voxels per axis of the phase aligner.
    #[arg(long)]
    pub phase_voxels: Option<usize>,

    /// Half side of the phase aligner's cube in meters.
    #[arg(long)]
    pub phase_extent: Option<f64>,
}

impl Params {
    /// Base configuration from `--config`, or the defaults.
    pub fn base_config(&self) -> Result<RegistrationConfig> {
        let Some(path) = &self.config else {
            return Ok(RegistrationConfig::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply the command-line overrides.
    pub fn builder(&self) -> Result<RegistrationConfigBuilder> {
        let mut builder = RegistrationConfigBuilder::from_config(self.base_config()?);

        if let Some(bandwidth) = self.bandwidth {
            builder = builder.bandwidth(bandwidth);
        }
        if let Some(name) = &self.alignment {
            builder = builder.alignment_name(name)?;
        }
        if let Some(name) = &self.rotation_evaluation {
            builder = builder.rotation_evaluation(name.parse()?);
        }
        if let Some(name) = &self.translation_evaluation {
            builder = builder.translation_evaluation(name.parse()?);
        }
        if let Some(name) = &self.backend {
            builder = builder.correlation_backend(name.parse::<CorrelationBackend>()?);
        }
        if let Some(bounds) = &self.low_pass {
            if let &[lower, upper] = bounds.as_slice() {
                builder = builder.low_pass(lower, upper);
            }
        }
        if let Some(neighbors) = self.neighbors {
            builder = builder.sampling_neighbors(neighbors);
        }
        if let Some(distance) = self.max_distance {
            builder = builder.neighbor_max_distance(distance);
        }
        if let Some(threshold) = self.score_threshold {
            builder = builder.score_threshold(threshold);
        }
        if let Some(max_lag) = self.max_lag {
            builder = builder.max_lag(max_lag);
        }
        if self.phase_voxels.is_some() || self.phase_extent.is_some() {
            let current = builder.config().phase_correlation.clone();
            builder = builder.phase_grid(
                self.phase_voxels.unwrap_or(current.voxels_per_dim),
                self.phase_extent.unwrap_or(current.extent),
            );
        }

        Ok(builder)
    }

    pub fn build_registration(&self) -> Result<SphRegistration> {
        Ok(self.builder()?.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sph_registration::{AlignmentAlgorithm, EvaluationAlgorithm};

    #[test]
    fn test_defaults_without_flags() {
        let params = Params::parse_from(["app", "/data"]);
        assert_eq!(params.offset, 0);
        let builder = params.builder().unwrap();
        assert_eq!(builder.config(), &RegistrationConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let params = Params::parse_from([
            "app",
            "/data",
            "--bandwidth",
            "16",
            "--alignment",
            "averaging",
            "--rotation-evaluation",
            "bmm",
            "--low-pass",
            "2,40",
            "--phase-voxels",
            "32",
        ]);
        let builder = params.builder().unwrap();
        let config = builder.config();
        assert_eq!(config.bandwidth, 16);
        assert_eq!(config.alignment, AlignmentAlgorithm::Averaging);
        assert_eq!(config.rotation_evaluation, EvaluationAlgorithm::Bmm);
        let filter = config.low_pass.unwrap();
        assert_eq!((filter.lower_bound, filter.upper_bound), (2, 40));
        assert_eq!(config.phase_correlation.voxels_per_dim, 32);
        assert_eq!(config.phase_correlation.extent, 25.6);
    }

    #[test]
    fn test_unknown_name_fails() {
        let params = Params::parse_from(["app", "/data", "--alignment", "icp"]);
        assert!(params.builder().is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = RegistrationConfig {
            bandwidth: 12,
            ..RegistrationConfig::default()
        };
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let path_arg = path.to_str().unwrap();
        let params = Params::parse_from(["app", "/data", "--config", path_arg, "--max-lag", "7"]);
        let builder = params.builder().unwrap();
        assert_eq!(builder.config().bandwidth, 12);
        assert_eq!(builder.config().peak_extraction.max_lag, 7);
    }

    #[test]
    fn test_missing_config_file() {
        let params = Params::parse_from(["app", "/data", "--config", "/nonexistent/config.json"]);
        assert!(params.base_config().is_err());
    }
}
