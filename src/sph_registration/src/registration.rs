//! Pairwise registration pipeline.
//!
//! `sample -> correlate rotation -> rotate -> align translation -> translate
//! -> evaluate rotation -> evaluate translation`

use nalgebra::Vector3;
use tracing::debug;

use crate::alignment::{create_aligner, TranslationAligner};
use crate::config::{RegistrationConfig, RegistrationConfigBuilder};
use crate::correlation::{create_spherical_correlation, SphericalCorrelation};
use crate::error::{RegistrationError, Result};
use crate::evaluation::{create_evaluator, EvaluationTarget, Evaluator};
use crate::model::{FunctionValue, NeighborQuery, PointCloud, RegistrationResult};
use crate::sampling::SphericalSampler;
use crate::statistics::{
    StatisticsManager, CORRELATION_DURATION_KEY, SAMPLE_DURATION_KEY, TRANSLATION_DURATION_KEY,
};
use crate::time_stage;

/// Spherical-correlation registration of a current cloud onto a reference.
///
/// Algorithms are chosen once from the [`RegistrationConfig`]. The sampled
/// values of the last call are kept as scratch and overwritten on every call.
pub struct SphRegistration {
    config: RegistrationConfig,
    query: NeighborQuery,
    sampler: SphericalSampler,
    correlation: Box<dyn SphericalCorrelation>,
    aligner: Box<dyn TranslationAligner>,
    rotation_evaluation: Box<dyn Evaluator>,
    translation_evaluation: Box<dyn Evaluator>,
    statistics: StatisticsManager,
    f_values: Vec<FunctionValue>,
    h_values: Vec<FunctionValue>,
}

impl SphRegistration {
    /// Registration with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(RegistrationConfig::default())
    }

    /// # Errors
    /// Any validation error of [`RegistrationConfig::validate`], or a GPU
    /// initialization failure.
    pub fn with_config(config: RegistrationConfig) -> Result<Self> {
        config.validate()?;

        let correlation = create_spherical_correlation(&config)?;
        let aligner = create_aligner(&config)?;
        let rotation_evaluation = create_evaluator(
            config.rotation_evaluation,
            EvaluationTarget::Rotation,
            &config.peak_extraction,
        )?;
        let translation_evaluation = create_evaluator(
            config.translation_evaluation,
            EvaluationTarget::Translation,
            &config.peak_extraction,
        )?;
        debug!(
            "Registration with bandwidth {}, {} correlation, {} alignment, {}/{} evaluation",
            config.bandwidth,
            correlation.name(),
            aligner.name(),
            rotation_evaluation.name(),
            translation_evaluation.name()
        );

        Ok(Self {
            query: config.neighbor_query(),
            sampler: SphericalSampler::new(config.bandwidth),
            correlation,
            aligner,
            rotation_evaluation,
            translation_evaluation,
            statistics: StatisticsManager::new(),
            f_values: Vec::new(),
            h_values: Vec::new(),
            config,
        })
    }

    pub fn builder() -> RegistrationConfigBuilder {
        RegistrationConfigBuilder::new()
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register `cur` onto `prev`.
    ///
    /// # Returns
    /// The rigid transform with `prev ~ R * cur + t`, the registered cloud and
    /// the uncertainty of both parts. A part without a significant peak has
    /// its found flag cleared.
    ///
    /// # Errors
    /// [`RegistrationError::IndexNotBuilt`] unless both clouds had
    /// [`PointCloud::build_index`] called since their last modification.
    pub fn register_point_cloud(
        &mut self,
        prev: &PointCloud,
        cur: &PointCloud,
    ) -> Result<RegistrationResult> {
        if !prev.index_built() || !cur.index_built() {
            return Err(RegistrationError::IndexNotBuilt);
        }

        let mut result = self.estimate_rotation(prev, cur)?;
        let translation = self.estimate_translation(prev, result.registered_cloud())?;
        let translation_found = self.aligner.found_solution()
            && translation.translation().iter().all(|v| v.is_finite());
        result.combine(translation);

        let rotation_uncertainty = self
            .rotation_evaluation
            .evaluate_correlation(self.aligner.as_ref(), self.correlation.as_ref())?;
        result.set_rotation_uncertainty(rotation_uncertainty);

        if self.aligner.translation_surface().is_some() {
            let translation_uncertainty = self
                .translation_evaluation
                .evaluate_correlation(self.aligner.as_ref(), self.correlation.as_ref())?;
            result.set_translation_uncertainty(translation_uncertainty);
        } else {
            result.set_translation_uncertainty(None);
            result.set_found_solution_for_translation(translation_found);
        }

        debug!(
            "Registration done: rotation found {}, translation found {}",
            result.found_solution_for_rotation(),
            result.found_solution_for_translation()
        );
        Ok(result)
    }

    /// Sample both clouds, correlate them and rotate `cur` by the estimate.
    pub fn estimate_rotation(
        &mut self,
        prev: &PointCloud,
        cur: &PointCloud,
    ) -> Result<RegistrationResult> {
        debug!("Estimating rotation");
        if !prev.index_built() || !cur.index_built() {
            return Err(RegistrationError::IndexNotBuilt);
        }

        self.f_values = time_stage!(self.statistics, SAMPLE_DURATION_KEY, {
            self.sampler.sample_uniformly(prev, &self.query)?
        });
        self.h_values = time_stage!(self.statistics, SAMPLE_DURATION_KEY, {
            self.sampler.sample_uniformly(cur, &self.query)?
        });
        if self.f_values.len() != self.h_values.len() {
            return Err(RegistrationError::SignalLengthMismatch {
                expected: self.f_values.len(),
                actual: self.h_values.len(),
            });
        }

        let zyz = time_stage!(self.statistics, CORRELATION_DURATION_KEY, {
            self.correlation
                .correlate_sampled_values(&self.f_values, &self.h_values)?
        });
        debug!("Found rotation (ZYZ): {:?}", zyz);

        Ok(RegistrationResult::from_rotation(cur.rotate_zyz_copy(&zyz), zyz))
    }

    /// Align the rotated cloud to `prev` and translate it by the estimate.
    pub fn estimate_translation(
        &mut self,
        prev: &PointCloud,
        rotated: &PointCloud,
    ) -> Result<RegistrationResult> {
        debug!("Estimating translation");

        let mut rotated = rotated.clone();
        if self.aligner.uses_sampled_values() {
            rotated.build_index();
            self.h_values = time_stage!(self.statistics, SAMPLE_DURATION_KEY, {
                self.sampler.sample_uniformly(&rotated, &self.query)?
            });
        }

        let xyz: Vector3<f64> = time_stage!(self.statistics, TRANSLATION_DURATION_KEY, {
            self.aligner
                .align_registered(prev, &self.f_values, &rotated, &self.h_values)?
        });
        debug!("Found translation: {:?}", xyz);

        Ok(RegistrationResult::from_translation(rotated.translate_copy(&xyz), xyz))
    }

    /// Reinitialize the sampler and the spherical engine at a new bandwidth.
    pub fn set_bandwidth(&mut self, bandwidth: usize) -> Result<()> {
        let mut config = self.config.clone();
        config.bandwidth = bandwidth;
        config.validate()?;
        self.correlation = create_spherical_correlation(&config)?;
        self.sampler.initialize(bandwidth);
        self.config = config;
        Ok(())
    }

    pub fn bandwidth(&self) -> usize {
        self.config.bandwidth
    }

    pub fn statistics(&self) -> &StatisticsManager {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut StatisticsManager {
        &mut self.statistics
    }

    pub fn correlation(&self) -> &dyn SphericalCorrelation {
        self.correlation.as_ref()
    }

    pub fn aligner(&self) -> &dyn TranslationAligner {
        self.aligner.as_ref()
    }

    pub fn rotation_evaluation(&self) -> &dyn Evaluator {
        self.rotation_evaluation.as_ref()
    }

    pub fn rotation_evaluation_mut(&mut self) -> &mut dyn Evaluator {
        self.rotation_evaluation.as_mut()
    }

    pub fn translation_evaluation(&self) -> &dyn Evaluator {
        self.translation_evaluation.as_ref()
    }

    pub fn translation_evaluation_mut(&mut self) -> &mut dyn Evaluator {
        self.translation_evaluation.as_mut()
    }

    /// Sampled values of the reference cloud from the last call.
    pub fn f_values(&self) -> &[FunctionValue] {
        &self.f_values
    }

    /// Sampled values of the current cloud from the last call.
    pub fn h_values(&self) -> &[FunctionValue] {
        &self.h_values
    }
}
