//! Gaussian and Gaussian-mixture fits of the peak samples.

use tracing::debug;

use super::{collect_samples, EvaluationTarget, Evaluator, PeakSamples, ZScorePeakExtraction};
use crate::alignment::TranslationAligner;
use crate::correlation::SphericalCorrelation;
use crate::distribution::{Gaussian, GaussianMixture, UncertaintyDistribution};
use crate::error::Result;

/// Weighted Gaussian fit of one mode, inflated by the grid quantization
/// variance and the surface's incoherent spread.
fn fit_gaussian(samples: &PeakSamples, mode: &[usize]) -> Option<Gaussian> {
    let (columns, weights) = samples.subset(mode);
    let mut gaussian = Gaussian::fit_weighted(&columns, &weights)?;
    gaussian.inflate(samples.resolution * samples.resolution / 12.0);
    let cov = gaussian.cov() + samples.incoherent_spread(gaussian.mean());
    Some(Gaussian::new(gaussian.mean().clone(), cov))
}

/// Single Gaussian over the main mode.
pub struct GaussianEvaluator {
    target: EvaluationTarget,
    extraction: ZScorePeakExtraction,
}

impl GaussianEvaluator {
    pub fn new(target: EvaluationTarget, extraction: ZScorePeakExtraction) -> Self {
        Self { target, extraction }
    }
}

impl Evaluator for GaussianEvaluator {
    fn evaluate_correlation(
        &self,
        aligner: &dyn TranslationAligner,
        correlation: &dyn SphericalCorrelation,
    ) -> Result<Option<UncertaintyDistribution>> {
        let Some(samples) = collect_samples(self.target, &self.extraction, aligner, correlation)? else {
            return Ok(None);
        };
        Ok(fit_gaussian(&samples, samples.main_mode()).map(UncertaintyDistribution::Gaussian))
    }

    fn peak_extraction(&self) -> &ZScorePeakExtraction {
        &self.extraction
    }

    fn peak_extraction_mut(&mut self) -> &mut ZScorePeakExtraction {
        &mut self.extraction
    }

    fn target(&self) -> EvaluationTarget {
        self.target
    }

    fn name(&self) -> &'static str {
        "gaussian"
    }
}

/// One Gaussian per mode, weighted by the mode's total sample weight.
pub struct GaussianMixtureEvaluator {
    target: EvaluationTarget,
    extraction: ZScorePeakExtraction,
}

impl GaussianMixtureEvaluator {
    pub fn new(target: EvaluationTarget, extraction: ZScorePeakExtraction) -> Self {
        Self { target, extraction }
    }
}

impl Evaluator for GaussianMixtureEvaluator {
    fn evaluate_correlation(
        &self,
        aligner: &dyn TranslationAligner,
        correlation: &dyn SphericalCorrelation,
    ) -> Result<Option<UncertaintyDistribution>> {
        let Some(samples) = collect_samples(self.target, &self.extraction, aligner, correlation)? else {
            return Ok(None);
        };

        let mut components = Vec::new();
        let mut weights = Vec::new();
        for mode in &samples.modes {
            if let Some(gaussian) = fit_gaussian(&samples, mode) {
                weights.push(samples.mode_weight(mode));
                components.push(gaussian);
            }
        }
        debug!("Gaussian mixture with {} components", components.len());
        if components.is_empty() {
            return Ok(None);
        }
        Ok(Some(UncertaintyDistribution::GaussianMixture(
            GaussianMixture::new(components, weights),
        )))
    }

    fn peak_extraction(&self) -> &ZScorePeakExtraction {
        &self.extraction
    }

    fn peak_extraction_mut(&mut self) -> &mut ZScorePeakExtraction {
        &mut self.extraction
    }

    fn target(&self) -> EvaluationTarget {
        self.target
    }

    fn name(&self) -> &'static str {
        "gmm"
    }
}
