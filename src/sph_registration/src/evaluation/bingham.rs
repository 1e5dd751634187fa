//! Bingham and Bingham-mixture fits of rotation peaks.

use nalgebra::DVector;
use tracing::debug;

use super::{collect_samples, EvaluationTarget, Evaluator, PeakSamples, ZScorePeakExtraction};
use crate::alignment::TranslationAligner;
use crate::correlation::SphericalCorrelation;
use crate::distribution::{Bingham, BinghamMixture, UncertaintyDistribution};
use crate::error::Result;

fn fit_bingham(samples: &PeakSamples, mode: &[usize]) -> Bingham {
    let (columns, weights) = samples.subset(mode);
    Bingham::fit_weighted(&columns, &DVector::from_vec(weights))
}

pub struct BinghamEvaluator {
    extraction: ZScorePeakExtraction,
}

impl BinghamEvaluator {
    pub fn new(extraction: ZScorePeakExtraction) -> Self {
        Self { extraction }
    }
}

impl Evaluator for BinghamEvaluator {
    fn evaluate_correlation(
        &self,
        aligner: &dyn TranslationAligner,
        correlation: &dyn SphericalCorrelation,
    ) -> Result<Option<UncertaintyDistribution>> {
        let samples = collect_samples(EvaluationTarget::Rotation, &self.extraction, aligner, correlation)?;
        Ok(samples.map(|samples| UncertaintyDistribution::Bingham(fit_bingham(&samples, samples.main_mode()))))
    }

    fn peak_extraction(&self) -> &ZScorePeakExtraction {
        &self.extraction
    }

    fn peak_extraction_mut(&mut self) -> &mut ZScorePeakExtraction {
        &mut self.extraction
    }

    fn target(&self) -> EvaluationTarget {
        EvaluationTarget::Rotation
    }

    fn name(&self) -> &'static str {
        "bingham"
    }
}

/// One Bingham per mode; `q` and `-q` belong to the same mode.
pub struct BinghamMixtureEvaluator {
    extraction: ZScorePeakExtraction,
}

impl BinghamMixtureEvaluator {
    pub fn new(extraction: ZScorePeakExtraction) -> Self {
        Self { extraction }
    }
}

impl Evaluator for BinghamMixtureEvaluator {
    fn evaluate_correlation(
        &self,
        aligner: &dyn TranslationAligner,
        correlation: &dyn SphericalCorrelation,
    ) -> Result<Option<UncertaintyDistribution>> {
        let Some(samples) =
            collect_samples(EvaluationTarget::Rotation, &self.extraction, aligner, correlation)?
        else {
            return Ok(None);
        };

        let weights: Vec<f64> = samples.modes.iter().map(|m| samples.mode_weight(m)).collect();
        let components: Vec<Bingham> = samples.modes.iter().map(|m| fit_bingham(&samples, m)).collect();
        debug!("Bingham mixture with {} components", components.len());

        Ok(Some(UncertaintyDistribution::BinghamMixture(BinghamMixture::new(
            components, weights,
        ))))
    }

    fn peak_extraction(&self) -> &ZScorePeakExtraction {
        &self.extraction
    }

    fn peak_extraction_mut(&mut self) -> &mut ZScorePeakExtraction {
        &mut self.extraction
    }

    fn target(&self) -> EvaluationTarget {
        EvaluationTarget::Rotation
    }

    fn name(&self) -> &'static str {
        "bmm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeakExtractionConfig;
    use crate::correlation::CorrelationSurface;
    use crate::error::RegistrationError;
    use crate::rotation::zyz_to_quaternion;
    use crate::test_utils::{make_peak_surface, FixedCorrelation, FixedSurfaceAligner};

    const BANDWIDTH: usize = 8;
    const SIDE: usize = 16;

    fn peak_quaternion(coords: [usize; 3]) -> DVector<f64> {
        let surface = CorrelationSurface::new(BANDWIDTH, vec![0.0; SIDE * SIDE * SIDE]);
        let index = (coords[0] * SIDE + coords[1]) * SIDE + coords[2];
        let q = zyz_to_quaternion(&surface.angles_at(index));
        DVector::from_vec(vec![q[0], q[1], q[2], q[3]])
    }

    fn extraction() -> ZScorePeakExtraction {
        ZScorePeakExtraction::new(PeakExtractionConfig::default())
    }

    #[test]
    fn test_bingham_mode_at_peak() {
        let evaluator = BinghamEvaluator::new(extraction());
        let correlation = FixedCorrelation::new(BANDWIDTH, make_peak_surface(SIDE, &[[3, 2, 5]], 0.6));
        let result = evaluator
            .evaluate_correlation(&FixedSurfaceAligner::missing(), &correlation)
            .unwrap();

        let Some(UncertaintyDistribution::Bingham(bingham)) = result else {
            panic!("expected a bingham");
        };
        let expected = peak_quaternion([3, 2, 5]);
        assert!(bingham.mode().dot(&expected).abs() > 0.95);
        assert!(bingham.concentrations().iter().all(|z| *z <= 0.0));
        assert!((bingham.moment().trace() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_flat_surface_has_no_estimate() {
        let evaluator = BinghamEvaluator::new(extraction());
        let correlation = FixedCorrelation::new(BANDWIDTH, vec![0.0; SIDE * SIDE * SIDE]);
        assert!(evaluator
            .evaluate_correlation(&FixedSurfaceAligner::missing(), &correlation)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_requires_rotation_surface() {
        let evaluator = BinghamEvaluator::new(extraction());
        assert!(matches!(
            evaluator.evaluate_correlation(&FixedSurfaceAligner::missing(), &FixedCorrelation::empty()),
            Err(RegistrationError::TransformNotComputed)
        ));
    }

    #[test]
    fn test_mixture_of_two_rotations() {
        let evaluator = BinghamMixtureEvaluator::new(extraction());
        let correlation = FixedCorrelation::new(
            BANDWIDTH,
            make_peak_surface(SIDE, &[[3, 2, 5], [10, 12, 1]], 0.6),
        );
        let result = evaluator
            .evaluate_correlation(&FixedSurfaceAligner::missing(), &correlation)
            .unwrap();

        let Some(UncertaintyDistribution::BinghamMixture(mixture)) = result else {
            panic!("expected a mixture");
        };
        assert!(mixture.components().len() >= 2);
        let mode = mixture.mode();
        let near_first = mode.dot(&peak_quaternion([3, 2, 5])).abs();
        let near_second = mode.dot(&peak_quaternion([10, 12, 1])).abs();
        assert!(near_first.max(near_second) > 0.95);
        assert_eq!(evaluator.name(), "bmm");
    }
}
