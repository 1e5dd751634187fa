//! Uncertainty estimation from the peaks of a correlation surface.
//!
//! # Pipeline
//!
//! 1. Pick the surface for the evaluated quantity: the SO(3) surface of the
//!    spherical engine for rotation, the aligner's surface for translation.
//! 2. Flag significant values with [`ZScorePeakExtraction`].
//! 3. Seed one mode at the global maximum and one more at every flagged
//!    value reaching [`SECONDARY_MODE_RATIO`] of its height that lies
//!    outside the windows of the modes found so far.
//! 4. Map every above-mean cell inside a mode window to a sample (unit
//!    quaternion or metric offset) weighted by its height above the mean,
//!    relative to the maximum.
//! 5. Fit the evaluator's distribution family to the main mode, or one
//!    component per mode for the mixtures.
//!
//! Fits are widened by the incoherent share of the surface: a surface whose
//! peak falls short of its theoretical bound spreads the estimate over the
//! mode window.
//!
//! No flagged value, or no surface at all, yields `Ok(None)`.

pub mod bingham;
pub mod gaussian;
pub mod peaks;

use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::alignment::TranslationAligner;
use crate::config::PeakExtractionConfig;
use crate::correlation::{CorrelationSurface, SphericalCorrelation, TranslationSurface};
use crate::distribution::UncertaintyDistribution;
use crate::error::{RegistrationError, Result};
use crate::rotation::zyz_to_quaternion;

pub use bingham::{BinghamEvaluator, BinghamMixtureEvaluator};
pub use gaussian::{GaussianEvaluator, GaussianMixtureEvaluator};
pub use peaks::ZScorePeakExtraction;

/// Mode window radius, in multiples of the surface resolution.
const CLUSTER_RADIUS_STEPS: f64 = 3.0;

/// Relative height a flagged peak needs to seed a secondary mode.
pub const SECONDARY_MODE_RATIO: f64 = 0.5;

/// Distribution family fitted to the peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationAlgorithm {
    Gaussian,
    Gmm,
    Bingham,
    Bmm,
}

impl FromStr for EvaluationAlgorithm {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gaussian" => Ok(Self::Gaussian),
            "gmm" => Ok(Self::Gmm),
            "bingham" => Ok(Self::Bingham),
            "bmm" => Ok(Self::Bmm),
            other => Err(RegistrationError::UnknownAlgorithm {
                kind: "evaluation",
                name: other.to_string(),
            }),
        }
    }
}

/// Quantity whose uncertainty is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationTarget {
    Rotation,
    Translation,
}

/// Peak-based uncertainty evaluator.
pub trait Evaluator: Send {
    /// # Returns
    /// The fitted distribution, or `None` when nothing clears the threshold.
    ///
    /// # Errors
    /// Propagates [`RegistrationError::TransformNotComputed`] when the
    /// rotation surface is read before any correlation.
    fn evaluate_correlation(
        &self,
        aligner: &dyn TranslationAligner,
        correlation: &dyn SphericalCorrelation,
    ) -> Result<Option<UncertaintyDistribution>>;

    fn peak_extraction(&self) -> &ZScorePeakExtraction;

    fn peak_extraction_mut(&mut self) -> &mut ZScorePeakExtraction;

    fn target(&self) -> EvaluationTarget;

    fn name(&self) -> &'static str;
}

/// Build an evaluator for one target.
///
/// # Errors
/// [`RegistrationError::InvalidConfig`] for a Bingham family on translation.
pub fn create_evaluator(
    algorithm: EvaluationAlgorithm,
    target: EvaluationTarget,
    peaks: &PeakExtractionConfig,
) -> Result<Box<dyn Evaluator>> {
    let extraction = ZScorePeakExtraction::new(peaks.clone());
    Ok(match (algorithm, target) {
        (EvaluationAlgorithm::Gaussian, _) => Box::new(GaussianEvaluator::new(target, extraction)),
        (EvaluationAlgorithm::Gmm, _) => Box::new(GaussianMixtureEvaluator::new(target, extraction)),
        (EvaluationAlgorithm::Bingham, EvaluationTarget::Rotation) => {
            Box::new(BinghamEvaluator::new(extraction))
        }
        (EvaluationAlgorithm::Bmm, EvaluationTarget::Rotation) => {
            Box::new(BinghamMixtureEvaluator::new(extraction))
        }
        (algorithm, EvaluationTarget::Translation) => {
            return Err(RegistrationError::InvalidConfig(format!(
                "{algorithm:?} evaluation is only defined for rotations"
            )))
        }
    })
}

/// Weighted samples taken in the mode windows of one surface.
#[derive(Debug, Clone)]
pub struct PeakSamples {
    pub target: EvaluationTarget,
    /// One sample per column.
    pub samples: DMatrix<f64>,
    pub weights: Vec<f64>,
    /// Sample indices of every mode, the main mode first.
    pub modes: Vec<Vec<usize>>,
    /// Grid spacing in sample units.
    pub resolution: f64,
    /// Peak height against the surface's bound; 1 when there is no bound.
    pub coherence: f64,
}

impl PeakSamples {
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Samples of the mode at the global maximum.
    pub fn main_mode(&self) -> &[usize] {
        self.modes.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn radius(&self) -> f64 {
        CLUSTER_RADIUS_STEPS * self.resolution
    }

    pub fn mode_weight(&self, mode: &[usize]) -> f64 {
        mode.iter().map(|&i| self.weights[i]).sum()
    }

    /// Columns and weights of a subset of samples.
    pub fn subset(&self, indices: &[usize]) -> (DMatrix<f64>, Vec<f64>) {
        let columns: Vec<_> = indices.iter().map(|&i| self.samples.column(i)).collect();
        let samples = DMatrix::from_columns(&columns);
        let weights = indices.iter().map(|&i| self.weights[i]).collect();
        (samples, weights)
    }

    /// Covariance added for the incoherent share of the surface.
    ///
    /// Spreads `1 - coherence` of the mass uniformly over the mode window.
    /// Rotations only spread in the tangent space of the unit quaternion
    /// sphere at `mean`.
    pub fn incoherent_spread(&self, mean: &DVector<f64>) -> DMatrix<f64> {
        let dim = mean.len();
        let variance = (1.0 - self.coherence).max(0.0) * self.radius().powi(2) / 5.0;
        let identity = DMatrix::<f64>::identity(dim, dim);
        let projector = match self.target {
            EvaluationTarget::Rotation if mean.norm() > 0.0 => {
                let axis = mean / mean.norm();
                identity - &axis * axis.transpose()
            }
            _ => identity,
        };
        projector * variance
    }
}

/// The surface an evaluator reads.
enum PeakSurface<'a> {
    Rotation(&'a CorrelationSurface),
    Translation(&'a TranslationSurface),
}

impl PeakSurface<'_> {
    fn values(&self) -> &[f64] {
        match self {
            Self::Rotation(surface) => surface.values(),
            Self::Translation(surface) => surface.values(),
        }
    }

    fn resolution(&self) -> f64 {
        match self {
            // Quaternions move at half the rotation angle.
            Self::Rotation(surface) => surface.angular_step() / 2.0,
            Self::Translation(surface) => surface.voxel_size(),
        }
    }

    fn coherence(&self) -> Option<f64> {
        match self {
            Self::Rotation(surface) => surface.coherence(),
            Self::Translation(surface) => surface.coherence(),
        }
    }

    fn sample(&self, index: usize) -> DVector<f64> {
        match self {
            Self::Rotation(surface) => {
                let q = zyz_to_quaternion(&surface.angles_at(index));
                DVector::from_column_slice(q.as_slice())
            }
            Self::Translation(surface) => DVector::from_column_slice(surface.offset_of(index).as_slice()),
        }
    }
}

/// Collect the weighted mode samples of the surface belonging to `target`.
///
/// Rotation samples are `[w, x, y, z]` quaternions, sign-aligned to the
/// seed of their mode; translation samples are metric offsets.
pub fn collect_samples(
    target: EvaluationTarget,
    extraction: &ZScorePeakExtraction,
    aligner: &dyn TranslationAligner,
    correlation: &dyn SphericalCorrelation,
) -> Result<Option<PeakSamples>> {
    let surface = match target {
        EvaluationTarget::Rotation => PeakSurface::Rotation(correlation.correlation()?),
        EvaluationTarget::Translation => match aligner.translation_surface() {
            Some(surface) => PeakSurface::Translation(surface),
            None => return Ok(None),
        },
    };
    let values = surface.values();
    let Some(stats) = SurfaceStats::new(values) else {
        return Ok(None);
    };

    let mut flagged: Vec<usize> = extraction
        .extract_peaks(values)
        .into_iter()
        .filter(|&i| values[i] > stats.mean)
        .collect();
    debug!("{:?} evaluation: {} significant peaks", target, flagged.len());
    if flagged.is_empty() {
        return Ok(None);
    }

    let resolution = surface.resolution();
    let radius = CLUSTER_RADIUS_STEPS * resolution;
    let antipodal = target == EvaluationTarget::Rotation;
    let distance = |a: &DVector<f64>, b: &DVector<f64>| {
        let d = (a - b).norm();
        if antipodal {
            d.min((a + b).norm())
        } else {
            d
        }
    };

    let mut seeds = vec![surface.sample(stats.argmax)];
    flagged.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    for index in flagged {
        if stats.relative(values[index]) < SECONDARY_MODE_RATIO {
            break;
        }
        let candidate = surface.sample(index);
        if seeds.iter().all(|seed| distance(&candidate, seed) > radius) {
            seeds.push(candidate);
        }
    }

    let mut columns = Vec::new();
    let mut weights = Vec::new();
    let mut modes = vec![Vec::new(); seeds.len()];
    for (index, &value) in values.iter().enumerate() {
        if value <= stats.mean {
            continue;
        }
        let mut sample = surface.sample(index);
        let nearest = seeds
            .iter()
            .enumerate()
            .map(|(k, seed)| (k, distance(&sample, seed)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((mode, _)) = nearest else {
            continue;
        };
        if antipodal && sample.dot(&seeds[mode]) < 0.0 {
            sample = -sample;
        }
        modes[mode].push(columns.len());
        columns.push(sample);
        weights.push(stats.relative(value));
    }
    debug!(
        "{:?} evaluation: {} modes, {} window samples",
        target,
        modes.len(),
        columns.len()
    );

    Ok(Some(PeakSamples {
        target,
        samples: DMatrix::from_columns(&columns),
        weights,
        modes,
        resolution,
        coherence: surface.coherence().unwrap_or(1.0),
    }))
}

/// Mean and maximum of a surface.
struct SurfaceStats {
    mean: f64,
    max: f64,
    argmax: usize,
}

impl SurfaceStats {
    /// `None` for empty surfaces and surfaces without a raised maximum.
    fn new(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let (argmax, max) = values
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best });
        (max > mean).then_some(Self { mean, max, argmax })
    }

    /// Height above the mean as a share of the maximum's, in `(0, 1]`.
    fn relative(&self, value: f64) -> f64 {
        (value - self.mean) / (self.max - self.mean)
    }
}
