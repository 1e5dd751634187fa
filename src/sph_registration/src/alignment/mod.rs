//! Translation estimation between a reference cloud and a rotation-corrected
//! current cloud.

pub mod averaging;
pub mod phase;

use nalgebra::Vector3;

use crate::config::{AlignmentAlgorithm, RegistrationConfig};
use crate::correlation::{create_spatial_correlation, TranslationSurface};
use crate::error::Result;
use crate::model::{FunctionValue, PointCloud};

pub use averaging::{RangeAlignment, RangeAveragingAligner};
pub use phase::{voxelize, PhaseAligner};

/// Estimates `t` such that `prev ~ rotated + t`.
pub trait TranslationAligner: Send {
    /// # Arguments
    /// * `prev` - Reference cloud
    /// * `f_values` - Sampling pass of `prev`
    /// * `rotated` - Current cloud after the rotation estimate was applied
    /// * `h_values` - Sampling pass of `rotated` when
    ///   [`uses_sampled_values`](Self::uses_sampled_values) is true, otherwise
    ///   the pass of the unrotated current cloud
    fn align_registered(
        &mut self,
        prev: &PointCloud,
        f_values: &[FunctionValue],
        rotated: &PointCloud,
        h_values: &[FunctionValue],
    ) -> Result<Vector3<f64>>;

    /// Correlation surface of the last alignment, if the method produces one.
    fn translation_surface(&self) -> Option<&TranslationSurface>;

    /// Whether the last alignment was well posed. Methods with a surface
    /// leave this to the surface evaluation.
    fn found_solution(&self) -> bool {
        true
    }

    /// Whether `h_values` must be resampled from the rotated cloud.
    fn uses_sampled_values(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Build the aligner selected by the configuration.
pub fn create_aligner(config: &RegistrationConfig) -> Result<Box<dyn TranslationAligner>> {
    Ok(match config.alignment {
        AlignmentAlgorithm::Phase => Box::new(PhaseAligner::new(
            config.phase_correlation.clone(),
            create_spatial_correlation(config)?,
        )),
        AlignmentAlgorithm::Averaging => Box::new(RangeAveragingAligner::new()),
    })
}
