//! CPU spherical correlation engine.

use tracing::debug;

use super::low_pass::LowPassFilter;
use super::so3::{cross_spectra, synthesize};
use super::types::CorrelationSurface;
use super::SphericalCorrelation;
use crate::error::{RegistrationError, Result};
use crate::harmonics::{SphericalCoefficients, SphericalTransform};

/// Forward transforms of both clouds' channels, kept between the transform
/// and correlation steps.
#[derive(Debug)]
pub struct SpectralState {
    transform: SphericalTransform,
    channel_weights: Vec<f64>,
    filter: Option<LowPassFilter>,
    f_coeffs: Option<Vec<SphericalCoefficients>>,
    h_coeffs: Option<Vec<SphericalCoefficients>>,
}

impl SpectralState {
    pub fn new(bandwidth: usize, channel_weights: Vec<f64>) -> Self {
        Self {
            transform: SphericalTransform::new(bandwidth),
            channel_weights,
            filter: None,
            f_coeffs: None,
            h_coeffs: None,
        }
    }

    pub fn bandwidth(&self) -> usize {
        self.transform.bandwidth()
    }

    pub fn set_filter(&mut self, filter: Option<LowPassFilter>) {
        self.filter = filter;
    }

    pub fn filter(&self) -> Option<&LowPassFilter> {
        self.filter.as_ref()
    }

    pub fn channel_weights(&self) -> &[f64] {
        &self.channel_weights
    }

    /// Transform and optionally filter every channel of both signals.
    ///
    /// # Errors
    /// Channel counts must match each other and the configured weights, and
    /// every channel must hold one value per grid cell.
    pub fn transform_signals(&mut self, f: &[Vec<f64>], h: &[Vec<f64>]) -> Result<()> {
        self.f_coeffs = None;
        self.h_coeffs = None;
        let expected = self.channel_weights.len();
        for channels in [f, h] {
            if channels.len() != expected {
                return Err(RegistrationError::ChannelCountMismatch {
                    expected,
                    actual: channels.len(),
                });
            }
        }

        let forward = |channels: &[Vec<f64>]| -> Result<Vec<SphericalCoefficients>> {
            channels
                .iter()
                .map(|signal| {
                    let mut coeffs = self.transform.forward(signal)?;
                    if let Some(filter) = &self.filter {
                        filter.apply(&mut coeffs);
                    }
                    Ok(coeffs)
                })
                .collect()
        };
        let f_coeffs = forward(f)?;
        let h_coeffs = forward(h)?;
        self.f_coeffs = Some(f_coeffs);
        self.h_coeffs = Some(h_coeffs);
        Ok(())
    }

    /// Weighted cross-spectrum slices of the transformed signals.
    ///
    /// # Errors
    /// [`RegistrationError::TransformNotComputed`] before
    /// [`transform_signals`](Self::transform_signals) succeeded.
    pub fn cross_spectra(&self) -> Result<Vec<Vec<rustfft::num_complex::Complex<f64>>>> {
        let (Some(f), Some(h)) = (&self.f_coeffs, &self.h_coeffs) else {
            return Err(RegistrationError::TransformNotComputed);
        };
        Ok(cross_spectra(f, h, &self.channel_weights))
    }

    /// Upper bound of the correlation surface, `sum |w| sqrt(E_f E_h)` over
    /// channels. Wigner rotations preserve coefficient energy, so no rotation
    /// correlates better than this.
    pub fn reference_peak(&self) -> Result<f64> {
        let (Some(f), Some(h)) = (&self.f_coeffs, &self.h_coeffs) else {
            return Err(RegistrationError::TransformNotComputed);
        };
        Ok(f.iter()
            .zip(h)
            .zip(&self.channel_weights)
            .map(|((fc, hc), w)| w.abs() * (fc.energy() * hc.energy()).sqrt())
            .sum())
    }
}

/// Spherical correlation with all transforms on the CPU.
#[derive(Debug)]
pub struct SphericalCorrelationCpu {
    state: SpectralState,
    surface: Option<CorrelationSurface>,
}

impl SphericalCorrelationCpu {
    /// Unfiltered engine.
    pub fn new(bandwidth: usize, channel_weights: Vec<f64>) -> Self {
        Self {
            state: SpectralState::new(bandwidth, channel_weights),
            surface: None,
        }
    }

    /// Engine that band-limits the coefficients before correlating.
    pub fn low_pass(bandwidth: usize, channel_weights: Vec<f64>, filter: LowPassFilter) -> Self {
        let mut engine = Self::new(bandwidth, channel_weights);
        engine.state.set_filter(Some(filter));
        engine
    }

    pub fn state(&self) -> &SpectralState {
        &self.state
    }

    /// Forward step only; see [`SpectralState::transform_signals`].
    pub fn transform_signals(&mut self, f: &[Vec<f64>], h: &[Vec<f64>]) -> Result<()> {
        self.surface = None;
        self.state.transform_signals(f, h)
    }

    /// Correlate the signals of the last forward step.
    pub fn correlate_transformed(&mut self) -> Result<[f64; 3]> {
        let slices = self.state.cross_spectra()?;
        let bandwidth = self.state.bandwidth();
        let surface = CorrelationSurface::new(bandwidth, synthesize(bandwidth, &slices))
            .with_reference(self.state.reference_peak()?);
        let zyz = surface.max_angles();
        debug!("CPU correlation peak at ZYZ {:?}", zyz);
        self.surface = Some(surface);
        Ok(zyz)
    }
}

impl SphericalCorrelation for SphericalCorrelationCpu {
    fn bandwidth(&self) -> usize {
        self.state.bandwidth()
    }

    fn correlate_signals(&mut self, f: &[Vec<f64>], h: &[Vec<f64>]) -> Result<[f64; 3]> {
        self.transform_signals(f, h)?;
        self.correlate_transformed()
    }

    fn correlation(&self) -> Result<&CorrelationSurface> {
        self.surface
            .as_ref()
            .ok_or(RegistrationError::TransformNotComputed)
    }

    fn name(&self) -> &'static str {
        if self.state.filter().is_some() {
            "cpu-low-pass"
        } else {
            "cpu"
        }
    }
}
