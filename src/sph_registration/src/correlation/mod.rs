//! Frequency-domain correlation of spherical and volumetric signals.
//!
//! # Architecture
//!
//! - [`SphericalCorrelation`]: rotation search. Both clouds are sampled on the
//!   spherical grid, every channel is transformed to spherical harmonics, the
//!   channels' cross-spectra are combined and synthesized over SO(3). The
//!   maximum of the surface is the ZYZ rotation estimate.
//! - [`SpatialCorrelation`]: translation search by 3D phase correlation of
//!   voxel occupancy grids.
//!
//! CPU engines are always available; GPU engines need the `cuda` feature.

pub mod cpu;
pub mod low_pass;
pub mod so3;
pub mod spatial;
pub mod types;

#[cfg(feature = "cuda")]
pub mod gpu;
#[cfg(feature = "cuda")]
pub mod kernels;

use tracing::warn;

use crate::config::{CorrelationBackend, RegistrationConfig};
use crate::error::Result;
use crate::model::{extract_channel, FunctionValue, SignalChannel};

pub use cpu::{SpectralState, SphericalCorrelationCpu};
pub use low_pass::LowPassFilter;
pub use spatial::{center_zero_offset, SpatialCorrelation, SpatialCorrelationCpu};
pub use types::{CorrelationSurface, TranslationSurface};

/// Channels correlated for rotation, in weight order.
pub const CORRELATION_CHANNELS: [SignalChannel; 2] = [SignalChannel::Intensity, SignalChannel::Range];

/// Rotation search over two multi-channel spherical signals.
pub trait SphericalCorrelation: Send {
    fn bandwidth(&self) -> usize;

    /// Correlate `f` (reference) with `h` (current) and return the ZYZ angles
    /// of the rotation that maps `h` onto `f`.
    ///
    /// Each slice element is one channel with `(2b)^2` values.
    fn correlate_signals(&mut self, f: &[Vec<f64>], h: &[Vec<f64>]) -> Result<[f64; 3]>;

    /// Surface of the last successful correlation.
    fn correlation(&self) -> Result<&CorrelationSurface>;

    fn name(&self) -> &'static str;

    /// Correlate the intensity and range channels of two sampling passes.
    fn correlate_sampled_values(
        &mut self,
        f_values: &[FunctionValue],
        h_values: &[FunctionValue],
    ) -> Result<[f64; 3]> {
        let f = sampled_signals(f_values);
        let h = sampled_signals(h_values);
        self.correlate_signals(&f, &h)
    }
}

/// Standardized intensity and range signals of one sampling pass.
///
/// Statistics are taken over the sampled cells only. Skipped cells read as
/// the mean, zero after standardization.
pub fn sampled_signals(values: &[FunctionValue]) -> Vec<Vec<f64>> {
    let sampled: Vec<bool> = values.iter().map(|v| !v.is_empty()).collect();
    CORRELATION_CHANNELS
        .iter()
        .map(|&channel| standardize_masked(extract_channel(values, channel), &sampled))
        .collect()
}

/// Shift to zero mean and scale to unit variance. Constant signals become zero.
pub fn standardize(signal: Vec<f64>) -> Vec<f64> {
    let mask = vec![true; signal.len()];
    standardize_masked(signal, &mask)
}

/// [`standardize`] with mean and variance taken where `mask` is set.
/// Entries outside the mask become zero.
pub fn standardize_masked(mut signal: Vec<f64>, mask: &[bool]) -> Vec<f64> {
    let (count, sum) = signal
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .fold((0usize, 0.0), |(n, s), (v, _)| (n + 1, s + v));
    if count == 0 {
        signal.iter_mut().for_each(|v| *v = 0.0);
        return signal;
    }
    let mean = sum / count as f64;
    let var = signal
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|(v, _)| (v - mean).powi(2))
        .sum::<f64>()
        / count as f64;
    let std = var.sqrt();
    for (v, &m) in signal.iter_mut().zip(mask) {
        *v = if m && std > 0.0 { (*v - mean) / std } else { 0.0 };
    }
    signal
}

/// Build the spherical engine selected by the configuration.
///
/// Requesting the GPU backend without CUDA support falls back to the CPU.
pub fn create_spherical_correlation(config: &RegistrationConfig) -> Result<Box<dyn SphericalCorrelation>> {
    let weights = config.channel_weights.to_vec();
    let filter = config.low_pass;

    match config.correlation_backend {
        CorrelationBackend::Cpu => Ok(Box::new(cpu_engine(config.bandwidth, weights, filter))),
        CorrelationBackend::Gpu => {
            #[cfg(feature = "cuda")]
            {
                if gpu::is_cuda_available() {
                    let engine = gpu::SphericalCorrelationGpu::new(config.bandwidth, weights, filter)?;
                    return Ok(Box::new(engine));
                }
            }
            warn!("GPU correlation requested but CUDA is not available, using CPU");
            Ok(Box::new(cpu_engine(config.bandwidth, weights, filter)))
        }
    }
}

/// Build the spatial engine used by phase alignment.
pub fn create_spatial_correlation(config: &RegistrationConfig) -> Result<Box<dyn SpatialCorrelation>> {
    let n = config.phase_correlation.voxels_per_dim;
    match config.correlation_backend {
        CorrelationBackend::Cpu => Ok(Box::new(SpatialCorrelationCpu::new(n))),
        CorrelationBackend::Gpu => {
            #[cfg(feature = "cuda")]
            {
                if gpu::is_cuda_available() {
                    return Ok(Box::new(gpu::SpatialCorrelationGpu::new(n)?));
                }
            }
            warn!("GPU spatial correlation requested but CUDA is not available, using CPU");
            Ok(Box::new(SpatialCorrelationCpu::new(n)))
        }
    }
}

fn cpu_engine(
    bandwidth: usize,
    weights: Vec<f64>,
    filter: Option<LowPassFilter>,
) -> SphericalCorrelationCpu {
    match filter {
        Some(filter) => SphericalCorrelationCpu::low_pass(bandwidth, weights, filter),
        None => SphericalCorrelationCpu::new(bandwidth, weights),
    }
}
