//! CUDA correlation engines.
//!
//! Spherical harmonic transforms and cross-spectra stay on the CPU; the
//! SO(3) synthesis (one 2D inverse DFT per `beta` ring) runs on the device.
//! The spatial engine runs the full 3D phase correlation on the device.
//!
//! # Example
//!
//! ```ignore
//! use sph_registration::correlation::gpu::{is_cuda_available, SphericalCorrelationGpu};
//!
//! if is_cuda_available() {
//!     let mut engine = SphericalCorrelationGpu::new(32, vec![0.5, 0.5], None)?;
//!     let zyz = engine.correlate_signals(&f, &h)?;
//! }
//! ```

use cubecl::client::ComputeClient;
use cubecl::cuda::{CudaDevice, CudaRuntime};
use cubecl::prelude::*;
use cubecl::server::Handle;
use tracing::debug;

use super::cpu::SpectralState;
use super::kernels::{cross_power_kernel, dft_axis_kernel, load_real_kernel, twiddle_tables};
use super::low_pass::LowPassFilter;
use super::spatial::{SpatialCorrelation, CROSS_POWER_EPSILON};
use super::types::CorrelationSurface;
use super::SphericalCorrelation;
use crate::error::{RegistrationError, Result};

type CudaClient = ComputeClient<<CudaRuntime as Runtime>::Server>;

const BLOCK_SIZE: u32 = 256;

/// Check if CUDA is available on this system.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        let _device = CudaDevice::new(0);
    })
    .is_ok()
}

/// Device buffers of a split complex array.
struct ComplexBuffer {
    re: Handle,
    im: Handle,
}

/// Batched DFTs of one length on the default device.
struct GpuDft {
    #[allow(dead_code)]
    device: CudaDevice,
    client: CudaClient,
    n: usize,
    cos_table: Handle,
    sin_table: Handle,
}

impl GpuDft {
    fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(RegistrationError::Gpu("transform length must be positive".into()));
        }
        if !is_cuda_available() {
            return Err(RegistrationError::Gpu("no CUDA device found".into()));
        }
        let device = CudaDevice::new(0);
        let client = CudaRuntime::client(&device);
        let (cos, sin) = twiddle_tables(n);
        let cos_table = client.create(f32::as_bytes(&cos));
        let sin_table = client.create(f32::as_bytes(&sin));
        Ok(Self {
            device,
            client,
            n,
            cos_table,
            sin_table,
        })
    }

    fn upload(&self, re: &[f32], im: &[f32]) -> ComplexBuffer {
        ComplexBuffer {
            re: self.client.create(f32::as_bytes(re)),
            im: self.client.create(f32::as_bytes(im)),
        }
    }

    fn empty(&self, total: usize) -> ComplexBuffer {
        ComplexBuffer {
            re: self.client.empty(total * std::mem::size_of::<f32>()),
            im: self.client.empty(total * std::mem::size_of::<f32>()),
        }
    }

    /// Copy a real host array into `output`, clearing its imaginary part.
    fn load_real(&self, values: &[f32], output: &ComplexBuffer) {
        let total = values.len();
        let staging = self.client.create(f32::as_bytes(values));
        let cube_count = (total as u32).div_ceil(BLOCK_SIZE);

        unsafe {
            load_real_kernel::launch_unchecked::<f32, CudaRuntime>(
                &self.client,
                CubeCount::Static(cube_count, 1, 1),
                CubeDim::new(BLOCK_SIZE, 1, 1),
                ArrayArg::from_raw_parts::<f32>(&staging, total, 1),
                ScalarArg::new(total as u32),
                ArrayArg::from_raw_parts::<f32>(&output.re, total, 1),
                ArrayArg::from_raw_parts::<f32>(&output.im, total, 1),
            );
        }
    }

    /// Transform every line of stride `stride` in a batch of `total` elements.
    fn transform_axis(&self, input: &ComplexBuffer, output: &ComplexBuffer, total: usize, stride: usize, sign: f32) {
        let cube_count = (total as u32).div_ceil(BLOCK_SIZE);

        unsafe {
            dft_axis_kernel::launch_unchecked::<f32, CudaRuntime>(
                &self.client,
                CubeCount::Static(cube_count, 1, 1),
                CubeDim::new(BLOCK_SIZE, 1, 1),
                ArrayArg::from_raw_parts::<f32>(&input.re, total, 1),
                ArrayArg::from_raw_parts::<f32>(&input.im, total, 1),
                ArrayArg::from_raw_parts::<f32>(&self.cos_table, self.n, 1),
                ArrayArg::from_raw_parts::<f32>(&self.sin_table, self.n, 1),
                ScalarArg::new(sign),
                ScalarArg::new(self.n as u32),
                ScalarArg::new(stride as u32),
                ScalarArg::new(total as u32),
                ArrayArg::from_raw_parts::<f32>(&output.re, total, 1),
                ArrayArg::from_raw_parts::<f32>(&output.im, total, 1),
            );
        }
    }

    /// Apply the transform along each of `strides` in turn.
    ///
    /// Passes alternate between `data` and `scratch`; the handles are
    /// swapped after each pass so the result always ends in `data`.
    fn transform_axes(
        &self,
        data: &mut ComplexBuffer,
        scratch: &mut ComplexBuffer,
        total: usize,
        strides: &[usize],
        sign: f32,
    ) {
        for &stride in strides {
            self.transform_axis(data, scratch, total, stride, sign);
            std::mem::swap(data, scratch);
        }
    }

    fn cross_power(&self, f: &ComplexBuffer, g: &ComplexBuffer, output: &ComplexBuffer, total: usize, normalize: bool) {
        let cube_count = (total as u32).div_ceil(BLOCK_SIZE);

        unsafe {
            cross_power_kernel::launch_unchecked::<f32, CudaRuntime>(
                &self.client,
                CubeCount::Static(cube_count, 1, 1),
                CubeDim::new(BLOCK_SIZE, 1, 1),
                ArrayArg::from_raw_parts::<f32>(&f.re, total, 1),
                ArrayArg::from_raw_parts::<f32>(&f.im, total, 1),
                ArrayArg::from_raw_parts::<f32>(&g.re, total, 1),
                ArrayArg::from_raw_parts::<f32>(&g.im, total, 1),
                ScalarArg::new(u32::from(normalize)),
                ScalarArg::new(CROSS_POWER_EPSILON as f32),
                ScalarArg::new(total as u32),
                ArrayArg::from_raw_parts::<f32>(&output.re, total, 1),
                ArrayArg::from_raw_parts::<f32>(&output.im, total, 1),
            );
        }
    }

    fn read_real(&self, data: &ComplexBuffer) -> Vec<f32> {
        let bytes = self.client.read_one(data.re.clone());
        f32::from_bytes(&bytes).to_vec()
    }
}

/// Spherical correlation with the SO(3) synthesis on the GPU.
pub struct SphericalCorrelationGpu {
    state: SpectralState,
    dft: GpuDft,
    surface: Option<CorrelationSurface>,
}

impl std::fmt::Debug for SphericalCorrelationGpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SphericalCorrelationGpu")
            .field("bandwidth", &self.state.bandwidth())
            .field("filter", &self.state.filter())
            .finish()
    }
}

impl SphericalCorrelationGpu {
    /// # Errors
    /// [`RegistrationError::Gpu`] when no CUDA device can be opened.
    pub fn new(bandwidth: usize, channel_weights: Vec<f64>, filter: Option<LowPassFilter>) -> Result<Self> {
        let mut state = SpectralState::new(bandwidth, channel_weights);
        state.set_filter(filter);
        Ok(Self {
            state,
            dft: GpuDft::new(2 * bandwidth)?,
            surface: None,
        })
    }

    fn synthesize(&self) -> Result<Vec<f64>> {
        let slices = self.state.cross_spectra()?;
        let n = 2 * self.state.bandwidth();
        let total = n * n * n;

        let mut re = Vec::with_capacity(total);
        let mut im = Vec::with_capacity(total);
        for c in slices.iter().flatten() {
            re.push(c.re as f32);
            im.push(c.im as f32);
        }
        if re.len() != total {
            return Err(RegistrationError::Gpu(format!(
                "cross-spectrum has {} values, expected {}",
                re.len(),
                total
            )));
        }

        // Slices are [beta][m][m']: gamma along stride 1, alpha along stride n.
        let mut data = self.dft.upload(&re, &im);
        let mut scratch = self.dft.empty(total);
        self.dft.transform_axes(&mut data, &mut scratch, total, &[1, n], 1.0);
        Ok(self.dft.read_real(&data).into_iter().map(f64::from).collect())
    }
}

impl SphericalCorrelation for SphericalCorrelationGpu {
    fn bandwidth(&self) -> usize {
        self.state.bandwidth()
    }

    fn correlate_signals(&mut self, f: &[Vec<f64>], h: &[Vec<f64>]) -> Result<[f64; 3]> {
        self.surface = None;
        self.state.transform_signals(f, h)?;
        let surface = CorrelationSurface::new(self.state.bandwidth(), self.synthesize()?)
            .with_reference(self.state.reference_peak()?);
        let zyz = surface.max_angles();
        debug!("GPU correlation peak at ZYZ {:?}", zyz);
        self.surface = Some(surface);
        Ok(zyz)
    }

    fn correlation(&self) -> Result<&CorrelationSurface> {
        self.surface
            .as_ref()
            .ok_or(RegistrationError::TransformNotComputed)
    }

    fn name(&self) -> &'static str {
        if self.state.filter().is_some() {
            "gpu-low-pass"
        } else {
            "gpu"
        }
    }
}

/// 3D phase correlation on the GPU.
///
/// The spectra of both grids, their cross-power and one scratch buffer are
/// allocated once in [`SpatialCorrelationGpu::new`] and reused by every
/// call. They are released when the engine is dropped.
pub struct SpatialCorrelationGpu {
    dft: GpuDft,
    f: ComplexBuffer,
    g: ComplexBuffer,
    cross: ComplexBuffer,
    scratch: ComplexBuffer,
}

impl SpatialCorrelationGpu {
    pub fn new(voxels_per_dim: usize) -> Result<Self> {
        let dft = GpuDft::new(voxels_per_dim)?;
        let total = voxels_per_dim.pow(3);
        debug!("Allocating GPU phase correlation buffers for {} voxels", total);
        Ok(Self {
            f: dft.empty(total),
            g: dft.empty(total),
            cross: dft.empty(total),
            scratch: dft.empty(total),
            dft,
        })
    }
}

impl SpatialCorrelation for SpatialCorrelationGpu {
    fn voxels_per_dim(&self) -> usize {
        self.dft.n
    }

    fn correlate(&mut self, f: &[f64], g: &[f64], normalize: bool) -> Result<Vec<f64>> {
        let n = self.dft.n;
        let total = n * n * n;
        for grid in [f, g] {
            if grid.len() != total {
                return Err(RegistrationError::SignalLengthMismatch {
                    expected: total,
                    actual: grid.len(),
                });
            }
        }

        let to_f32 = |v: &[f64]| -> Vec<f32> { v.iter().map(|x| *x as f32).collect() };
        let axes = [1, n, n * n];

        self.dft.load_real(&to_f32(f), &self.f);
        self.dft
            .transform_axes(&mut self.f, &mut self.scratch, total, &axes, -1.0);
        self.dft.load_real(&to_f32(g), &self.g);
        self.dft
            .transform_axes(&mut self.g, &mut self.scratch, total, &axes, -1.0);
        self.dft
            .cross_power(&self.f, &self.g, &self.cross, total, normalize);
        self.dft
            .transform_axes(&mut self.cross, &mut self.scratch, total, &axes, 1.0);

        let scale = 1.0 / total as f64;
        Ok(self
            .dft
            .read_real(&self.cross)
            .into_iter()
            .map(|v| f64::from(v) * scale)
            .collect())
    }
}
