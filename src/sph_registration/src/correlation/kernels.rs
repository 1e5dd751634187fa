//! CubeCL kernels for batched DFTs and cross-power spectra.
//!
//! Complex data lives in split real/imaginary `f32` arrays. Twiddle factors
//! are precomputed on the host so kernels only index tables.

use cubecl::prelude::*;

/// One DFT along an axis of a batch of cubic or square grids.
///
/// Every thread produces one output element. The element's position along
/// the transformed axis is `(idx / stride) % n`; the other coordinates are
/// kept. `sign` is `-1` for the forward and `+1` for the inverse transform.
/// No normalization is applied.
///
/// # Arguments
/// - `in_re`, `in_im`: [total] input
/// - `cos_table`, `sin_table`: [n] `cos(2 pi k / n)`, `sin(2 pi k / n)`
/// - `out_re`, `out_im`: [total] output
#[cube(launch_unchecked)]
pub fn dft_axis_kernel<F: Float>(
    in_re: &Array<F>,
    in_im: &Array<F>,
    cos_table: &Array<F>,
    sin_table: &Array<F>,
    sign: F,
    n: u32,
    stride: u32,
    total: u32,
    out_re: &mut Array<F>,
    out_im: &mut Array<F>,
) {
    let idx = ABSOLUTE_POS;

    if idx >= total {
        terminate!();
    }

    let k = (idx / stride) % n;
    let base = idx - k * stride;

    let mut acc_re = F::new(0.0);
    let mut acc_im = F::new(0.0);

    for m in 0..n {
        let src = base + m * stride;
        let tw = (m * k) % n;
        let c = cos_table[tw];
        let s = sign * sin_table[tw];
        let a = in_re[src];
        let b = in_im[src];
        acc_re += a * c - b * s;
        acc_im += a * s + b * c;
    }

    out_re[idx] = acc_re;
    out_im[idx] = acc_im;
}

/// Elementwise `f * conj(g)`, optionally scaled to unit magnitude.
///
/// Magnitudes at or below `epsilon` are left unscaled. `normalize` is 0 or 1.
#[cube(launch_unchecked)]
pub fn cross_power_kernel<F: Float>(
    f_re: &Array<F>,
    f_im: &Array<F>,
    g_re: &Array<F>,
    g_im: &Array<F>,
    normalize: u32,
    epsilon: F,
    total: u32,
    out_re: &mut Array<F>,
    out_im: &mut Array<F>,
) {
    let idx = ABSOLUTE_POS;

    if idx >= total {
        terminate!();
    }

    let fr = f_re[idx];
    let fi = f_im[idx];
    let gr = g_re[idx];
    let gi = g_im[idx];

    let mut re = fr * gr + fi * gi;
    let mut im = fi * gr - fr * gi;

    if normalize == 1 {
        let mag = F::sqrt(re * re + im * im);
        if mag > epsilon {
            re /= mag;
            im /= mag;
        }
    }

    out_re[idx] = re;
    out_im[idx] = im;
}

/// Copy a real array into a complex buffer with a zero imaginary part.
#[cube(launch_unchecked)]
pub fn load_real_kernel<F: Float>(
    input: &Array<F>,
    total: u32,
    out_re: &mut Array<F>,
    out_im: &mut Array<F>,
) {
    let idx = ABSOLUTE_POS;

    if idx >= total {
        terminate!();
    }

    out_re[idx] = input[idx];
    out_im[idx] = F::new(0.0);
}

/// Host-side twiddle tables for a transform of length `n`.
pub fn twiddle_tables(n: usize) -> (Vec<f32>, Vec<f32>) {
    (0..n)
        .map(|k| {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            (angle.cos() as f32, angle.sin() as f32)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_twiddle_tables() {
        let (cos, sin) = twiddle_tables(4);
        assert_eq!(cos.len(), 4);
        assert_relative_eq!(cos[0], 1.0);
        assert_relative_eq!(sin[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(cos[2], -1.0, epsilon = 1e-6);
        assert_relative_eq!(sin[3], -1.0, epsilon = 1e-6);
    }
}
