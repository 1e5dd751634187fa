//! Band-limiting of spherical harmonic coefficients.

use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};
use crate::harmonics::SphericalCoefficients;

/// Keeps coefficients whose shifted index lies in `[lower_bound, upper_bound)`.
///
/// The coefficient array is cyclically shifted by half its length before
/// masking and shifted back afterwards. Bounds are clamped to `[0, b^2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowPassFilter {
    pub lower_bound: i64,
    pub upper_bound: i64,
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self {
            lower_bound: 0,
            upper_bound: 100_000,
        }
    }
}

impl LowPassFilter {
    /// # Errors
    /// [`RegistrationError::InvalidFilterBounds`] for a negative lower bound
    /// or a non-positive upper bound.
    pub fn new(lower_bound: i64, upper_bound: i64) -> Result<Self> {
        let filter = Self {
            lower_bound,
            upper_bound,
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lower_bound < 0 || self.upper_bound <= 0 {
            return Err(RegistrationError::InvalidFilterBounds {
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        Ok(())
    }

    /// Bounds clamped to a coefficient array of `len` entries.
    pub fn clamped(&self, len: usize) -> (usize, usize) {
        let clamp = |v: i64| v.clamp(0, len as i64) as usize;
        (clamp(self.lower_bound), clamp(self.upper_bound))
    }

    pub fn apply(&self, coeffs: &mut SphericalCoefficients) {
        let data = coeffs.as_mut_slice();
        let len = data.len();
        let (lower, upper) = self.clamped(len);
        let half = len / 2;

        data.rotate_right(half);
        for (i, c) in data.iter_mut().enumerate() {
            if i < lower || i >= upper {
                *c = Default::default();
            }
        }
        data.rotate_left(half);
    }
}
