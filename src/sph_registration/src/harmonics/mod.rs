//! Spherical harmonic analysis and rotation-group special functions.

pub mod legendre;
pub mod transform;
pub mod wigner;

pub use legendre::{quadrature_weights, LegendreTable};
pub use transform::{SphericalCoefficients, SphericalTransform};
pub use wigner::{wigner_d, wigner_d_series};
