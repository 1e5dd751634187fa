//! Spherical-correlation point cloud registration.
//!
//! Two clouds are projected onto an equiangular spherical grid, correlated
//! over the rotation group SO(3) in the spherical harmonic domain, and the
//! rotated cloud is then aligned in translation. Peaks of both correlation
//! surfaces are fitted with distributions that report how certain the
//! estimate is.
//!
//! # Architecture
//!
//! The registration is split into stages:
//! - Sampling: nearest points per grid direction ([`sampling`], [`model`])
//! - Rotation: spherical correlation on CPU or GPU ([`correlation`])
//! - Translation: 3D phase correlation or range averaging ([`alignment`])
//! - Uncertainty: z-score peak extraction and distribution fitting
//!   ([`evaluation`], [`distribution`])
//!
//! # Usage
//!
//! ```ignore
//! use sph_registration::{io::read_ply, SphRegistration};
//!
//! let mut registration = SphRegistration::builder()
//!     .bandwidth(32)
//!     .alignment_name("phase")?
//!     .build()?;
//!
//! let mut prev = read_ply("scan_0.ply")?;
//! let mut cur = read_ply("scan_1.ply")?;
//! prev.build_index();
//! cur.build_index();
//!
//! let result = registration.register_point_cloud(&prev, &cur)?;
//! println!("rotation: {:?}, translation: {:?}", result.rotation_zyz(), result.translation());
//! ```

pub mod alignment;
pub mod config;
pub mod correlation;
pub mod datasource;
pub mod distribution;
pub mod error;
pub mod evaluation;
pub mod harmonics;
pub mod io;
pub mod model;
pub mod registration;
pub mod rotation;
pub mod sampling;
pub mod statistics;

#[cfg(test)]
pub mod test_utils;

pub use config::{
    AlignmentAlgorithm, CorrelationBackend, PeakExtractionConfig, PhaseCorrelationConfig,
    RegistrationConfig, RegistrationConfigBuilder,
};
pub use distribution::{Bingham, BinghamMixture, Gaussian, GaussianMixture, UncertaintyDistribution};
pub use error::{RegistrationError, Result};
pub use evaluation::{EvaluationAlgorithm, EvaluationTarget};
pub use model::{FunctionValue, NeighborQuery, Point, PointCloud, RegistrationResult};
pub use registration::SphRegistration;
pub use statistics::{StatisticsManager, StatisticsReport};

// GPU engines (optional)
#[cfg(feature = "cuda")]
pub use correlation::gpu::{is_cuda_available, SpatialCorrelationGpu, SphericalCorrelationGpu};
