//! Error types for the registration pipeline.
//!
//! Only precondition violations and I/O failures are errors. Sparse data
//! (cells without neighbours, surfaces without significant peaks) and
//! degenerate statistics are reported through `Option`s and flags instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the registration library.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("spatial index of the point cloud has not been built")]
    IndexNotBuilt,

    #[error("spherical sampler is not initialized")]
    SamplerNotInitialized,

    #[error("signal length mismatch: expected {expected}, got {actual}")]
    SignalLengthMismatch { expected: usize, actual: usize },

    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    #[error("correlation requested before the signals were transformed")]
    TransformNotComputed,

    #[error("unknown {kind} algorithm '{name}'")]
    UnknownAlgorithm { kind: &'static str, name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid low-pass bounds: lower={lower}, upper={upper}")]
    InvalidFilterBounds { lower: i64, upper: i64 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("GPU error: {0}")]
    Gpu(String),
}

impl RegistrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result alias used across the library.
pub type Result<T, E = RegistrationError> = std::result::Result<T, E>;
