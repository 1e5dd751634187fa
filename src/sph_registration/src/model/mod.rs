//! Data model: point clouds, per-cell function values and results.

pub mod function_value;
pub mod point_cloud;
pub mod registration_result;
pub mod search;

pub use function_value::{extract_channel, FunctionValue, SignalChannel};
pub use point_cloud::{NeighborQuery, Point, PointCloud};
pub use registration_result::RegistrationResult;
pub use search::DirectionIndex;
