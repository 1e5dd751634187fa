//! Outcome of one pairwise registration.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use super::point_cloud::PointCloud;
use crate::distribution::UncertaintyDistribution;
use crate::rotation::zyz_to_rotation;

/// Rotation, translation, registered cloud and their uncertainty.
///
/// The registered cloud is `R * cur + t` where `R` is built from
/// [`rotation_zyz`](Self::rotation_zyz) and `t` is
/// [`translation`](Self::translation).
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    registered_cloud: PointCloud,
    rotation_zyz: [f64; 3],
    translation: Vector3<f64>,
    found_rotation: bool,
    found_translation: bool,
    rotation_uncertainty: Option<UncertaintyDistribution>,
    translation_uncertainty: Option<UncertaintyDistribution>,
}

impl RegistrationResult {
    /// Result of the rotation stage.
    pub fn from_rotation(rotated_cloud: PointCloud, rotation_zyz: [f64; 3]) -> Self {
        Self {
            registered_cloud: rotated_cloud,
            rotation_zyz,
            translation: Vector3::zeros(),
            found_rotation: false,
            found_translation: false,
            rotation_uncertainty: None,
            translation_uncertainty: None,
        }
    }

    /// Result of the translation stage.
    pub fn from_translation(registered_cloud: PointCloud, translation: Vector3<f64>) -> Self {
        Self {
            registered_cloud,
            rotation_zyz: [0.0; 3],
            translation,
            found_rotation: false,
            found_translation: false,
            rotation_uncertainty: None,
            translation_uncertainty: None,
        }
    }

    /// Merge a translation sub-result into this rotation result.
    ///
    /// Takes over the registered cloud, translation and translation
    /// uncertainty of `other`; keeps the rotation part of `self`.
    pub fn combine(&mut self, other: RegistrationResult) {
        self.registered_cloud = other.registered_cloud;
        self.translation = other.translation;
        self.found_translation = other.found_translation;
        self.translation_uncertainty = other.translation_uncertainty;
    }

    /// Attach the rotation uncertainty. A missing estimate marks the rotation
    /// as not found.
    pub fn set_rotation_uncertainty(&mut self, uncertainty: Option<UncertaintyDistribution>) {
        self.found_rotation = uncertainty.is_some();
        self.rotation_uncertainty = uncertainty;
    }

    /// Attach the translation uncertainty. A missing estimate marks the
    /// translation as not found.
    pub fn set_translation_uncertainty(&mut self, uncertainty: Option<UncertaintyDistribution>) {
        self.found_translation = uncertainty.is_some();
        self.translation_uncertainty = uncertainty;
    }

    /// Override the translation flag for aligners that produce no surface.
    pub fn set_found_solution_for_translation(&mut self, found: bool) {
        self.found_translation = found;
    }

    pub fn registered_cloud(&self) -> &PointCloud {
        &self.registered_cloud
    }

    pub fn into_registered_cloud(self) -> PointCloud {
        self.registered_cloud
    }

    pub fn rotation_zyz(&self) -> [f64; 3] {
        self.rotation_zyz
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn found_solution_for_rotation(&self) -> bool {
        self.found_rotation
    }

    pub fn found_solution_for_translation(&self) -> bool {
        self.found_translation
    }

    pub fn rotation_uncertainty(&self) -> Option<&UncertaintyDistribution> {
        self.rotation_uncertainty.as_ref()
    }

    pub fn translation_uncertainty(&self) -> Option<&UncertaintyDistribution> {
        self.translation_uncertainty.as_ref()
    }

    /// Rigid transform mapping the current cloud onto the previous one.
    pub fn transform(&self) -> Isometry3<f64> {
        let rotation = UnitQuaternion::from_rotation_matrix(&zyz_to_rotation(&self.rotation_zyz));
        let t = &self.translation;
        Isometry3::from_parts(Translation3::new(t.x, t.y, t.z), rotation)
    }
}
