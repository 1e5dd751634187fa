//! ZYZ Euler angle conversions.
//!
//! Rotation estimates are reported as `[alpha, beta, gamma]` with
//! `R = Rz(alpha) * Ry(beta) * Rz(gamma)`.

use nalgebra::{Rotation3, UnitQuaternion, Vector3, Vector4};

/// Build the rotation matrix of a ZYZ Euler triple.
pub fn zyz_to_rotation(zyz: &[f64; 3]) -> Rotation3<f64> {
    let z = Vector3::z_axis();
    let y = Vector3::y_axis();
    Rotation3::from_axis_angle(&z, zyz[0])
        * Rotation3::from_axis_angle(&y, zyz[1])
        * Rotation3::from_axis_angle(&z, zyz[2])
}

/// Recover a ZYZ Euler triple from a rotation matrix.
///
/// `beta` is in `[0, pi]`. At the gimbal-locked poles the whole rotation about
/// Z is assigned to `alpha`.
pub fn rotation_to_zyz(rotation: &Rotation3<f64>) -> [f64; 3] {
    let m = rotation.matrix();
    let beta = m[(2, 2)].clamp(-1.0, 1.0).acos();
    if beta.sin().abs() < 1e-9 {
        let alpha = if m[(2, 2)] > 0.0 {
            m[(1, 0)].atan2(m[(0, 0)])
        } else {
            (-m[(1, 0)]).atan2(-m[(0, 0)])
        };
        return [alpha, beta, 0.0];
    }
    let alpha = m[(1, 2)].atan2(m[(0, 2)]);
    let gamma = m[(2, 1)].atan2(-m[(2, 0)]);
    [alpha, beta, gamma]
}

/// Unit quaternion `[w, x, y, z]` of a ZYZ triple, sign-fixed to `w >= 0`.
///
/// Rotations are antipodally symmetric on the quaternion sphere, so the sign
/// is canonicalized before samples are pooled for distribution fitting.
pub fn zyz_to_quaternion(zyz: &[f64; 3]) -> Vector4<f64> {
    let q = UnitQuaternion::from_rotation_matrix(&zyz_to_rotation(zyz));
    let v = Vector4::new(q.w, q.i, q.j, q.k);
    if v[0] < 0.0 {
        -v
    } else {
        v
    }
}

/// Rotation angle in radians of a rotation matrix.
pub fn rotation_angle(rotation: &Rotation3<f64>) -> f64 {
    rotation.angle()
}
