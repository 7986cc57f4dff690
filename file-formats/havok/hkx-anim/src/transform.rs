//! Rigid transform algebra for skeletal animation
//!
//! A [`Transform`] is a translation, a unit quaternion rotation and a
//! per-axis scale. Composition and inversion go through 4x4 affine matrices
//! and are decomposed back into TRS form, so a composed transform always
//! carries a renormalized rotation.

use crate::error::{AnimError, Result};
use glam::{Mat3, Mat4, Quat, Vec3};

/// Scale magnitude below which an axis is treated as collapsed during decomposition
const SCALE_EPSILON: f32 = 1e-8;

/// Translation, rotation and scale of a bone in some space
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a transform, normalizing the rotation
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation: normalize_rotation(rotation),
            scale,
        }
    }

    /// Pure translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Pure rotation
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation: normalize_rotation(rotation),
            ..Self::IDENTITY
        }
    }

    /// Affine matrix equivalent to scaling, then rotating, then translating
    ///
    /// The rotation is renormalized first, since the fields are public and
    /// decoded samples may carry off-unit quaternions.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            normalize_rotation(self.rotation),
            self.translation,
        )
    }

    /// Decompose an affine matrix, failing on degenerate or non-finite results
    pub fn try_from_matrix(matrix: Mat4) -> Result<Self> {
        let parts = decompose(&matrix);

        if !parts.translation.is_finite() || !parts.scale.is_finite() {
            return Err(AnimError::DegenerateTransform(format!(
                "non-finite translation {:?} or scale {:?}",
                parts.translation, parts.scale
            )));
        }

        match parts.rotation {
            Some(rotation) => Ok(Self {
                translation: parts.translation,
                rotation,
                scale: parts.scale,
            }),
            None => Err(AnimError::DegenerateTransform(format!(
                "cannot extract rotation with scale {:?}",
                parts.scale
            ))),
        }
    }

    /// Decompose an affine matrix, substituting identity for a degenerate rotation
    ///
    /// Non-finite translation or scale components are replaced by their
    /// identity values. Every substitution is logged as a warning.
    pub fn from_matrix(matrix: Mat4) -> Self {
        match Self::try_from_matrix(matrix) {
            Ok(transform) => transform,
            Err(err) => {
                log::warn!("{err}; substituting identity rotation");
                let parts = decompose(&matrix);
                Self {
                    translation: if parts.translation.is_finite() {
                        parts.translation
                    } else {
                        Vec3::ZERO
                    },
                    rotation: Quat::IDENTITY,
                    scale: if parts.scale.is_finite() {
                        parts.scale
                    } else {
                        Vec3::ONE
                    },
                }
            }
        }
    }

    /// Transform equivalent to applying `other` first, then `self`
    pub fn compose(&self, other: &Self) -> Self {
        Self::from_matrix(self.matrix() * other.matrix())
    }

    /// Inverse transform
    pub fn inverse(&self) -> Self {
        Self::from_matrix(self.matrix().inverse())
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Compare two transforms within `tolerance`
    ///
    /// Rotations are compared up to sign, since `q` and `-q` describe the same
    /// orientation.
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        let a = normalize_rotation(self.rotation);
        let b = normalize_rotation(other.rotation);
        self.translation.abs_diff_eq(other.translation, tolerance)
            && self.scale.abs_diff_eq(other.scale, tolerance)
            && (a.abs_diff_eq(b, tolerance) || a.abs_diff_eq(-b, tolerance))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

struct Decomposed {
    translation: Vec3,
    rotation: Option<Quat>,
    scale: Vec3,
}

fn decompose(matrix: &Mat4) -> Decomposed {
    let translation = matrix.w_axis.truncate();
    let x_axis = matrix.x_axis.truncate();
    let y_axis = matrix.y_axis.truncate();
    let z_axis = matrix.z_axis.truncate();

    let mut scale = Vec3::new(x_axis.length(), y_axis.length(), z_axis.length());
    // A mirrored basis is folded into a negative X scale
    if matrix.determinant() < 0.0 {
        scale.x = -scale.x;
    }

    if !scale.is_finite() || scale.abs().min_element() < SCALE_EPSILON {
        return Decomposed {
            translation,
            rotation: None,
            scale,
        };
    }

    let inv_scale = scale.recip();
    let basis = Mat3::from_cols(
        x_axis * inv_scale.x,
        y_axis * inv_scale.y,
        z_axis * inv_scale.z,
    );
    let rotation = Quat::from_mat3(&basis);
    let rotation = if rotation.is_finite() && rotation.length_squared() > 0.0 {
        Some(rotation.normalize())
    } else {
        None
    };

    Decomposed {
        translation,
        rotation,
        scale,
    }
}

fn normalize_rotation(rotation: Quat) -> Quat {
    if rotation.is_finite() && rotation.length_squared() > 0.0 {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_identity_roundtrip() {
        let t = Transform::from_matrix(Mat4::IDENTITY);
        assert!(t.approx_eq(&Transform::IDENTITY, EPS));
    }

    #[test]
    fn test_new_normalizes_rotation() {
        let t = Transform::new(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 4.0), Vec3::ONE);
        assert!((t.rotation.length() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_compose_applies_right_first() {
        let rotate = Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2));
        let translate = Transform::from_translation(Vec3::X);

        // translate then rotate: (1,0,0) rotated 90 degrees about Z is (0,1,0)
        let p = rotate.compose(&translate).transform_point(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::Y, EPS));

        // rotate then translate: origin stays at origin, then moves to (1,0,0)
        let p = translate.compose(&rotate).transform_point(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::X, EPS));
    }

    #[test]
    fn test_compose_matches_matrix_product() {
        let a = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.3),
            Vec3::splat(2.0),
        );
        let b = Transform::new(
            Vec3::new(-1.0, 0.5, 0.0),
            Quat::from_rotation_x(-0.7),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let composed = a * b;
        let point = Vec3::new(0.25, -2.0, 1.5);
        let expected = a.transform_point(b.transform_point(point));
        assert!(composed.transform_point(point).abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn test_inverse() {
        let t = Transform::new(
            Vec3::new(4.0, -1.0, 2.0),
            Quat::from_euler(glam::EulerRot::XYZ, 0.2, 0.4, -1.1),
            Vec3::new(1.5, 1.5, 1.5),
        );
        let round = t.compose(&t.inverse());
        assert!(round.approx_eq(&Transform::IDENTITY, 1e-4));
    }

    #[test]
    fn test_negative_determinant_folds_into_x_scale() {
        let m = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        let t = Transform::try_from_matrix(m).unwrap();
        assert!((t.scale.x + 1.0).abs() < EPS);
        assert!(t.matrix().abs_diff_eq(m, EPS));
    }

    #[test]
    fn test_zero_scale_is_degenerate() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(0.0, 1.0, 1.0),
            Quat::from_rotation_z(0.5),
            Vec3::new(1.0, 2.0, 3.0),
        );
        assert!(matches!(
            Transform::try_from_matrix(m),
            Err(AnimError::DegenerateTransform(_))
        ));

        let recovered = Transform::from_matrix(m);
        assert_eq!(recovered.rotation, Quat::IDENTITY);
        assert!(recovered.translation.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), EPS));
        assert!(recovered.scale.is_finite());
    }

    #[test]
    fn test_inverse_of_zero_scale_is_finite() {
        let t = Transform::new(Vec3::X, Quat::IDENTITY, Vec3::ZERO);
        let inv = t.inverse();
        assert!(inv.translation.is_finite());
        assert!(inv.rotation.is_finite());
        assert!(inv.scale.is_finite());
    }

    #[test]
    fn test_off_unit_rotation_does_not_leak_into_scale() {
        let sample = Transform {
            translation: Vec3::new(0.5, 0.0, -1.0),
            rotation: Quat::from_xyzw(0.3, 0.2, 0.1, 1.05),
            scale: Vec3::ONE,
        };

        let composed = Transform::IDENTITY.compose(&sample);
        assert!(composed.scale.abs_diff_eq(Vec3::ONE, EPS));
        assert!((composed.rotation.length() - 1.0).abs() < EPS);
        assert!(composed.approx_eq(&sample, EPS));

        let round = sample.compose(&sample.inverse());
        assert!(round.approx_eq(&Transform::IDENTITY, 1e-4));
    }

    #[test]
    fn test_approx_eq_ignores_quaternion_sign() {
        let q = Quat::from_rotation_x(1.0);
        let a = Transform::from_rotation(q);
        let b = Transform::from_rotation(-q);
        assert!(a.approx_eq(&b, EPS));
    }
}
