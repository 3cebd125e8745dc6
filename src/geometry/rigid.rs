//! Rigid: a single rotation + translation element.
//!
//! The rotation is kept as a plain 3x3 matrix rather than a unit quaternion so
//! that element-wise scaling and un-normalised encodings pass through
//! unchanged.

use nalgebra::{Matrix3, Matrix4, Vector3};

/// One rigid-body transform: p' = R * p + t.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rigid {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Rigid {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Identity transformation (no rotation, no translation).
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn from_rotation(rotation: Matrix3<f64>) -> Self {
        Self {
            rotation,
            translation: Vector3::zeros(),
        }
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation,
        }
    }

    /// Construct from a homogeneous 4x4 matrix of form [R | t; 0 | 1].
    ///
    /// The bottom row is ignored.
    pub fn from_matrix(mat: &Matrix4<f64>) -> Self {
        Self {
            rotation: mat.fixed_view::<3, 3>(0, 0).into_owned(),
            translation: Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]),
        }
    }

    /// Convert to homogeneous 4x4 matrix of form [R | t; 0 0 0 1].
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Compose two transforms: self ∘ inner.
    ///
    /// For T1 = [R1 | t1] and T2 = [R2 | t2]:
    /// T1 ∘ T2 = [R1*R2 | R1*t2 + t1]
    pub fn compose(&self, inner: &Rigid) -> Self {
        Self {
            rotation: self.rotation * inner.rotation,
            translation: self.rotation * inner.translation + self.translation,
        }
    }

    /// Rotations compose, translations simply add.
    pub fn compose_additive(&self, other: &Rigid) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + other.translation,
        }
    }

    /// Inverse transformation: [R^T | -R^T*t].
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.transpose();
        Self {
            translation: -(rot_inv * self.translation),
            rotation: rot_inv,
        }
    }

    /// Transform a single point: p' = R * p + t.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Apply the inverse without building it: p = R^T * (p' - t).
    pub fn inverse_transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.tr_mul(&(p - self.translation))
    }

    /// Multiply both rotation and translation by a scalar.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            rotation: self.rotation * factor,
            translation: self.translation * factor,
        }
    }

    pub fn with_scaled_translation(&self, factor: f64) -> Self {
        Self {
            rotation: self.rotation,
            translation: self.translation * factor,
        }
    }

    /// Largest absolute component difference against `other`.
    pub fn max_abs_diff(&self, other: &Rigid) -> f64 {
        let dr = (self.rotation - other.rotation).amax();
        let dt = (self.translation - other.translation).amax();
        dr.max(dt)
    }
}

impl Default for Rigid {
    fn default() -> Self {
        Self::identity()
    }
}
