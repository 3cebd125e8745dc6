//! Uniformly distributed random rotations (Arvo, "Fast Random Rotation
//! Matrices", Graphics Gems III, 1992).

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};
use rand::Rng;

/// Random rotation matrix, uniform over SO(3).
///
/// A random rotation about z is followed by a Householder reflection through
/// a random unit vector, and the product is negated to restore det = +1.
#[rustfmt::skip]
pub fn arvo_rotation<R: Rng + ?Sized>(rng: &mut R) -> Matrix3<f64> {
    let x2 = 2.0 * PI * rng.r#gen::<f64>();
    let x3 = rng.r#gen::<f64>();

    let theta = 2.0 * PI * rng.r#gen::<f64>();
    let (sin_t, cos_t) = theta.sin_cos();
    let z_rot = Matrix3::new(
        cos_t, -sin_t, 0.0,
        sin_t, cos_t, 0.0,
        0.0, 0.0, 1.0,
    );

    let v = Vector3::new(x2.cos() * x3.sqrt(), x2.sin() * x3.sqrt(), (1.0 - x3).sqrt());
    let householder = Matrix3::identity() - 2.0 * v * v.transpose();

    -(householder * z_rot)
}

/// Rotate a point set by a fresh [`arvo_rotation`] `M`.
///
/// Points are treated as row vectors, so each point maps to `p · M`
/// (equivalently `Mᵀ p`). Rotating about the centroid and then adding the
/// rotated centroid reduces to exactly this product.
pub fn uniform_random_rotation<R: Rng + ?Sized>(
    points: &[Vector3<f64>],
    rng: &mut R,
) -> Vec<Vector3<f64>> {
    let m = arvo_rotation(rng);
    points.iter().map(|p| m.tr_mul(p)).collect()
}
