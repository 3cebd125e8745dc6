//! Quaternion, rotation-matrix and axis-angle conversions.
//!
//! Quaternions use the real-part-first convention throughout, i.e. the 4-vector
//! `[w, x, y, z]`. Internally they are `nalgebra::Quaternion` values built with
//! `Quaternion::new(w, x, y, z)`.
//!
//! Axis-angle vectors point along the rotation axis and have a magnitude equal
//! to the anticlockwise rotation angle in radians.

use nalgebra::{Matrix3, Matrix4, Quaternion, Vector3};

/// Below this angle (radians) `sin(x/2)/x` is replaced by its Taylor expansion.
pub const SMALL_ANGLE_THRESHOLD: f64 = 1e-6;

/// Lower bound on the denominator when picking a matrix-to-quaternion
/// candidate.
const CANDIDATE_FLOOR: f64 = 0.1;

/// Coefficients of the quaternion-to-rotation quadratic form.
///
/// `QUAT_TO_ROT_TABLE[i][j][r][c]` is the coefficient of `q_i * q_j` in entry
/// `(r, c)` of the rotation matrix, with `q = [w, x, y, z]`.
pub const QUAT_TO_ROT_TABLE: [[[[f64; 3]; 3]; 4]; 4] = build_quat_to_rot_table();

const fn build_quat_to_rot_table() -> [[[[f64; 3]; 3]; 4]; 4] {
    const W: usize = 0;
    const X: usize = 1;
    const Y: usize = 2;
    const Z: usize = 3;

    let mut t = [[[[0.0; 3]; 3]; 4]; 4];

    t[W][W][0][0] = 1.0;
    t[X][X][0][0] = 1.0;
    t[Y][Y][0][0] = -1.0;
    t[Z][Z][0][0] = -1.0;

    t[X][Y][0][1] = 2.0;
    t[W][Z][0][1] = -2.0;

    t[X][Z][0][2] = 2.0;
    t[W][Y][0][2] = 2.0;

    t[X][Y][1][0] = 2.0;
    t[W][Z][1][0] = 2.0;

    t[W][W][1][1] = 1.0;
    t[X][X][1][1] = -1.0;
    t[Y][Y][1][1] = 1.0;
    t[Z][Z][1][1] = -1.0;

    t[Y][Z][1][2] = 2.0;
    t[W][X][1][2] = -2.0;

    t[X][Z][2][0] = 2.0;
    t[W][Y][2][0] = -2.0;

    t[Y][Z][2][1] = 2.0;
    t[W][X][2][1] = 2.0;

    t[W][W][2][2] = 1.0;
    t[X][X][2][2] = -1.0;
    t[Y][Y][2][2] = -1.0;
    t[Z][Z][2][2] = 1.0;

    t
}

#[inline]
pub fn quat_to_array(q: &Quaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

#[inline]
pub fn quat_from_array(q: [f64; 4]) -> Quaternion<f64> {
    Quaternion::new(q[0], q[1], q[2], q[3])
}

/// Rotation matrix from a unit quaternion via [`QUAT_TO_ROT_TABLE`].
///
/// The quaternion is not renormalised, so a non-unit input yields a scaled
/// matrix.
pub fn quat_to_rot(q: &Quaternion<f64>) -> Matrix3<f64> {
    let q = quat_to_array(q);
    let mut rot = Matrix3::zeros();
    for (i, qi) in q.iter().enumerate() {
        for (j, qj) in q.iter().enumerate() {
            let coeff = &QUAT_TO_ROT_TABLE[i][j];
            let prod = qi * qj;
            for r in 0..3 {
                for c in 0..3 {
                    rot[(r, c)] += prod * coeff[r][c];
                }
            }
        }
    }
    rot
}

/// Rotation matrix from a quaternion of any non-zero norm.
///
/// ```text
/// R = I + (2/|q|²) * [ -(y²+z²)   xy - zw    xz + yw
///                       xy + zw  -(x²+z²)    yz - xw
///                       xz - yw   yz + xw  -(x²+y²) ]
/// ```
#[rustfmt::skip]
pub fn quat_to_matrix(q: &Quaternion<f64>) -> Matrix3<f64> {
    let (r, i, j, k) = (q.w, q.i, q.j, q.k);
    let two_s = 2.0 / q.norm_squared();

    Matrix3::new(
        1.0 - two_s * (j * j + k * k), two_s * (i * j - k * r),       two_s * (i * k + j * r),
        two_s * (i * j + k * r),       1.0 - two_s * (i * i + k * k), two_s * (j * k - i * r),
        two_s * (i * k - j * r),       two_s * (j * k + i * r),       1.0 - two_s * (i * i + j * j),
    )
}

/// sqrt(max(0, x)).
#[inline]
fn sqrt_positive_part(x: f64) -> f64 {
    if x > 0.0 { x.sqrt() } else { 0.0 }
}

/// Quaternion from a rotation matrix.
///
/// Four candidate quaternions are formed, each divided by a different diagonal
/// combination. In exact arithmetic they agree up to sign; the one with the
/// largest denominator is returned because it is the best conditioned.
pub fn rot_to_quat(m: &Matrix3<f64>) -> Quaternion<f64> {
    let (m00, m01, m02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (m10, m11, m12) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
    let (m20, m21, m22) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);

    let q_abs = [
        sqrt_positive_part(1.0 + m00 + m11 + m22),
        sqrt_positive_part(1.0 + m00 - m11 - m22),
        sqrt_positive_part(1.0 - m00 + m11 - m22),
        sqrt_positive_part(1.0 - m00 - m11 + m22),
    ];

    // Row k is the quaternion multiplied by its k-th component.
    let quat_by_rijk = [
        [q_abs[0] * q_abs[0], m21 - m12, m02 - m20, m10 - m01],
        [m21 - m12, q_abs[1] * q_abs[1], m10 + m01, m02 + m20],
        [m02 - m20, m10 + m01, q_abs[2] * q_abs[2], m12 + m21],
        [m10 - m01, m20 + m02, m21 + m12, q_abs[3] * q_abs[3]],
    ];

    // First maximum wins on ties.
    let mut best = 0;
    for k in 1..4 {
        if q_abs[k] > q_abs[best] {
            best = k;
        }
    }

    let denom = 2.0 * q_abs[best].max(CANDIDATE_FLOOR);
    let row = quat_by_rijk[best];
    Quaternion::new(row[0] / denom, row[1] / denom, row[2] / denom, row[3] / denom)
}

/// sin(x/2)/x, switching to 1/2 - x²/48 below [`SMALL_ANGLE_THRESHOLD`].
#[inline]
fn sin_half_over_angle(angle: f64) -> f64 {
    if angle.abs() < SMALL_ANGLE_THRESHOLD {
        0.5 - angle * angle / 48.0
    } else {
        (0.5 * angle).sin() / angle
    }
}

/// Axis-angle vector from a quaternion (real part first).
pub fn quat_to_axis_angle(q: &Quaternion<f64>) -> Vector3<f64> {
    let imag = q.imag();
    let half_angle = imag.norm().atan2(q.w);
    let angle = 2.0 * half_angle;
    imag / sin_half_over_angle(angle)
}

/// Quaternion (real part first) from an axis-angle vector.
pub fn axis_angle_to_quat(axis_angle: &Vector3<f64>) -> Quaternion<f64> {
    let angle = axis_angle.norm();
    let half_angle = 0.5 * angle;
    let v = axis_angle * sin_half_over_angle(angle);
    Quaternion::new(half_angle.cos(), v.x, v.y, v.z)
}

pub fn axis_angle_to_matrix(axis_angle: &Vector3<f64>) -> Matrix3<f64> {
    quat_to_matrix(&axis_angle_to_quat(axis_angle))
}

pub fn matrix_to_axis_angle(m: &Matrix3<f64>) -> Vector3<f64> {
    quat_to_axis_angle(&rot_to_quat(m))
}

/// Homogeneous 4x4 matrix from a 7-vector `[w, x, y, z, tx, ty, tz]`.
pub fn affine_vector_to_4x4(vector: &[f64; 7]) -> Matrix4<f64> {
    let rot = quat_to_rot(&Quaternion::new(vector[0], vector[1], vector[2], vector[3]));
    let mut out = Matrix4::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&rot);
    out[(0, 3)] = vector[4];
    out[(1, 3)] = vector[5];
    out[(2, 3)] = vector[6];
    out
}
