//! Local reference frames built from atom coordinates.
//!
//! # Three-point frames
//!
//! Given three points `neg_x`, `origin` and `xy_plane`, the frame is the
//! Gram-Schmidt basis
//!
//! ```text
//! e0 = normalize(origin - neg_x)
//! e1 = normalize((xy_plane - origin) - e0 * <e0, xy_plane - origin>)
//! e2 = e0 × e1
//! ```
//!
//! with rotation columns `[e0 e1 e2]` and translation `origin`. Mapping the
//! frame's local coordinates through this transform lands `neg_x` on the
//! negative x axis and `xy_plane` in the positive-y half of the xy plane.
//!
//! Normalisation adds an epsilon under the square root, so collinear or
//! coincident points produce a finite (if meaningless) frame instead of NaNs.
//!
//! # Backbone reference frames
//!
//! [`backbone_reference_frame`] reproduces the N/CA/C reference construction
//! used by structure-prediction pipelines, including its handling of the
//! second rotation: the third row of that rotation is written into the first
//! rotation, so the second one keeps an all-zero third row. The result is then
//! generally not orthonormal. That behaviour is kept as-is; see DESIGN.md.

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use super::Rigid;

#[inline]
fn normalize_eps(v: &Vector3<f64>, eps: f64) -> Vector3<f64> {
    v / (v.norm_squared() + eps).sqrt()
}

/// Gram-Schmidt frame from three points.
pub fn three_point_frame(
    neg_x: &Vector3<f64>,
    origin: &Vector3<f64>,
    xy_plane: &Vector3<f64>,
    eps: f64,
) -> Rigid {
    let e0_raw = origin - neg_x;
    let e1_raw = xy_plane - origin;

    let e0 = normalize_eps(&e0_raw, eps);
    let e1_orth = e1_raw - e0 * e0.dot(&e1_raw);

    if e0_raw.norm_squared() <= eps || e1_orth.norm_squared() <= eps {
        debug!(
            "Degenerate three-point frame at origin [{:.3}, {:.3}, {:.3}]",
            origin.x, origin.y, origin.z
        );
    }

    let e1 = normalize_eps(&e1_orth, eps);
    let e2 = e0.cross(&e1);

    Rigid::new(Matrix3::from_columns(&[e0, e1, e2]), *origin)
}

/// Reference frame from backbone N, CA and C coordinates.
///
/// CA becomes the translation. The rotation is the transpose of
/// `R_n * R_c2 * R_c1`, where `R_c1` rotates C into the xz plane, `R_c2`
/// tilts it onto the x axis and `R_n` rotates N into the xy plane.
#[rustfmt::skip]
pub fn backbone_reference_frame(
    n: &Vector3<f64>,
    ca: &Vector3<f64>,
    c: &Vector3<f64>,
    eps: f64,
) -> Rigid {
    let n = n - ca;
    let c = c - ca;

    let norm = (eps + c.x * c.x + c.y * c.y).sqrt();
    let sin_c1 = -c.y / norm;
    let cos_c1 = c.x / norm;

    let norm = (eps + c.x * c.x + c.y * c.y + c.z * c.z).sqrt();
    let sin_c2 = c.z / norm;
    let cos_c2 = (c.x * c.x + c.y * c.y).sqrt() / norm;

    // Third row carries the c2 terms (see module docs).
    let c1_rot = Matrix3::new(
        cos_c1,  -sin_c1, 0.0,
        sin_c1,   cos_c1, 0.0,
        -sin_c2,  0.0,    cos_c2,
    );
    let c2_rot = Matrix3::new(
        cos_c2, 0.0, sin_c2,
        0.0,    1.0, 0.0,
        0.0,    0.0, 0.0,
    );

    let c_rot = c2_rot * c1_rot;
    let n = c_rot * n;

    let norm = (eps + n.y * n.y + n.z * n.z).sqrt();
    let sin_n = -n.z / norm;
    let cos_n = n.y / norm;

    let n_rot = Matrix3::new(
        1.0, 0.0,    0.0,
        0.0, cos_n, -sin_n,
        0.0, sin_n,  cos_n,
    );

    Rigid::new((n_rot * c_rot).transpose(), *ca)
}
