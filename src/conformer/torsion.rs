//! Torsion geometry on ligand conformers.
//!
//! Coordinates are plain `[Vector3<f64>]` slices indexed by atom. Bond
//! topology is passed explicitly: neighbour lists for dihedral aggregation,
//! and `(u, v)` edges with per-edge rotation masks for torsion updates.

use anyhow::{Result, bail, ensure};
use nalgebra::{Matrix2, Vector2, Vector3};
use tracing::debug;

use crate::config::GeometryConfig;
use crate::geometry::axis_angle_to_matrix;

/// Signed dihedral angle `a-b-c-d` in radians, in `(-π, π]`.
///
/// `eps` guards the normalisation of the central bond.
pub fn dihedral(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>,
    d: &Vector3<f64>,
    eps: f64,
) -> f64 {
    let b0 = a - b;
    let b1 = c - b;
    let b1 = b1 / (b1.norm() + eps);
    let b2 = d - c;

    let v = b0 - b1 * b0.dot(&b1);
    let w = b2 - b1 * b2.dot(&b1);

    let x = v.dot(&w);
    let y = b1.cross(&v).dot(&w);
    y.atan2(x)
}

fn dihedral_at(coords: &[Vector3<f64>], [a, b, c, d]: [usize; 4], eps: f64) -> f64 {
    dihedral(&coords[a], &coords[b], &coords[c], &coords[d], eps)
}

/// Transposed 2D rotation by `alpha`.
fn rotation_2d_transpose(alpha: f64) -> Matrix2<f64> {
    let (s, c) = alpha.sin_cos();
    Matrix2::new(c, s, -s, c)
}

/// Dihedral about bond `i-j` aggregated over every substituent pair.
///
/// `atoms` is `[k0, i, j, l0]`: `k0` and `l0` are the reference substituents
/// defining the torsion in `coords`. For every neighbour `k != j` of `i` and
/// every neighbour `l != i` of `j`, the predicted dihedral `k-i-j-l` in
/// `pred_coords` is rotated back by the offset of `(k, l)` from `(k0, l0)` in
/// `coords`. The unit vectors are summed and the angle of the mean direction
/// is returned.
///
/// A pair with `k == l` (a three-membered ring) is rejected.
pub fn von_mises_dihedral(
    neighbors: &[Vec<usize>],
    coords: &[Vector3<f64>],
    pred_coords: &[Vector3<f64>],
    atoms: [usize; 4],
    eps: f64,
) -> Result<f64> {
    let [k0, i, j, l0] = atoms;

    ensure!(
        coords.len() == pred_coords.len(),
        "coords has {} atoms but pred_coords has {}",
        coords.len(),
        pred_coords.len()
    );
    if let Some(bad) = atoms.iter().find(|&&a| a >= coords.len()) {
        bail!("atom {} out of range for {} atoms", bad, coords.len());
    }
    let (Some(i_neighbors), Some(j_neighbors)) = (neighbors.get(i), neighbors.get(j)) else {
        bail!("no neighbour list for bond {}-{}", i, j);
    };

    let mut sum = Vector2::zeros();
    for &k in i_neighbors.iter().filter(|&&k| k != j) {
        for &l in j_neighbors.iter().filter(|&&l| l != i) {
            if k == l {
                bail!("atoms {}, {}, {} form a three-membered ring", k, i, j);
            }
            if k >= coords.len() || l >= coords.len() {
                bail!("neighbour pair ({}, {}) out of range for {} atoms", k, l, coords.len());
            }

            let predicted = dihedral_at(pred_coords, [k, i, j, l], eps);
            let offset =
                dihedral_at(coords, [k, i, j, k0], eps) + dihedral_at(coords, [l0, i, j, l], eps);

            let (s, c) = predicted.sin_cos();
            sum += rotation_2d_transpose(offset) * Vector2::new(c, s);
        }
    }

    let sum = sum / (sum.norm() + eps);
    Ok(sum.y.atan2(sum.x))
}

/// Rotate the movable side of each rotatable bond in place.
///
/// For edge `e = (u, v)`, the atoms flagged in `mask_rotate[e]` are rotated by
/// `updates[e]` radians about the axis `pos[v] - pos[u]`, pivoting on
/// `pos[u]`. Masks may be shorter than `pos`; they cover its leading atoms.
/// Updates smaller than `config.torsion_skip_threshold` in magnitude are
/// skipped. Edges are applied in order.
pub fn apply_torsion_updates(
    pos: &mut [Vector3<f64>],
    edges: &[(usize, usize)],
    mask_rotate: &[Vec<bool>],
    updates: &[f64],
    config: &GeometryConfig,
) -> Result<()> {
    ensure!(
        edges.len() == mask_rotate.len() && edges.len() == updates.len(),
        "{} edges, {} masks and {} updates do not line up",
        edges.len(),
        mask_rotate.len(),
        updates.len()
    );

    for (e, ((&(u, v), mask), &delta)) in edges.iter().zip(mask_rotate).zip(updates).enumerate() {
        if delta.abs() < config.torsion_skip_threshold {
            debug!(
                "Skipping torsion {} ({}-{}): update {:.2e} below threshold",
                e, u, v, delta
            );
            continue;
        }

        ensure!(
            mask.len() <= pos.len(),
            "mask {} covers {} atoms but the conformer has {}",
            e,
            mask.len(),
            pos.len()
        );
        ensure!(u < mask.len() && v < mask.len(), "edge {} ({}-{}) outside mask", e, u, v);
        if mask[u] || !mask[v] {
            bail!(
                "edge {} ({}-{}) is oriented against its mask: u must stay fixed and v must move",
                e,
                u,
                v
            );
        }

        let pivot = pos[u];
        let axis = pos[v] - pivot;
        let axis = axis * delta / (axis.norm() + config.torsion_axis_epsilon);
        let rot = axis_angle_to_matrix(&axis);

        for (p, _) in pos.iter_mut().zip(mask).filter(|(_, moves)| **moves) {
            *p = rot * (*p - pivot) + pivot;
        }
    }

    Ok(())
}
