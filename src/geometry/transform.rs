//! RigidTransform: a batch of rigid-body transforms sharing one leading shape.
//!
//! A transform of batch shape `S` behaves like a single array of shape `S`
//! whose elements are [`Rigid`] values. At the API boundary the two components
//! are dense arrays:
//!
//! - rotation: `[*S, 3, 3]`
//! - translation: `[*S, 3]`
//!
//! Every operation returns a new value. Binary operations broadcast their
//! batch shapes with NumPy rules.
//!
//! ```
//! use dock_frames::geometry::RigidTransform;
//! use ndarray::SliceInfoElem;
//!
//! let t = RigidTransform::identity(&[10, 10]);
//! let sub = t
//!     .index(&[
//!         SliceInfoElem::Index(3),
//!         SliceInfoElem::Slice { start: 4, end: Some(6), step: 1 },
//!     ])
//!     .unwrap();
//!
//! assert_eq!(sub.shape(), &[2]);
//! assert_eq!(sub.rotations().shape(), &[2, 3, 3]);
//! assert_eq!(sub.translations().shape(), &[2, 3]);
//! ```

use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, SliceInfoElem};

use super::batch::{
    broadcast_ids, broadcast_shapes, complete_selection, element_count, element_ids,
    join_trailing, normalize_axis, split_trailing,
};
use super::frames::{backbone_reference_frame, three_point_frame};
use super::quaternion::{
    affine_vector_to_4x4, axis_angle_to_matrix, matrix_to_axis_angle, quat_from_array,
    quat_to_array, quat_to_matrix, rot_to_quat,
};
use super::Rigid;
use crate::error::{GeometryError, GeometryResult};

/// Batched rigid-body transform.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidTransform {
    shape: Vec<usize>,
    elements: Vec<Rigid>,
}

#[inline]
fn matrix_from_row(row: &[f64; 9]) -> Matrix3<f64> {
    Matrix3::from_row_slice(row)
}

#[inline]
fn vector_from_row(row: &[f64; 3]) -> Vector3<f64> {
    Vector3::new(row[0], row[1], row[2])
}

#[inline]
fn vector_to_row(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

fn points_from_array(
    operation: &'static str,
    points: &ArrayD<f64>,
) -> GeometryResult<(Vec<usize>, Vec<Vector3<f64>>)> {
    let (shape, rows) = split_trailing::<3>(operation, &points.view(), &[3])?;
    Ok((shape, rows.iter().map(vector_from_row).collect()))
}

fn require_same_shape(
    operation: &'static str,
    expected: &[usize],
    actual: &[usize],
) -> GeometryResult<()> {
    if expected != actual {
        return Err(GeometryError::shape_mismatch(
            operation,
            format!("batch shape {:?} does not match {:?}", actual, expected),
        ));
    }
    Ok(())
}

impl RigidTransform {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build from rotation `[*S, 3, 3]` and translation `[*S, 3]` arrays.
    pub fn new(rotations: &ArrayD<f64>, translations: &ArrayD<f64>) -> GeometryResult<Self> {
        const OP: &str = "RigidTransform::new";

        let (rot_shape, rots) = split_trailing::<9>(OP, &rotations.view(), &[3, 3])?;
        let (trans_shape, trans) = split_trailing::<3>(OP, &translations.view(), &[3])?;
        require_same_shape(OP, &rot_shape, &trans_shape)?;

        let elements = rots
            .iter()
            .zip(&trans)
            .map(|(r, t)| Rigid::new(matrix_from_row(r), vector_from_row(t)))
            .collect();

        Ok(Self {
            shape: rot_shape,
            elements,
        })
    }

    /// Rotations only; translations are zero.
    pub fn from_rotations(rotations: &ArrayD<f64>) -> GeometryResult<Self> {
        let (shape, rots) =
            split_trailing::<9>("RigidTransform::from_rotations", &rotations.view(), &[3, 3])?;
        let elements = rots
            .iter()
            .map(|r| Rigid::from_rotation(matrix_from_row(r)))
            .collect();
        Ok(Self { shape, elements })
    }

    /// Translations only; rotations are the identity.
    pub fn from_translations(translations: &ArrayD<f64>) -> GeometryResult<Self> {
        let (shape, elements) =
            points_from_array("RigidTransform::from_translations", translations)?;
        Ok(Self {
            shape,
            elements: elements.into_iter().map(Rigid::from_translation).collect(),
        })
    }

    /// Identity transforms of the given batch shape.
    pub fn identity(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            elements: vec![Rigid::identity(); element_count(shape)],
        }
    }

    /// Build from row-major elements.
    pub fn from_elements(shape: &[usize], elements: Vec<Rigid>) -> GeometryResult<Self> {
        if elements.len() != element_count(shape) {
            return Err(GeometryError::shape_mismatch(
                "RigidTransform::from_elements",
                format!(
                    "{} elements cannot fill batch shape {:?}",
                    elements.len(),
                    shape
                ),
            ));
        }
        Ok(Self {
            shape: shape.to_vec(),
            elements,
        })
    }

    /// A single transform with empty batch shape.
    pub fn from_rigid(rigid: Rigid) -> Self {
        Self {
            shape: Vec::new(),
            elements: vec![rigid],
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Shared batch shape `S`.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements in the batch.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in row-major order.
    pub fn elements(&self) -> &[Rigid] {
        &self.elements
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rigid> {
        self.elements.iter()
    }

    /// Element at a full multi-index, or `None` if out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<&Rigid> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, d)| i >= d)
        {
            return None;
        }
        let offset = index
            .iter()
            .zip(&self.shape)
            .fold(0, |offset, (&i, &dim)| offset * dim + i);
        self.elements.get(offset)
    }

    /// Rotation array of shape `[*S, 3, 3]`.
    pub fn rotations(&self) -> ArrayD<f64> {
        let batch = self.shape.len();
        let mut shape = self.shape.clone();
        shape.extend([3, 3]);
        ArrayD::from_shape_fn(IxDyn(&shape), |ix| {
            let offset = (0..batch).fold(0, |offset, k| offset * shape[k] + ix[k]);
            self.elements[offset].rotation[(ix[batch], ix[batch + 1])]
        })
    }

    /// Translation array of shape `[*S, 3]`.
    pub fn translations(&self) -> ArrayD<f64> {
        let batch = self.shape.len();
        let mut shape = self.shape.clone();
        shape.push(3);
        ArrayD::from_shape_fn(IxDyn(&shape), |ix| {
            let offset = (0..batch).fold(0, |offset, k| offset * shape[k] + ix[k]);
            self.elements[offset].translation[ix[batch]]
        })
    }

    // ------------------------------------------------------------------
    // Algebra
    // ------------------------------------------------------------------

    fn zip_broadcast(
        &self,
        operation: &'static str,
        other: &RigidTransform,
        f: impl Fn(&Rigid, &Rigid) -> Rigid,
    ) -> GeometryResult<Self> {
        let shape = broadcast_shapes(operation, &self.shape, &other.shape)?;
        let lhs = broadcast_ids(operation, &self.shape, &shape)?;
        let rhs = broadcast_ids(operation, &other.shape, &shape)?;

        let elements = lhs
            .iter()
            .zip(&rhs)
            .map(|(&a, &b)| f(&self.elements[a], &other.elements[b]))
            .collect();
        Ok(Self { shape, elements })
    }

    fn map_elements(&self, f: impl Fn(&Rigid) -> Rigid) -> Self {
        Self {
            shape: self.shape.clone(),
            elements: self.elements.iter().map(f).collect(),
        }
    }

    /// `self ∘ inner`: rotation `R_self * R_inner`, translation
    /// `R_self * t_inner + t_self`.
    pub fn compose(&self, inner: &RigidTransform) -> GeometryResult<Self> {
        self.zip_broadcast("compose", inner, |outer, inner| outer.compose(inner))
    }

    /// Rotations compose; translations are summed without rotation.
    pub fn compose_additive(&self, other: &RigidTransform) -> GeometryResult<Self> {
        self.zip_broadcast("compose_additive", other, |a, b| a.compose_additive(b))
    }

    pub fn invert(&self) -> Self {
        self.map_elements(Rigid::inverse)
    }

    fn apply_with(
        &self,
        operation: &'static str,
        points: &ArrayD<f64>,
        f: impl Fn(&Rigid, &Vector3<f64>) -> Vector3<f64>,
    ) -> GeometryResult<ArrayD<f64>> {
        let (point_shape, pts) = points_from_array(operation, points)?;
        let shape = broadcast_shapes(operation, &self.shape, &point_shape)?;
        let t_ids = broadcast_ids(operation, &self.shape, &shape)?;
        let p_ids = broadcast_ids(operation, &point_shape, &shape)?;

        let rows = t_ids
            .iter()
            .zip(&p_ids)
            .map(|(&t, &p)| vector_to_row(&f(&self.elements[t], &pts[p])));
        Ok(join_trailing(&shape, &[3], rows))
    }

    /// Apply to points `[*P, 3]`: `R * p + t`. `S` and `P` broadcast.
    pub fn apply(&self, points: &ArrayD<f64>) -> GeometryResult<ArrayD<f64>> {
        self.apply_with("apply", points, Rigid::transform_point)
    }

    /// Apply the inverse to points without materialising it:
    /// `R^T * (p - t)`.
    pub fn invert_apply(&self, points: &ArrayD<f64>) -> GeometryResult<ArrayD<f64>> {
        self.apply_with("invert_apply", points, Rigid::inverse_transform_point)
    }

    // ------------------------------------------------------------------
    // Batch manipulation
    // ------------------------------------------------------------------

    fn gather(&self, ids: &ArrayViewD<'_, usize>) -> Self {
        Self {
            shape: ids.shape().to_vec(),
            elements: ids.iter().map(|&id| self.elements[id]).collect(),
        }
    }

    /// Select along the batch dimensions.
    ///
    /// Selectors follow NumPy semantics: `Index` drops an axis, `Slice` keeps
    /// it and `NewAxis` inserts a unit axis. Slice bounds are clamped to the
    /// axis, so an overlong or reversed range yields a shorter or empty axis.
    /// Axes not covered by `selection` are taken whole.
    pub fn index(&self, selection: &[SliceInfoElem]) -> GeometryResult<Self> {
        let selection = complete_selection(&self.shape, selection)?;
        let ids = element_ids(&self.shape);
        let view = ids.slice(selection.as_slice());
        Ok(self.gather(&view))
    }

    fn pooled_ids(transforms: &[RigidTransform]) -> (Vec<Rigid>, Vec<ArrayD<usize>>) {
        let mut pool = Vec::with_capacity(transforms.iter().map(RigidTransform::len).sum());
        let mut ids = Vec::with_capacity(transforms.len());
        for t in transforms {
            let offset = pool.len();
            ids.push(element_ids(&t.shape).mapv(|id| id + offset));
            pool.extend_from_slice(&t.elements);
        }
        (pool, ids)
    }

    fn require_same_ndim(
        operation: &'static str,
        transforms: &[RigidTransform],
    ) -> GeometryResult<usize> {
        let first = transforms
            .first()
            .ok_or_else(|| GeometryError::shape_mismatch(operation, "no transforms to join"))?;
        let ndim = first.shape.len();
        if let Some(bad) = transforms.iter().find(|t| t.shape.len() != ndim) {
            return Err(GeometryError::shape_mismatch(
                operation,
                format!("batch shapes {:?} and {:?} differ in rank", first.shape, bad.shape),
            ));
        }
        Ok(ndim)
    }

    /// Join along an existing batch axis. Negative axes count from the end.
    pub fn concat(transforms: &[RigidTransform], axis: isize) -> GeometryResult<Self> {
        const OP: &str = "concat";
        let ndim = Self::require_same_ndim(OP, transforms)?;
        let axis = normalize_axis(OP, axis, ndim)?;

        let (pool, ids) = Self::pooled_ids(transforms);
        let views: Vec<_> = ids.iter().map(|a| a.view()).collect();
        let joined = ndarray::concatenate(Axis(axis), &views)?;

        Ok(Self {
            shape: joined.shape().to_vec(),
            elements: joined.iter().map(|&id| pool[id]).collect(),
        })
    }

    /// Join along a new batch axis. All inputs must share one batch shape.
    pub fn stack(transforms: &[RigidTransform], axis: isize) -> GeometryResult<Self> {
        const OP: &str = "stack";
        let ndim = Self::require_same_ndim(OP, transforms)?;
        let axis = normalize_axis(OP, axis, ndim + 1)?;

        let (pool, ids) = Self::pooled_ids(transforms);
        let views: Vec<_> = ids.iter().map(|a| a.view()).collect();
        let joined = ndarray::stack(Axis(axis), &views)?;

        Ok(Self {
            shape: joined.shape().to_vec(),
            elements: joined.iter().map(|&id| pool[id]).collect(),
        })
    }

    /// Insert a unit batch axis. Accepts `0..=ndim`; negative axes count from
    /// the end (`-1` appends).
    pub fn unsqueeze(&self, axis: isize) -> GeometryResult<Self> {
        let axis = normalize_axis("unsqueeze", axis, self.shape.len() + 1)?;
        let mut shape = self.shape.clone();
        shape.insert(axis, 1);
        Ok(Self {
            shape,
            elements: self.elements.clone(),
        })
    }

    /// Apply `f` to each of the 12 scalar component arrays (9 rotation
    /// entries, then 3 translation entries), each of shape `S`.
    ///
    /// All results must share one shape `S'`, which becomes the new batch
    /// shape. For example `|c| c.sum_axis(Axis(1))` sums out the second batch
    /// axis.
    pub fn map_components<F>(&self, f: F) -> GeometryResult<Self>
    where
        F: Fn(ArrayViewD<'_, f64>) -> ArrayD<f64>,
    {
        const OP: &str = "map_components";

        let mut outputs: Vec<ArrayD<f64>> = Vec::with_capacity(12);
        for component in 0..12 {
            let values: Vec<f64> = self
                .elements
                .iter()
                .map(|e| {
                    if component < 9 {
                        e.rotation[(component / 3, component % 3)]
                    } else {
                        e.translation[component - 9]
                    }
                })
                .collect();
            let array = ArrayD::from_shape_vec(IxDyn(&self.shape), values)?;
            outputs.push(f(array.view()));
        }

        let new_shape = outputs[0].shape().to_vec();
        if let Some(bad) = outputs.iter().find(|o| o.shape() != new_shape.as_slice()) {
            return Err(GeometryError::shape_mismatch(
                OP,
                format!("components mapped to {:?} and {:?}", new_shape, bad.shape()),
            ));
        }

        let columns: Vec<Vec<f64>> = outputs.iter().map(|o| o.iter().copied().collect()).collect();
        let elements = (0..element_count(&new_shape))
            .map(|i| {
                let rotation = Matrix3::from_fn(|r, c| columns[r * 3 + c][i]);
                let translation = Vector3::from_fn(|r, _| columns[9 + r][i]);
                Rigid::new(rotation, translation)
            })
            .collect();

        Ok(Self {
            shape: new_shape,
            elements,
        })
    }

    // ------------------------------------------------------------------
    // Scaling
    // ------------------------------------------------------------------

    /// Multiply rotation and translation by a scalar.
    pub fn scale(&self, factor: f64) -> Self {
        self.map_elements(|e| e.scaled(factor))
    }

    /// Multiply each element by the matching entry of `factors`, whose shape
    /// broadcasts against `S`.
    pub fn elementwise_multiply(&self, factors: &ArrayD<f64>) -> GeometryResult<Self> {
        const OP: &str = "elementwise_multiply";
        let shape = broadcast_shapes(OP, &self.shape, factors.shape())?;
        let t_ids = broadcast_ids(OP, &self.shape, &shape)?;
        let factors = factors.broadcast(shape.as_slice()).ok_or_else(|| {
            GeometryError::shape_mismatch(
                OP,
                format!("cannot broadcast factors to {:?}", shape),
            )
        })?;

        let elements = t_ids
            .iter()
            .zip(factors.iter())
            .map(|(&t, &factor)| self.elements[t].scaled(factor))
            .collect();
        Ok(Self { shape, elements })
    }

    /// Multiply only the translations by a scalar.
    pub fn scale_translation(&self, factor: f64) -> Self {
        self.map_elements(|e| e.with_scaled_translation(factor))
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Same shape and every component within `tolerance`.
    pub fn approx_eq(&self, other: &RigidTransform, tolerance: f64) -> bool {
        self.shape == other.shape
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|(a, b)| a.max_abs_diff(b) <= tolerance)
    }

    // ------------------------------------------------------------------
    // Encodings
    // ------------------------------------------------------------------

    /// From homogeneous matrices `[*S, 4, 4]`. The bottom row is ignored.
    pub fn from_4x4(matrices: &ArrayD<f64>) -> GeometryResult<Self> {
        let (shape, rows) = split_trailing::<16>("from_4x4", &matrices.view(), &[4, 4])?;
        let elements = rows
            .iter()
            .map(|row| Rigid::from_matrix(&Matrix4::from_row_slice(row)))
            .collect();
        Ok(Self { shape, elements })
    }

    /// Homogeneous matrices `[*S, 4, 4]` with bottom row `[0, 0, 0, 1]`.
    pub fn to_4x4(&self) -> ArrayD<f64> {
        let rows = self.elements.iter().map(|e| {
            let m = e.to_matrix();
            let mut row = [0.0; 16];
            for (k, value) in row.iter_mut().enumerate() {
                *value = m[(k / 4, k % 4)];
            }
            row
        });
        join_trailing(&self.shape, &[4, 4], rows)
    }

    /// Rotations from quaternions `[*S, 4]` (real part first); zero
    /// translations.
    pub fn from_quaternions(quats: &ArrayD<f64>) -> GeometryResult<Self> {
        let (shape, rows) = split_trailing::<4>("from_quaternions", &quats.view(), &[4])?;
        let elements = rows
            .iter()
            .map(|q| Rigid::from_rotation(quat_to_matrix(&quat_from_array(*q))))
            .collect();
        Ok(Self { shape, elements })
    }

    /// Quaternions `[*S, 4]` (real part first) of the rotations.
    pub fn to_quaternions(&self) -> ArrayD<f64> {
        let rows = self
            .elements
            .iter()
            .map(|e| quat_to_array(&rot_to_quat(&e.rotation)));
        join_trailing(&self.shape, &[4], rows)
    }

    /// Rotations from axis-angle vectors `[*S, 3]`; zero translations.
    pub fn from_axis_angles(axis_angles: &ArrayD<f64>) -> GeometryResult<Self> {
        let (shape, vectors) = points_from_array("from_axis_angles", axis_angles)?;
        let elements = vectors
            .iter()
            .map(|v| Rigid::from_rotation(axis_angle_to_matrix(v)))
            .collect();
        Ok(Self { shape, elements })
    }

    /// Axis-angle vectors `[*S, 3]` of the rotations.
    pub fn to_axis_angles(&self) -> ArrayD<f64> {
        let rows = self
            .elements
            .iter()
            .map(|e| vector_to_row(&matrix_to_axis_angle(&e.rotation)));
        join_trailing(&self.shape, &[3], rows)
    }

    /// From 7-vectors `[*S, 7]` laid out as `[w, x, y, z, tx, ty, tz]`.
    pub fn from_affine_vectors(vectors: &ArrayD<f64>) -> GeometryResult<Self> {
        let (shape, rows) = split_trailing::<7>("from_affine_vectors", &vectors.view(), &[7])?;
        let elements = rows
            .iter()
            .map(|v| Rigid::from_matrix(&affine_vector_to_4x4(v)))
            .collect();
        Ok(Self { shape, elements })
    }

    /// 7-vectors `[*S, 7]` laid out as `[w, x, y, z, tx, ty, tz]`.
    pub fn to_affine_vectors(&self) -> ArrayD<f64> {
        let rows = self.elements.iter().map(|e| {
            let q = quat_to_array(&rot_to_quat(&e.rotation));
            let t = e.translation;
            [q[0], q[1], q[2], q[3], t.x, t.y, t.z]
        });
        join_trailing(&self.shape, &[7], rows)
    }

    /// Gram-Schmidt frames from three point arrays of identical shape
    /// `[*S, 3]`. See [`three_point_frame`].
    pub fn from_three_points(
        neg_x: &ArrayD<f64>,
        origin: &ArrayD<f64>,
        xy_plane: &ArrayD<f64>,
        eps: f64,
    ) -> GeometryResult<Self> {
        const OP: &str = "from_three_points";
        let (shape, neg_x) = points_from_array(OP, neg_x)?;
        let (origin_shape, origin) = points_from_array(OP, origin)?;
        let (xy_shape, xy_plane) = points_from_array(OP, xy_plane)?;
        require_same_shape(OP, &shape, &origin_shape)?;
        require_same_shape(OP, &shape, &xy_shape)?;

        let elements = neg_x
            .iter()
            .zip(&origin)
            .zip(&xy_plane)
            .map(|((a, o), c)| three_point_frame(a, o, c, eps))
            .collect();
        Ok(Self { shape, elements })
    }

    /// Backbone reference frames from N, CA and C arrays of identical shape
    /// `[*S, 3]`. See [`backbone_reference_frame`].
    pub fn from_backbone_reference(
        n: &ArrayD<f64>,
        ca: &ArrayD<f64>,
        c: &ArrayD<f64>,
        eps: f64,
    ) -> GeometryResult<Self> {
        const OP: &str = "from_backbone_reference";
        let (shape, n) = points_from_array(OP, n)?;
        let (ca_shape, ca) = points_from_array(OP, ca)?;
        let (c_shape, c) = points_from_array(OP, c)?;
        require_same_shape(OP, &shape, &ca_shape)?;
        require_same_shape(OP, &shape, &c_shape)?;

        let elements = n
            .iter()
            .zip(&ca)
            .zip(&c)
            .map(|((n, ca), c)| backbone_reference_frame(n, ca, c, eps))
            .collect();
        Ok(Self { shape, elements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, UnitQuaternion};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_rigid(rng: &mut StdRng) -> Rigid {
        let axis_angle = Vector3::new(
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
        );
        Rigid::new(
            Rotation3::from_scaled_axis(axis_angle).into_inner(),
            Vector3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            ),
        )
    }

    fn random_transform(rng: &mut StdRng, shape: &[usize]) -> RigidTransform {
        let elements = (0..element_count(shape)).map(|_| random_rigid(rng)).collect();
        RigidTransform::from_elements(shape, elements).unwrap()
    }

    fn random_points(rng: &mut StdRng, shape: &[usize]) -> ArrayD<f64> {
        ArrayD::from_shape_fn(IxDyn(shape), |_| rng.gen_range(-5.0..5.0))
    }

    fn max_abs_diff(a: &ArrayD<f64>, b: &ArrayD<f64>) -> f64 {
        assert_eq!(a.shape(), b.shape());
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        let rots = ArrayD::<f64>::zeros(IxDyn(&[4, 3, 3]));
        let trans = ArrayD::<f64>::zeros(IxDyn(&[4, 3]));
        assert!(RigidTransform::new(&rots, &trans).is_ok());

        let short = ArrayD::<f64>::zeros(IxDyn(&[5, 3]));
        assert!(matches!(
            RigidTransform::new(&rots, &short),
            Err(GeometryError::ShapeMismatch { .. })
        ));

        let not_square = ArrayD::<f64>::zeros(IxDyn(&[4, 3, 2]));
        assert!(RigidTransform::new(&not_square, &trans).is_err());

        let wide = ArrayD::<f64>::zeros(IxDyn(&[4, 4]));
        assert!(RigidTransform::new(&rots, &wide).is_err());
    }

    #[test]
    fn test_arrays_round_trip_through_new() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = random_transform(&mut rng, &[2, 3]);

        let rebuilt = RigidTransform::new(&t.rotations(), &t.translations()).unwrap();
        assert_eq!(rebuilt, t);
        assert_eq!(t.rotations().shape(), &[2, 3, 3, 3]);
        assert_eq!(t.translations().shape(), &[2, 3, 3]);
    }

    #[test]
    fn test_single_component_constructors() {
        let trans = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let t = RigidTransform::from_translations(&trans).unwrap();
        assert_eq!(t.shape(), &[2]);
        assert_eq!(t.elements()[1].rotation, Matrix3::identity());
        assert_eq!(t.translations(), trans);

        let r = RigidTransform::from_rotations(&t.rotations()).unwrap();
        assert_eq!(r.elements()[0].translation, Vector3::zeros());
    }

    #[test]
    fn test_apply_invert_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let t = random_transform(&mut rng, &[4, 5]);
        let points = random_points(&mut rng, &[4, 5, 3]);

        let moved = t.apply(&points).unwrap();
        let back = t.invert().apply(&moved).unwrap();
        assert!(max_abs_diff(&back, &points) < 1e-10);

        let back_direct = t.invert_apply(&moved).unwrap();
        assert!(max_abs_diff(&back_direct, &points) < 1e-10);
    }

    #[test]
    fn test_apply_broadcasts_points() {
        let mut rng = StdRng::seed_from_u64(3);
        // Transforms [2, 1] against points [7, 3] -> result [2, 7, 3].
        let t = random_transform(&mut rng, &[2, 1]);
        let points = random_points(&mut rng, &[7, 3]);

        let moved = t.apply(&points).unwrap();
        assert_eq!(moved.shape(), &[2, 7, 3]);

        let p = Vector3::new(points[&[4, 0][..]], points[&[4, 1][..]], points[&[4, 2][..]]);
        let expected = t.elements()[1].transform_point(&p);
        assert_relative_eq!(moved[&[1, 4, 2][..]], expected.z, epsilon = 1e-12);

        let three = random_points(&mut rng, &[3, 3]);
        assert_eq!(t.unsqueeze(0).unwrap().apply(&three).unwrap().shape(), &[1, 2, 3, 3]);
        assert!(random_transform(&mut rng, &[2]).apply(&three).is_err());
    }

    #[test]
    fn test_compose_identity_is_neutral() {
        let mut rng = StdRng::seed_from_u64(5);
        let t = random_transform(&mut rng, &[3, 2]);
        let id = RigidTransform::identity(t.shape());

        assert!(t.compose(&id).unwrap().approx_eq(&t, 1e-12));
        assert!(id.compose(&t).unwrap().approx_eq(&t, 1e-12));
    }

    #[test]
    fn test_compose_is_associative_and_matches_apply() {
        let mut rng = StdRng::seed_from_u64(9);
        let a = random_transform(&mut rng, &[4]);
        let b = random_transform(&mut rng, &[4]);
        let c = random_transform(&mut rng, &[4]);

        let left = a.compose(&b).unwrap().compose(&c).unwrap();
        let right = a.compose(&b.compose(&c).unwrap()).unwrap();
        assert!(left.approx_eq(&right, 1e-10));

        let points = random_points(&mut rng, &[4, 3]);
        let sequential = a.apply(&b.apply(&points).unwrap()).unwrap();
        let composed = a.compose(&b).unwrap().apply(&points).unwrap();
        assert!(max_abs_diff(&sequential, &composed) < 1e-10);
    }

    #[test]
    fn test_compose_broadcasts_batch_shapes() {
        let mut rng = StdRng::seed_from_u64(13);
        let outer = random_transform(&mut rng, &[3, 1]);
        let inner = random_transform(&mut rng, &[4]);

        let composed = outer.compose(&inner).unwrap();
        assert_eq!(composed.shape(), &[3, 4]);

        let expected = outer.elements()[2].compose(&inner.elements()[1]);
        assert_eq!(composed.get(&[2, 1]).unwrap(), &expected);

        let mismatched = random_transform(&mut rng, &[5]);
        assert!(inner.compose(&mismatched).is_err());
    }

    #[test]
    fn test_compose_additive() {
        let a = RigidTransform::from_rigid(Rigid::new(
            Rotation3::from_axis_angle(&Vector3::z_axis(), 0.5).into_inner(),
            Vector3::new(1.0, 0.0, 0.0),
        ));
        let b = RigidTransform::from_rigid(Rigid::from_translation(Vector3::new(0.0, 2.0, 0.0)));

        let sum = a.compose_additive(&b).unwrap();
        assert_relative_eq!(sum.elements()[0].translation, Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_index_matches_torch_example() {
        let mut rng = StdRng::seed_from_u64(17);
        let t = random_transform(&mut rng, &[10, 10]);

        let indexed = t
            .index(&[
                SliceInfoElem::Index(3),
                SliceInfoElem::Slice {
                    start: 4,
                    end: Some(6),
                    step: 1,
                },
            ])
            .unwrap();

        assert_eq!(indexed.shape(), &[2]);
        assert_eq!(indexed.rotations().shape(), &[2, 3, 3]);
        assert_eq!(indexed.translations().shape(), &[2, 3]);
        assert_eq!(indexed.elements()[0], *t.get(&[3, 4]).unwrap());
        assert_eq!(indexed.elements()[1], *t.get(&[3, 5]).unwrap());
    }

    #[test]
    fn test_index_negative_new_axis_and_errors() {
        let mut rng = StdRng::seed_from_u64(19);
        let t = random_transform(&mut rng, &[4, 3]);

        let last = t.index(&[SliceInfoElem::Index(-1)]).unwrap();
        assert_eq!(last.shape(), &[3]);
        assert_eq!(last.elements()[0], *t.get(&[3, 0]).unwrap());

        let expanded = t.index(&[SliceInfoElem::NewAxis]).unwrap();
        assert_eq!(expanded.shape(), &[1, 4, 3]);

        let strided = t
            .index(&[SliceInfoElem::Slice {
                start: 0,
                end: None,
                step: 2,
            }])
            .unwrap();
        assert_eq!(strided.shape(), &[2, 3]);
        assert_eq!(strided.elements()[3], *t.get(&[2, 0]).unwrap());

        assert!(t.index(&[SliceInfoElem::Index(4)]).is_err());
        assert!(t.index(&[SliceInfoElem::Index(-5)]).is_err());
        assert!(
            t.index(&[
                SliceInfoElem::Index(0),
                SliceInfoElem::Index(0),
                SliceInfoElem::Index(0)
            ])
            .is_err()
        );
    }

    #[test]
    fn test_index_clamps_slice_bounds() {
        let t = RigidTransform::identity(&[10]);

        let overlong = t
            .index(&[SliceInfoElem::Slice {
                start: 0,
                end: Some(100),
                step: 1,
            }])
            .unwrap();
        assert_eq!(overlong.shape(), &[10]);

        let reversed = t
            .index(&[SliceInfoElem::Slice {
                start: 5,
                end: Some(3),
                step: 1,
            }])
            .unwrap();
        assert_eq!(reversed.shape(), &[0]);
        assert!(reversed.is_empty());
        assert_eq!(reversed.rotations().shape(), &[0, 3, 3]);

        let tail = t
            .index(&[SliceInfoElem::Slice {
                start: -3,
                end: None,
                step: 1,
            }])
            .unwrap();
        assert_eq!(tail.shape(), &[3]);
    }

    #[test]
    fn test_concat_and_stack() {
        let mut rng = StdRng::seed_from_u64(23);
        let a = random_transform(&mut rng, &[2, 3]);
        let b = random_transform(&mut rng, &[4, 3]);

        let joined = RigidTransform::concat(&[a.clone(), b.clone()], 0).unwrap();
        assert_eq!(joined.shape(), &[6, 3]);
        assert_eq!(joined.get(&[1, 2]), a.get(&[1, 2]));
        assert_eq!(joined.get(&[5, 0]), b.get(&[3, 0]));

        assert!(RigidTransform::concat(&[a.clone(), b.clone()], -1).is_err());
        assert!(RigidTransform::concat(&[], 0).is_err());

        let c = random_transform(&mut rng, &[2, 3]);
        let stacked = RigidTransform::stack(&[a.clone(), c.clone()], -1).unwrap();
        assert_eq!(stacked.shape(), &[2, 3, 2]);
        assert_eq!(stacked.get(&[1, 2, 1]), c.get(&[1, 2]));

        assert!(RigidTransform::stack(&[a, b], 0).is_err());
    }

    #[test]
    fn test_unsqueeze() {
        let t = RigidTransform::identity(&[4, 5]);
        assert_eq!(t.unsqueeze(0).unwrap().shape(), &[1, 4, 5]);
        assert_eq!(t.unsqueeze(2).unwrap().shape(), &[4, 5, 1]);
        assert_eq!(t.unsqueeze(-1).unwrap().shape(), &[4, 5, 1]);
        assert_eq!(t.unsqueeze(-2).unwrap().shape(), &[4, 1, 5]);
        assert!(t.unsqueeze(3).is_err());
    }

    #[test]
    fn test_map_components_sum_reduction() {
        let mut rng = StdRng::seed_from_u64(29);
        let t = random_transform(&mut rng, &[3, 4]);

        let summed = t.map_components(|c| c.sum_axis(Axis(1))).unwrap();
        assert_eq!(summed.shape(), &[3]);

        let expected: Vector3<f64> = (0..4).map(|j| t.get(&[1, j]).unwrap().translation).sum();
        assert_relative_eq!(summed.elements()[1].translation, expected, epsilon = 1e-12);

        let expected_rot: Matrix3<f64> = (0..4).map(|j| t.get(&[2, j]).unwrap().rotation).sum();
        assert_relative_eq!(summed.elements()[2].rotation, expected_rot, epsilon = 1e-12);
    }

    #[test]
    fn test_scaling() {
        let mut rng = StdRng::seed_from_u64(31);
        let t = random_transform(&mut rng, &[3]);

        let halved = t.scale(0.5);
        assert_relative_eq!(
            halved.elements()[0].rotation,
            t.elements()[0].rotation * 0.5,
            epsilon = 1e-15
        );

        let mask = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 0.0, 2.0]).unwrap();
        let masked = t.elementwise_multiply(&mask).unwrap();
        assert_eq!(masked.elements()[0], t.elements()[0]);
        assert_eq!(masked.elements()[1].rotation, Matrix3::zeros());
        assert_relative_eq!(
            masked.elements()[2].translation,
            t.elements()[2].translation * 2.0,
            epsilon = 1e-15
        );

        let bad_mask = ArrayD::<f64>::ones(IxDyn(&[4]));
        assert!(t.elementwise_multiply(&bad_mask).is_err());

        let stretched = t.scale_translation(10.0);
        assert_eq!(stretched.elements()[2].rotation, t.elements()[2].rotation);
        assert_relative_eq!(
            stretched.elements()[2].translation,
            t.elements()[2].translation * 10.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_4x4_round_trip() {
        let mut rng = StdRng::seed_from_u64(37);
        let t = random_transform(&mut rng, &[2, 2]);

        let mats = t.to_4x4();
        assert_eq!(mats.shape(), &[2, 2, 4, 4]);
        assert_eq!(mats[&[1, 0, 3, 3][..]], 1.0);
        assert_eq!(mats[&[1, 0, 3, 1][..]], 0.0);
        assert_eq!(mats[&[0, 1, 2, 3][..]], t.get(&[0, 1]).unwrap().translation.z);

        assert_eq!(RigidTransform::from_4x4(&mats).unwrap(), t);
    }

    #[test]
    fn test_quaternion_round_trip_up_to_sign() {
        let mut rng = StdRng::seed_from_u64(41);
        let t = random_transform(&mut rng, &[6]);

        let quats = t.to_quaternions();
        assert_eq!(quats.shape(), &[6, 4]);

        let rebuilt = RigidTransform::from_quaternions(&quats).unwrap();
        for (a, b) in t.iter().zip(rebuilt.iter()) {
            assert_relative_eq!(a.rotation, b.rotation, epsilon = 1e-10);
            assert_eq!(b.translation, Vector3::zeros());
        }

        for (k, rigid) in t.iter().enumerate() {
            let q = UnitQuaternion::from_matrix(&rigid.rotation);
            let row: Vec<f64> = (0..4).map(|c| quats[&[k, c][..]]).collect();
            let same = (row[0] - q.w).abs() < 1e-8 && (row[1] - q.i).abs() < 1e-8;
            let flipped = (row[0] + q.w).abs() < 1e-8 && (row[1] + q.i).abs() < 1e-8;
            assert!(same || flipped);
        }
    }

    #[test]
    fn test_axis_angle_batch_round_trip() {
        let vectors = ArrayD::from_shape_vec(
            IxDyn(&[3, 3]),
            vec![1e-7, 0.0, -2e-7, 0.3, -0.2, 0.9, 0.0, 0.0, std::f64::consts::PI - 1e-3],
        )
        .unwrap();

        let t = RigidTransform::from_axis_angles(&vectors).unwrap();
        let back = t.to_axis_angles();
        assert!(max_abs_diff(&back, &vectors) < 1e-6);
    }

    #[test]
    fn test_affine_vectors_round_trip() {
        let mut rng = StdRng::seed_from_u64(43);
        let t = random_transform(&mut rng, &[5]);

        let vectors = t.to_affine_vectors();
        assert_eq!(vectors.shape(), &[5, 7]);

        let rebuilt = RigidTransform::from_affine_vectors(&vectors).unwrap();
        assert!(rebuilt.approx_eq(&t, 1e-9));
    }

    #[test]
    fn test_from_three_points_batch() {
        let neg_x = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![1.0, 0.0, 0.0]).unwrap();
        let origin = ArrayD::<f64>::zeros(IxDyn(&[1, 3]));
        let xy = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![0.0, 1.0, 0.0]).unwrap();

        let t = RigidTransform::from_three_points(&neg_x, &origin, &xy, 1e-8).unwrap();
        assert_eq!(t.shape(), &[1]);

        let rot = t.elements()[0].rotation;
        assert_relative_eq!(rot.column(0).into_owned(), Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-7);
        assert_relative_eq!(rot.transpose() * rot, Matrix3::identity(), epsilon = 1e-7);
        assert_eq!(t.elements()[0].translation, Vector3::zeros());

        let wrong = ArrayD::<f64>::zeros(IxDyn(&[2, 3]));
        assert!(RigidTransform::from_three_points(&neg_x, &wrong, &xy, 1e-8).is_err());
    }

    #[test]
    fn test_from_backbone_reference_batch_shape() {
        let mut rng = StdRng::seed_from_u64(47);
        let n = random_points(&mut rng, &[2, 5, 3]);
        let ca = random_points(&mut rng, &[2, 5, 3]);
        let c = random_points(&mut rng, &[2, 5, 3]);

        let t = RigidTransform::from_backbone_reference(&n, &ca, &c, 1e-20).unwrap();
        assert_eq!(t.shape(), &[2, 5]);
        assert_eq!(t.translations(), ca);
    }

    #[test]
    fn test_exact_equality() {
        let t = RigidTransform::identity(&[2]);
        let nudged = t.scale_translation(1.0).compose(&RigidTransform::from_rigid(
            Rigid::from_translation(Vector3::new(1e-12, 0.0, 0.0)),
        ));
        let nudged = nudged.unwrap();

        assert_ne!(t, nudged);
        assert!(t.approx_eq(&nudged, 1e-9));
    }
}
