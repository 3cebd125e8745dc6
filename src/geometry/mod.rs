//! Geometry: rigid elements, quaternion conversions, local frames and the
//! batched RigidTransform.

pub mod batch;
pub mod frames;
pub mod quaternion;
pub mod rigid;
pub mod transform;

pub use frames::{backbone_reference_frame, three_point_frame};
pub use quaternion::{
    QUAT_TO_ROT_TABLE, axis_angle_to_matrix, matrix_to_axis_angle, quat_to_matrix, quat_to_rot,
    rot_to_quat,
};
pub use rigid::Rigid;
pub use transform::RigidTransform;
