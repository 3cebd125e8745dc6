//! Conformer geometry: dihedrals, torsion updates and random rotations.

pub mod rotation;
pub mod torsion;

pub use rotation::{arvo_rotation, uniform_random_rotation};
pub use torsion::{apply_torsion_updates, dihedral, von_mises_dihedral};
