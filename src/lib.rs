pub mod config;
pub mod conformer;
pub mod error;
pub mod geometry;
pub mod io;

pub use config::GeometryConfig;
pub use error::{GeometryError, GeometryResult};
pub use geometry::{Rigid, RigidTransform};
