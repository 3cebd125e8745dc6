//! File input.

pub mod transforms;

pub use transforms::load_transforms;
