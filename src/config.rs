//! Numeric policy for frame construction and conformer edits.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// Epsilons and thresholds used by the geometry routines.
///
/// Every field has a default, so a YAML file only needs to list the values it
/// overrides.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Added under the square root when normalising Gram-Schmidt axes.
    pub three_point_epsilon: f64,
    /// Added under the square root in the backbone reference construction.
    pub backbone_epsilon: f64,
    /// Torsion updates smaller than this (radians) are skipped.
    pub torsion_skip_threshold: f64,
    /// Added to the bond length when building a torsion axis.
    pub torsion_axis_epsilon: f64,
    /// Added to the central bond length when measuring a dihedral.
    pub dihedral_epsilon: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            three_point_epsilon: 1e-8,
            backbone_epsilon: 1e-20,
            torsion_skip_threshold: 1e-3,
            torsion_axis_epsilon: 1e-6,
            dihedral_epsilon: 1e-6,
        }
    }
}

impl GeometryConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("Failed to open {:?}", path))?;

        if text.trim().is_empty() {
            warn!("Geometry config {:?} is empty, using defaults", path);
            return Ok(GeometryConfig::default());
        }

        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse geometry config {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "three_point_epsilon: 1.0e-6").unwrap();
        writeln!(file, "torsion_skip_threshold: 0.01").unwrap();

        let config = GeometryConfig::from_yaml_file(file.path()).unwrap();

        assert_eq!(config.three_point_epsilon, 1e-6);
        assert_eq!(config.torsion_skip_threshold, 0.01);
        assert_eq!(config.backbone_epsilon, 1e-20);
        assert_eq!(config.dihedral_epsilon, 1e-6);
    }

    #[test]
    fn test_empty_yaml_falls_back_to_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = GeometryConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config, GeometryConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GeometryConfig::from_yaml_file(dir.path().join("missing.yaml"));
        assert!(result.is_err());
    }
}
