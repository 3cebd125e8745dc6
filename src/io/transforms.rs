use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nalgebra::Matrix4;
use serde::Deserialize;
use tracing::info;

use crate::geometry::{Rigid, RigidTransform};

/// One homogeneous matrix, row-major, as in EuRoC-style `T_BS` blocks.
#[derive(Debug, Deserialize)]
struct TransformYaml {
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct TransformsFile {
    transforms: Vec<TransformYaml>,
}

/// Load a batch of rigid transforms from YAML:
///
/// ```yaml
/// transforms:
///   - data: [1, 0, 0, 0,  0, 1, 0, 0,  0, 0, 1, 0,  0, 0, 0, 1]
/// ```
///
/// Returns a transform of batch shape `[N]`. The bottom row of each matrix is
/// ignored.
pub fn load_transforms<P: AsRef<Path>>(path: P) -> Result<RigidTransform> {
    let path = path.as_ref();
    let file: TransformsFile = serde_yaml::from_reader(
        File::open(path).with_context(|| format!("Failed to open {:?}", path))?,
    )
    .with_context(|| format!("Failed to parse transforms file {:?}", path))?;

    if file.transforms.is_empty() {
        bail!("No transforms in {:?}", path);
    }

    let elements = file
        .transforms
        .iter()
        .enumerate()
        .map(|(i, t)| {
            transform_from(&t.data).with_context(|| format!("Transform {} in {:?}", i, path))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} transforms from {:?}", elements.len(), path);
    Ok(RigidTransform::from_elements(&[elements.len()], elements)?)
}

fn transform_from(data: &[f64]) -> Result<Rigid> {
    if data.len() != 16 {
        bail!("Expected 16 elements for transform, got {}", data.len());
    }
    let mat = Matrix4::from_row_slice(data);
    Ok(Rigid::from_matrix(&mat))
}
