use anyhow::Result;
use ndarray::{Axis, SliceInfoElem};
use tracing_subscriber::EnvFilter;

use dock_frames::config::GeometryConfig;
use dock_frames::geometry::RigidTransform;
use dock_frames::io::load_transforms;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(transforms_path) = args.next() else {
        eprintln!("Usage: dock-frames <transforms.yaml> [config.yaml]");
        std::process::exit(2);
    };
    let config = match args.next() {
        Some(path) => GeometryConfig::from_yaml_file(path)?,
        None => GeometryConfig::default(),
    };

    let transforms = load_transforms(&transforms_path)?;
    let quats = transforms.to_quaternions();
    let axis_angles = transforms.to_axis_angles();

    println!("{} transforms from {}", transforms.len(), transforms_path);
    for (i, rigid) in transforms.iter().enumerate() {
        let q: Vec<f64> = quats.index_axis(Axis(0), i).iter().copied().collect();
        let angle = axis_angles
            .index_axis(Axis(0), i)
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt();
        let t = rigid.translation;
        println!(
            "  [{:>3}] q = [{:+.4}, {:+.4}, {:+.4}, {:+.4}]  angle = {:7.2} deg  t = [{:+.3}, {:+.3}, {:+.3}]",
            i,
            q[0],
            q[1],
            q[2],
            q[3],
            angle.to_degrees(),
            t.x,
            t.y,
            t.z
        );
    }

    // Express every pose origin in the frame spanned by the first three.
    if transforms.len() >= 3 {
        let origins = transforms.translations();
        let origin_set = RigidTransform::from_translations(&origins)?;
        let point = |i: isize| {
            origin_set
                .index(&[SliceInfoElem::Index(i)])
                .map(|t| t.translations())
        };
        let frame = RigidTransform::from_three_points(
            &point(0)?,
            &point(1)?,
            &point(2)?,
            config.three_point_epsilon,
        )?;

        let local = frame.invert_apply(&origins)?;
        println!("Origins in the frame of poses 0-1-2:");
        for (i, row) in local.outer_iter().enumerate() {
            let p: Vec<f64> = row.iter().copied().collect();
            println!("  [{:>3}] [{:+.3}, {:+.3}, {:+.3}]", i, p[0], p[1], p[2]);
        }
    }

    Ok(())
}
