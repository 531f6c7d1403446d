//! objurdf entry point
//!
//! Usage:
//!   objurdf objects/                         # build every mesh in the library
//!   objurdf objects/ objects/mug/mug.obj     # build selected meshes
//!   objurdf objects/ --decompose --center bottom

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use objurdf_core::{BuildOutcome, CenterMode, ObjectUrdfBuilder};

use crate::config::{BuildConfig, DecomposerKind};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "objurdf")]
#[command(about = "Generate URDF files for a library of OBJ/STL objects")]
struct Cli {
    /// Folder holding the prototype URDF and the object meshes
    object_folder: PathBuf,

    /// Meshes to build; builds the whole library when empty
    meshes: Vec<PathBuf>,

    /// Prototype URDF file name inside the object folder
    #[arg(short, long)]
    prototype: Option<PathBuf>,

    /// Decomposition log file
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Output folder (defaults to the object folder). Must contain the meshes,
    /// since mesh filenames are written relative to it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// RON build configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference point moved to the link origin (none, mass, geometry, top, bottom)
    #[arg(long)]
    center: Option<CenterMode>,

    /// Run convex decomposition for the collision meshes
    #[arg(long)]
    decompose: bool,

    /// Rewrite URDFs that already exist
    #[arg(long)]
    force_overwrite: bool,

    /// Re-run decomposition even if the decomposed mesh exists
    #[arg(long)]
    force_decompose: bool,

    /// Decomposition backend
    #[arg(long, value_enum)]
    decomposer: Option<DecomposerKind>,

    /// Executable for the command backend
    #[arg(long)]
    vhacd_command: Option<PathBuf>,
}

impl Cli {
    /// Layer command-line flags over a loaded configuration
    fn apply_to(&self, config: &mut BuildConfig) {
        if let Some(prototype) = &self.prototype {
            config.prototype = prototype.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        if let Some(center) = self.center {
            config.center = center;
        }
        if let Some(decomposer) = self.decomposer {
            config.decomposer = decomposer;
        }
        if let Some(command) = &self.vhacd_command {
            config.vhacd_command = command.clone();
        }
        config.decompose_concave |= self.decompose;
        config.force_overwrite |= self.force_overwrite;
        config.force_decompose |= self.force_decompose;
    }
}

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "objurdf_core=info,objurdf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BuildConfig::default(),
    };
    cli.apply_to(&mut config);

    let builder = ObjectUrdfBuilder::new(&cli.object_folder, &config.log_file, &config.prototype)
        .with_context(|| format!("Failed to open object folder {}", cli.object_folder.display()))?
        .with_decomposer(config.create_decomposer());
    let options = config.build_options(cli.output.clone());

    if cli.meshes.is_empty() {
        let report = builder
            .build_library(&options)
            .with_context(|| format!("Failed to build library {}", cli.object_folder.display()))?;
        tracing::info!(
            "Built {} URDFs ({} written, {} kept)",
            report.total(),
            report.written.len(),
            report.skipped.len()
        );
        return Ok(());
    }

    for mesh in &cli.meshes {
        let outcome = builder
            .build_urdf(mesh, &options)
            .with_context(|| format!("Failed to build URDF for {}", mesh.display()))?;
        match outcome {
            BuildOutcome::Written(path) => tracing::info!("Wrote {}", path.display()),
            BuildOutcome::Skipped(path) => tracing::info!("Kept existing {}", path.display()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::fs;
    use tempfile::tempdir;

    const PROTOTYPE: &str = r#"<robot name="p"><link name="l">
        <visual><geometry><mesh filename="x.obj"/></geometry></visual>
        <collision><geometry><mesh filename="x.obj"/></geometry></collision>
    </link></robot>"#;

    #[test]
    fn test_parse_library_invocation() {
        let cli = Cli::try_parse_from(["objurdf", "objects"]).unwrap();
        assert_eq!(cli.object_folder, PathBuf::from("objects"));
        assert!(cli.meshes.is_empty());
        assert!(cli.center.is_none());
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "objurdf",
            "objects",
            "objects/mug/mug.obj",
            "--center",
            "bottom",
            "--decompose",
            "--decomposer",
            "command",
            "-p",
            "base.urdf",
        ])
        .unwrap();

        assert_eq!(cli.meshes, vec![PathBuf::from("objects/mug/mug.obj")]);
        assert_eq!(cli.center, Some(CenterMode::Bottom));
        assert_eq!(cli.decomposer, Some(DecomposerKind::Command));
        assert!(cli.decompose);
    }

    #[test]
    fn test_rejects_unknown_center() {
        assert!(Cli::try_parse_from(["objurdf", "objects", "--center", "middle"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli =
            Cli::try_parse_from(["objurdf", "objects", "--center", "none", "--force-overwrite"])
                .unwrap();
        let mut config = BuildConfig {
            decompose_concave: true,
            center: CenterMode::Top,
            ..Default::default()
        };

        cli.apply_to(&mut config);
        assert_eq!(config.center, CenterMode::None);
        assert!(config.force_overwrite);
        assert!(config.decompose_concave);
    }

    #[test]
    fn test_run_builds_selected_mesh() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("_prototype.urdf"), PROTOTYPE).unwrap();
        fs::create_dir_all(root.join("mug")).unwrap();
        fs::write(root.join("mug/mug.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

        let mesh = root.join("mug/mug.obj");
        let cli = Cli::try_parse_from([
            OsStr::new("objurdf"),
            root.as_os_str(),
            mesh.as_os_str(),
            OsStr::new("--center"),
            OsStr::new("none"),
        ])
        .unwrap();
        run(cli).unwrap();

        let urdf = fs::read_to_string(root.join("mug.urdf")).unwrap();
        assert!(urdf.contains(r#"filename="mug/mug.obj""#));
        assert!(urdf.contains(r#"<robot name="mug">"#));
    }

    #[test]
    fn test_run_reports_missing_prototype() {
        let temp = tempdir().unwrap();
        let cli = Cli::try_parse_from([OsStr::new("objurdf"), temp.path().as_os_str()]).unwrap();
        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("Failed to open object folder"));
    }
}
