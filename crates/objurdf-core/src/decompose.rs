//! Convex decomposition of concave meshes
//!
//! Decomposition runs through the [`ConvexDecomposer`] trait so the builder
//! does not care whether hulls come from an in-process VHACD ([`VhacdDecomposer`],
//! backed by `parry3d`) or from an external executable ([`CommandDecomposer`]).
//! Both backends write the hulls to an OBJ and write a log file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use parry3d::math::Point;
use parry3d::transformation::vhacd::{VHACD, VHACDParameters};
use serde::{Deserialize, Serialize};

use crate::constants::{DECOMPOSED_SUFFIX, DEFAULT_VHACD_COMMAND};
use crate::mesh::{TriMesh, load_mesh, write_obj_objects};

/// Decomposition options.
///
/// Unset options keep the backend's default. `extra` entries are forwarded
/// verbatim to command backends as `--<key> <value>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhacdOptions {
    /// Voxel count used during voxelization
    pub resolution: Option<u32>,
    /// Maximum allowed concavity
    pub concavity: Option<f32>,
    /// Bias toward clipping along symmetry planes
    pub alpha: Option<f32>,
    /// Bias toward clipping along revolution axes
    pub beta: Option<f32>,
    /// Granularity of the search for the best clipping plane
    pub plane_downsampling: Option<u32>,
    /// Precision of the convex-hull generation during clipping
    pub convex_hull_downsampling: Option<u32>,
    /// Upper bound on the number of hulls (in-process backend only)
    pub max_convex_hulls: Option<u32>,
    /// Approximate hulls during clipping
    pub convex_hull_approximation: Option<bool>,
    /// Backend-specific pass-through options
    pub extra: BTreeMap<String, String>,
}

impl VhacdOptions {
    /// Merge into `parry3d` parameters, starting from its defaults
    pub fn to_parameters(&self) -> VHACDParameters {
        let mut params = VHACDParameters::default();
        if let Some(v) = self.resolution {
            params.resolution = v;
        }
        if let Some(v) = self.concavity {
            params.concavity = v;
        }
        if let Some(v) = self.alpha {
            params.alpha = v;
        }
        if let Some(v) = self.beta {
            params.beta = v;
        }
        if let Some(v) = self.plane_downsampling {
            params.plane_downsampling = v;
        }
        if let Some(v) = self.convex_hull_downsampling {
            params.convex_hull_downsampling = v;
        }
        if let Some(v) = self.max_convex_hulls {
            params.max_convex_hulls = v;
        }
        if let Some(v) = self.convex_hull_approximation {
            params.convex_hull_approximation = v;
        }
        params
    }

    /// Command-line flags in the `testVHACD` naming scheme
    pub fn command_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |flag: &str, value: String| {
            args.push(format!("--{}", flag));
            args.push(value);
        };

        if let Some(v) = self.resolution {
            push("resolution", v.to_string());
        }
        if let Some(v) = self.concavity {
            push("concavity", v.to_string());
        }
        if let Some(v) = self.alpha {
            push("alpha", v.to_string());
        }
        if let Some(v) = self.beta {
            push("beta", v.to_string());
        }
        if let Some(v) = self.plane_downsampling {
            push("planeDownsampling", v.to_string());
        }
        if let Some(v) = self.convex_hull_downsampling {
            push("convexhullDownsampling", v.to_string());
        }
        if let Some(v) = self.convex_hull_approximation {
            push("convexhullApproximation", u8::from(v).to_string());
        }
        for (key, value) in &self.extra {
            push(key.as_str(), value.clone());
        }
        args
    }
}

/// A convex-decomposition backend
pub trait ConvexDecomposer {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Decompose the OBJ at `input` into convex hulls written to `output`,
    /// recording progress in `log`
    fn decompose(
        &self,
        input: &Path,
        output: &Path,
        log: &Path,
        options: &VhacdOptions,
    ) -> Result<(), DecomposeError>;
}

/// In-process VHACD backed by `parry3d`
#[derive(Debug, Clone, Copy, Default)]
pub struct VhacdDecomposer;

impl ConvexDecomposer for VhacdDecomposer {
    fn name(&self) -> &str {
        "vhacd"
    }

    fn decompose(
        &self,
        input: &Path,
        output: &Path,
        log: &Path,
        options: &VhacdOptions,
    ) -> Result<(), DecomposeError> {
        let mesh = load_mesh(input).map_err(|e| DecomposeError::Input(e.to_string()))?;
        let params = options.to_parameters();

        let points: Vec<Point<f32>> = mesh
            .vertices
            .iter()
            .map(|v| Point::new(v[0], v[1], v[2]))
            .collect();
        let triangles: Vec<[u32; 3]> = mesh
            .indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();

        let decomposition = VHACD::decompose(&params, &points, &triangles, false);
        let hulls: Vec<TriMesh> = decomposition
            .compute_convex_hulls(params.convex_hull_downsampling)
            .into_iter()
            .enumerate()
            .map(|(i, (vertices, indices))| {
                TriMesh::new(
                    format!("hull_{}", i),
                    vertices.iter().map(|p| [p.x, p.y, p.z]).collect(),
                    indices.into_iter().flatten().collect(),
                )
            })
            .collect();

        if hulls.is_empty() {
            return Err(DecomposeError::NoHulls(input.display().to_string()));
        }

        write_obj_objects(&hulls, output).map_err(|e| DecomposeError::Output(e.to_string()))?;

        let mut report = String::new();
        let _ = writeln!(report, "V-HACD ({})", self.name());
        let _ = writeln!(report, "\t input                    {}", input.display());
        let _ = writeln!(report, "\t resolution               {}", params.resolution);
        let _ = writeln!(report, "\t concavity                {}", params.concavity);
        let _ = writeln!(report, "\t alpha                    {}", params.alpha);
        let _ = writeln!(report, "\t beta                     {}", params.beta);
        let _ = writeln!(report, "\t planeDownsampling        {}", params.plane_downsampling);
        let _ = writeln!(report, "\t convexhullDownsampling   {}", params.convex_hull_downsampling);
        let _ = writeln!(report, "\t convexhullApproximation  {}", params.convex_hull_approximation);
        let _ = writeln!(report, "\t maxConvexHulls           {}", params.max_convex_hulls);
        let _ = writeln!(report, "\t output                   {}", output.display());
        let _ = writeln!(report, "\t hulls                    {}", hulls.len());
        for hull in &hulls {
            let _ = writeln!(
                report,
                "\t {}: {} vertices, {} triangles",
                hull.name,
                hull.vertices.len(),
                hull.triangle_count()
            );
        }
        std::fs::write(log, report)
            .map_err(|e| DecomposeError::Log(format!("{}: {}", log.display(), e)))?;

        tracing::debug!("Decomposed {} into {} hulls", input.display(), hulls.len());
        Ok(())
    }
}

/// External VHACD executable (`testVHACD`-compatible command line)
#[derive(Debug, Clone)]
pub struct CommandDecomposer {
    program: PathBuf,
}

impl Default for CommandDecomposer {
    fn default() -> Self {
        Self::new(DEFAULT_VHACD_COMMAND)
    }
}

impl CommandDecomposer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument list for one invocation
    pub fn arguments(
        &self,
        input: &Path,
        output: &Path,
        log: &Path,
        options: &VhacdOptions,
    ) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            input.display().to_string(),
            "--output".to_string(),
            output.display().to_string(),
            "--log".to_string(),
            log.display().to_string(),
        ];
        args.extend(options.command_args());
        args
    }
}

impl ConvexDecomposer for CommandDecomposer {
    fn name(&self) -> &str {
        "command"
    }

    fn decompose(
        &self,
        input: &Path,
        output: &Path,
        log: &Path,
        options: &VhacdOptions,
    ) -> Result<(), DecomposeError> {
        let args = self.arguments(input, output, log, options);
        tracing::debug!("Running {} {}", self.program.display(), args.join(" "));

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| DecomposeError::Spawn {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(DecomposeError::Failed {
                program: self.program.display().to_string(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.exists() {
            return Err(DecomposeError::Output(format!(
                "{} did not produce {}",
                self.program.display(),
                output.display()
            )));
        }
        Ok(())
    }
}

/// Path of the decomposed collision mesh (`dir/part.obj` -> `dir/part_vhacd.obj`)
pub fn decomposed_path(obj_path: &Path) -> PathBuf {
    let stem = obj_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    obj_path.with_file_name(format!("{}_{}.obj", stem, DECOMPOSED_SUFFIX))
}

/// Run `decomposer` unless `output` already exists and `force` is false.
///
/// Returns whether the backend was invoked.
pub fn decompose_if_needed(
    decomposer: &dyn ConvexDecomposer,
    input: &Path,
    output: &Path,
    log: &Path,
    options: &VhacdOptions,
    force: bool,
) -> Result<bool, DecomposeError> {
    if output.exists() && !force {
        tracing::debug!("Keeping existing decomposition {}", output.display());
        return Ok(false);
    }

    decomposer.decompose(input, output, log, options)?;
    Ok(true)
}

/// Decomposition-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecomposeError {
    #[error("Failed to load decomposition input: {0}")]
    Input(String),
    #[error("Failed to write decomposition output: {0}")]
    Output(String),
    #[error("Failed to write decomposition log: {0}")]
    Log(String),
    #[error("Decomposition produced no convex hulls for {0}")]
    NoHulls(String),
    #[error("Failed to run '{program}': {reason}")]
    Spawn { program: String, reason: String },
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_support::write_box_obj;
    use std::cell::Cell;
    use tempfile::tempdir;

    struct CountingDecomposer {
        calls: Cell<usize>,
    }

    impl ConvexDecomposer for CountingDecomposer {
        fn name(&self) -> &str {
            "counting"
        }

        fn decompose(
            &self,
            _input: &Path,
            output: &Path,
            _log: &Path,
            _options: &VhacdOptions,
        ) -> Result<(), DecomposeError> {
            self.calls.set(self.calls.get() + 1);
            std::fs::write(output, "o hull_0\n").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_decomposed_path() {
        assert_eq!(
            decomposed_path(Path::new("/lib/mug/mug.obj")),
            PathBuf::from("/lib/mug/mug_vhacd.obj")
        );
    }

    #[test]
    fn test_skip_existing_output() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("part.obj");
        let output = temp.path().join("part_vhacd.obj");
        let log = temp.path().join("log.txt");
        let backend = CountingDecomposer { calls: Cell::new(0) };
        let options = VhacdOptions::default();

        assert!(decompose_if_needed(&backend, &input, &output, &log, &options, false).unwrap());
        assert!(!decompose_if_needed(&backend, &input, &output, &log, &options, false).unwrap());
        assert_eq!(backend.calls.get(), 1);

        assert!(decompose_if_needed(&backend, &input, &output, &log, &options, true).unwrap());
        assert_eq!(backend.calls.get(), 2);
    }

    #[test]
    fn test_options_override_defaults() {
        let options = VhacdOptions {
            resolution: Some(1000),
            max_convex_hulls: Some(4),
            ..Default::default()
        };
        let params = options.to_parameters();
        let defaults = VHACDParameters::default();
        assert_eq!(params.resolution, 1000);
        assert_eq!(params.max_convex_hulls, 4);
        assert_eq!(params.concavity, defaults.concavity);
    }

    #[test]
    fn test_command_arguments() {
        let mut options = VhacdOptions {
            concavity: Some(0.0025),
            convex_hull_approximation: Some(true),
            ..Default::default()
        };
        options.extra.insert("pca".to_string(), "1".to_string());

        let backend = CommandDecomposer::new("testVHACD");
        let args = backend.arguments(
            Path::new("in.obj"),
            Path::new("out.obj"),
            Path::new("log.txt"),
            &options,
        );
        assert_eq!(
            args,
            vec![
                "--input",
                "in.obj",
                "--output",
                "out.obj",
                "--log",
                "log.txt",
                "--concavity",
                "0.0025",
                "--convexhullApproximation",
                "1",
                "--pca",
                "1",
            ]
        );
    }

    #[test]
    fn test_missing_command_is_reported() {
        let temp = tempdir().unwrap();
        let backend = CommandDecomposer::new(temp.path().join("no-such-vhacd"));
        let result = backend.decompose(
            &temp.path().join("in.obj"),
            &temp.path().join("out.obj"),
            &temp.path().join("log.txt"),
            &VhacdOptions::default(),
        );
        assert!(matches!(result, Err(DecomposeError::Spawn { .. })));
    }

    #[test]
    fn test_vhacd_box_produces_hulls_and_log() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("box.obj");
        let output = temp.path().join("box_vhacd.obj");
        let log = temp.path().join("vhacd_log.txt");
        write_box_obj(&input, [0.0; 3], [1.0; 3]);

        let options = VhacdOptions {
            resolution: Some(16),
            max_convex_hulls: Some(2),
            ..Default::default()
        };
        VhacdDecomposer.decompose(&input, &output, &log, &options).unwrap();

        let hulls = std::fs::read_to_string(&output).unwrap();
        assert!(hulls.contains("o hull_0"));
        let report = std::fs::read_to_string(&log).unwrap();
        assert!(report.contains("hulls"));
    }
}
