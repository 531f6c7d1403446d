//! URDF generation for a library of mesh objects
//!
//! An [`ObjectUrdfBuilder`] owns a parsed prototype URDF. Every mesh gets a
//! fresh clone of that prototype with its mesh filenames, robot name,
//! overrides and recentered origins filled in.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::constants::{DECOMPOSED_SUFFIX, DEFAULT_LOG_FILE, DEFAULT_PROTOTYPE, URDF_EXTENSION};
use crate::decompose::{
    ConvexDecomposer, DecomposeError, VhacdDecomposer, VhacdOptions, decompose_if_needed,
    decomposed_path,
};
use crate::geometry::{GeometryError, apply_center};
use crate::inertia::CenterMode;
use crate::mesh::{MeshError, MeshFormat, convert_to_obj};
use crate::overrides::{apply_overrides, load_overrides, override_path};
use crate::scan::{ScanError, scan_meshes};
use crate::xml::{Element, XmlError};

/// Options for a single build or a library build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Where URDFs are written; mesh paths are made relative to it.
    /// Defaults to the builder's object folder.
    pub output_folder: Option<PathBuf>,
    /// Replace URDFs that already exist
    pub force_overwrite: bool,
    /// Generate a convex decomposition for the collision geometry
    pub decompose_concave: bool,
    /// Re-run decomposition even if the decomposed mesh exists
    pub force_decompose: bool,
    /// Point of the mesh moved to the link origin
    pub center: CenterMode,
    /// Options handed to the decomposition backend
    pub vhacd: VhacdOptions,
}

/// Result of building one URDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The file was (re)written
    Written(PathBuf),
    /// The file already existed and overwriting was not requested
    Skipped(PathBuf),
}

impl BuildOutcome {
    pub fn path(&self) -> &Path {
        match self {
            BuildOutcome::Written(path) | BuildOutcome::Skipped(path) => path,
        }
    }

    pub fn was_written(&self) -> bool {
        matches!(self, BuildOutcome::Written(_))
    }
}

/// Summary of a library build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

impl LibraryReport {
    fn record(&mut self, outcome: BuildOutcome) {
        match outcome {
            BuildOutcome::Written(path) => self.written.push(path),
            BuildOutcome::Skipped(path) => self.skipped.push(path),
        }
    }

    /// Number of meshes processed
    pub fn total(&self) -> usize {
        self.written.len() + self.skipped.len()
    }
}

/// Builds URDFs for mesh objects from a prototype template
pub struct ObjectUrdfBuilder {
    object_folder: PathBuf,
    log_file: PathBuf,
    template: Element,
    decomposer: Box<dyn ConvexDecomposer>,
}

impl ObjectUrdfBuilder {
    /// Load the prototype `object_folder/prototype`.
    ///
    /// `object_folder` and `log_file` are made absolute against the current
    /// directory. Decomposition defaults to the in-process VHACD backend.
    pub fn new(
        object_folder: impl AsRef<Path>,
        log_file: impl AsRef<Path>,
        prototype: impl AsRef<Path>,
    ) -> Result<Self, BuildError> {
        let object_folder = absolute(object_folder.as_ref())?;
        let log_file = absolute(log_file.as_ref())?;
        let template =
            Element::read_file(object_folder.join(prototype)).map_err(BuildError::Template)?;

        Ok(Self {
            object_folder,
            log_file,
            template,
            decomposer: Box::new(VhacdDecomposer),
        })
    }

    /// Builder with the default prototype and log file names
    pub fn open(object_folder: impl AsRef<Path>) -> Result<Self, BuildError> {
        Self::new(object_folder, DEFAULT_LOG_FILE, DEFAULT_PROTOTYPE)
    }

    /// Replace the decomposition backend
    pub fn with_decomposer(mut self, decomposer: Box<dyn ConvexDecomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn object_folder(&self) -> &Path {
        &self.object_folder
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// The parsed prototype; never modified by builds
    pub fn template(&self) -> &Element {
        &self.template
    }

    pub fn decomposer(&self) -> &dyn ConvexDecomposer {
        self.decomposer.as_ref()
    }

    /// Build the URDF for one mesh file
    pub fn build_urdf(
        &self,
        mesh_path: impl AsRef<Path>,
        options: &BuildOptions,
    ) -> Result<BuildOutcome, BuildError> {
        let mesh_path = absolute(mesh_path.as_ref())?;
        let output_folder = match &options.output_folder {
            Some(folder) => absolute(folder)?,
            None => self.object_folder.clone(),
        };

        let relative = relative_path(&output_folder, &mesh_path)?;
        let name = object_name(&relative);

        let overrides = load_overrides(&mesh_path).map_err(|e| BuildError::Override {
            path: override_path(&mesh_path).display().to_string(),
            reason: e.to_string(),
        })?;

        let format = MeshFormat::from_path(&mesh_path);
        if options.decompose_concave && !format.is_supported() {
            return Err(BuildError::UnsupportedFileType(mesh_path.display().to_string()));
        }

        let center = options.center.reference_point_for(&mesh_path)?;

        let (visual_file, collision_file) = if options.decompose_concave {
            let obj_path = match format {
                MeshFormat::Obj => mesh_path.clone(),
                MeshFormat::Stl => convert_to_obj(&mesh_path)?,
                MeshFormat::Unsupported => {
                    return Err(BuildError::UnsupportedFileType(
                        mesh_path.display().to_string(),
                    ));
                }
            };

            decompose_if_needed(
                self.decomposer.as_ref(),
                &obj_path,
                &decomposed_path(&obj_path),
                &self.log_file,
                &options.vhacd,
                options.force_decompose,
            )?;

            let visual = match format {
                MeshFormat::Stl => relative.with_extension("obj"),
                _ => relative.clone(),
            };
            let collision = decomposed_path(&visual);
            (to_uri(&visual), Some(to_uri(&collision)))
        } else {
            (to_uri(&relative), None)
        };

        let urdf = self.update_urdf(
            &visual_file,
            &name,
            collision_file.as_deref(),
            overrides.as_ref(),
            center,
        )?;

        let out_file = output_folder.join(format!("{}.{}", name, URDF_EXTENSION));
        self.save_urdf(&urdf, out_file, options.force_overwrite)
    }

    /// Produce a patched copy of the prototype.
    ///
    /// `collision_file` falls back to `visual_file`. Missing mesh or origin
    /// elements are created in the copy.
    pub fn update_urdf(
        &self,
        visual_file: &str,
        object_name: &str,
        collision_file: Option<&str>,
        overrides: Option<&Element>,
        center: Option<DVec3>,
    ) -> Result<Element, BuildError> {
        let collision_file = collision_file.unwrap_or(visual_file);

        let mut urdf = self.template.clone();
        urdf.set_attribute(".//visual/geometry/mesh", "filename", visual_file);
        urdf.set_attribute(".//collision/geometry/mesh", "filename", collision_file);
        urdf.set_attr("name", object_name);

        if let Some(overrides) = overrides {
            apply_overrides(&mut urdf, overrides);
        }

        if let Some(center) = center {
            apply_center(&mut urdf, center)?;
        }

        Ok(urdf)
    }

    /// Write a URDF unless it exists and `overwrite` is false
    pub fn save_urdf(
        &self,
        urdf: &Element,
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<BuildOutcome, BuildError> {
        let path = path.as_ref();

        if path.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", path.display());
            return Ok(BuildOutcome::Skipped(path.to_path_buf()));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BuildError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let xml = urdf.to_xml_string()?;
        std::fs::write(path, xml).map_err(|e| BuildError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(BuildOutcome::Written(path.to_path_buf()))
    }

    /// Build URDFs for every mesh under the object folder.
    ///
    /// OBJ files are built first. STL files are only built when their
    /// directory contained no OBJ, so a folder holding both `part.obj` and
    /// `part.stl` yields a single OBJ-based URDF. Decomposed meshes
    /// (`*_vhacd.obj`) are never treated as objects.
    pub fn build_library(&self, options: &BuildOptions) -> Result<LibraryReport, BuildError> {
        tracing::info!("FOLDER: {}", self.object_folder.display());

        let mut report = LibraryReport::default();
        let mut obj_folders: HashSet<PathBuf> = HashSet::new();

        for entry in scan_meshes(&self.object_folder, ".obj", Some(DECOMPOSED_SUFFIX)) {
            let entry = entry?;
            obj_folders.insert(entry.directory.clone());
            tracing::info!("Building: {}", self.display_relative(&entry.path));
            report.record(self.build_urdf(&entry.path, options)?);
        }

        for entry in scan_meshes(&self.object_folder, ".stl", Some(DECOMPOSED_SUFFIX)) {
            let entry = entry?;
            if obj_folders.contains(&entry.directory) {
                tracing::debug!("Skipping {}: folder has an OBJ", entry.path.display());
                continue;
            }
            tracing::info!("Building: {}", self.display_relative(&entry.path));
            report.record(self.build_urdf(&entry.path, options)?);
        }

        tracing::info!(
            "Library done: {} written, {} kept",
            report.written.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.object_folder)
            .map(to_uri)
            .unwrap_or_else(|_| path.display().to_string())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(path).map_err(|e| BuildError::Io(format!("{}: {}", path.display(), e)))
}

/// Mesh path relative to the output root
fn relative_path(root: &Path, mesh: &Path) -> Result<PathBuf, BuildError> {
    mesh.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| BuildError::OutsideRoot {
            mesh: mesh.display().to_string(),
            root: root.display().to_string(),
        })
}

/// First path segment (the object's folder), or the file stem for meshes
/// placed directly in the root
fn object_name(relative: &Path) -> String {
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Relative path with `/` separators, as URDF mesh filenames expect
fn to_uri(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to load URDF template: {0}")]
    Template(XmlError),
    #[error("Failed to read override file '{path}': {reason}")]
    Override { path: String, reason: String },
    #[error("Your filetype needs to be an STL or OBJ to perform concave decomposition: {0}")]
    UnsupportedFileType(String),
    #[error("Mesh '{mesh}' is not inside the output folder '{root}'")]
    OutsideRoot { mesh: String, root: String },
    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),
    #[error("Decomposition error: {0}")]
    Decompose(#[from] DecomposeError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),
    #[error("IO error: {0}")]
    Io(String),
}
