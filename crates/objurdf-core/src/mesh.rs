//! Mesh file loading (OBJ, STL formats)

pub mod obj;
pub mod stl;

use std::path::{Path, PathBuf};

pub use obj::{load_obj, write_obj, write_obj_objects};
pub use stl::load_stl;

/// Indexed triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    /// Object name (file stem, or hull name for decomposed parts)
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    /// Triangle list, three indices per face
    pub indices: Vec<u32>,
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
}

impl TriMesh {
    /// Create a mesh and compute its bounding box
    pub fn new(name: impl Into<String>, vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let mut mesh = Self {
            name: name.into(),
            vertices,
            indices,
            bbox_min: [0.0; 3],
            bbox_max: [0.0; 3],
        };
        mesh.calculate_bounding_box();
        mesh
    }

    /// Recompute the axis-aligned bounding box from the vertices
    pub fn calculate_bounding_box(&mut self) {
        if self.vertices.is_empty() {
            self.bbox_min = [0.0; 3];
            self.bbox_max = [0.0; 3];
            return;
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v[i]);
                max[i] = max[i].max(v[i]);
            }
        }
        self.bbox_min = min;
        self.bbox_max = max;
    }

    /// Number of complete triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    /// Iterate over triangle corner positions
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.vertices[t[0] as usize],
                self.vertices[t[1] as usize],
                self.vertices[t[2] as usize],
            ]
        })
    }

    /// Check that every index refers to an existing vertex
    pub fn validate(&self) -> Result<(), MeshError> {
        let count = self.vertices.len();
        match self.indices.iter().find(|&&i| i as usize >= count) {
            Some(&bad) => Err(MeshError::Parse(format!(
                "index {} out of range ({} vertices)",
                bad, count
            ))),
            None => Ok(()),
        }
    }
}

/// Mesh format, resolved once per file from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Stl,
    Unsupported,
}

impl MeshFormat {
    /// Detect format from file path (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("obj") => MeshFormat::Obj,
            Some("stl") => MeshFormat::Stl,
            _ => MeshFormat::Unsupported,
        }
    }

    /// Check if the format can be loaded
    pub fn is_supported(&self) -> bool {
        !matches!(self, MeshFormat::Unsupported)
    }

    /// Get format name
    pub fn name(&self) -> &'static str {
        match self {
            MeshFormat::Obj => "OBJ",
            MeshFormat::Stl => "STL",
            MeshFormat::Unsupported => "Unsupported",
        }
    }
}

/// Load any supported mesh format
pub fn load_mesh(path: impl AsRef<Path>) -> Result<TriMesh, MeshError> {
    let path = path.as_ref();

    let mesh = match MeshFormat::from_path(path) {
        MeshFormat::Obj => load_obj(path)?,
        MeshFormat::Stl => load_stl(path)?,
        MeshFormat::Unsupported => {
            return Err(MeshError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            ));
        }
    };

    mesh.validate()?;
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    Ok(mesh)
}

/// Convert a mesh to OBJ next to the source file (`part.stl` -> `part.obj`).
///
/// Returns the path of the written OBJ. An existing file with that name is
/// replaced.
pub fn convert_to_obj(path: impl AsRef<Path>) -> Result<PathBuf, MeshError> {
    let path = path.as_ref();
    let mesh = load_mesh(path)?;
    let obj_path = path.with_extension("obj");
    write_obj(&mesh, &obj_path)?;
    tracing::debug!("Converted {} to {}", path.display(), obj_path.display());
    Ok(obj_path)
}

/// Mesh-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Write error: {0}")]
    Write(String),
    #[error("Empty mesh: no geometry found")]
    EmptyMesh,
    #[error("Degenerate mesh: enclosed volume is {0}")]
    Degenerate(f64),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::TriMesh;

    /// Closed box with outward-facing triangles
    pub fn box_mesh(min: [f32; 3], max: [f32; 3]) -> TriMesh {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        let vertices = vec![
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, // bottom
            4, 5, 6, 4, 6, 7, // top
            0, 1, 5, 0, 5, 4, // front
            3, 7, 6, 3, 6, 2, // back
            0, 4, 7, 0, 7, 3, // left
            1, 2, 6, 1, 6, 5, // right
        ];
        TriMesh::new("box", vertices, indices)
    }

    /// Write a closed box as a binary STL
    pub fn write_box_stl(path: &std::path::Path, min: [f32; 3], max: [f32; 3]) {
        let mesh = box_mesh(min, max);
        let triangles: Vec<stl_io::Triangle> = mesh
            .triangles()
            .map(|[a, b, c]| stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
                vertices: [
                    stl_io::Vertex::new(a),
                    stl_io::Vertex::new(b),
                    stl_io::Vertex::new(c),
                ],
            })
            .collect();
        let mut file = std::fs::File::create(path).unwrap();
        stl_io::write_stl(&mut file, triangles.iter()).unwrap();
    }

    /// Write a closed box as an OBJ
    pub fn write_box_obj(path: &std::path::Path, min: [f32; 3], max: [f32; 3]) {
        super::write_obj(&box_mesh(min, max), path).unwrap();
    }
}
