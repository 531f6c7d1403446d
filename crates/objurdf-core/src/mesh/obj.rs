//! OBJ mesh file loading and writing

use std::fmt::Write as _;
use std::path::Path;

use super::{MeshError, TriMesh};

/// Load an OBJ file, merging all of its objects into one mesh
pub fn load_obj(path: impl AsRef<Path>) -> Result<TriMesh, MeshError> {
    let path = path.as_ref();

    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| match e {
        tobj::LoadError::OpenFileFailed => MeshError::Io(format!("{}: {}", path.display(), e)),
        _ => MeshError::Parse(format!("{}: {}", path.display(), e)),
    })?;

    if models.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    // Combine all meshes into one
    let mut all_vertices: Vec<[f32; 3]> = Vec::new();
    let mut all_indices: Vec<u32> = Vec::new();

    for model in &models {
        let mesh = &model.mesh;
        let vertex_offset = all_vertices.len() as u32;

        for chunk in mesh.positions.chunks_exact(3) {
            all_vertices.push([chunk[0], chunk[1], chunk[2]]);
        }

        for &idx in &mesh.indices {
            all_indices.push(vertex_offset + idx);
        }
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    Ok(TriMesh::new(name, all_vertices, all_indices))
}

/// Write a single mesh as an OBJ file
pub fn write_obj(mesh: &TriMesh, path: impl AsRef<Path>) -> Result<(), MeshError> {
    write_obj_objects(std::slice::from_ref(mesh), path)
}

/// Write several meshes into one OBJ file, one `o <name>` block per mesh.
///
/// Face indices are 1-based and continue across objects.
pub fn write_obj_objects(meshes: &[TriMesh], path: impl AsRef<Path>) -> Result<(), MeshError> {
    let path = path.as_ref();
    let mut out = String::new();
    let mut vertex_offset = 1usize;

    for mesh in meshes {
        let _ = writeln!(out, "o {}", mesh.name);
        for v in &mesh.vertices {
            let _ = writeln!(out, "v {} {} {}", v[0], v[1], v[2]);
        }
        for t in mesh.indices.chunks_exact(3) {
            let _ = writeln!(
                out,
                "f {} {} {}",
                t[0] as usize + vertex_offset,
                t[1] as usize + vertex_offset,
                t[2] as usize + vertex_offset
            );
        }
        vertex_offset += mesh.vertices.len();
    }

    std::fs::write(path, out).map_err(|e| MeshError::Write(format!("{}: {}", path.display(), e)))
}
