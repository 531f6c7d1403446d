//! STL file loading

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

use crate::constants::STL_VERTEX_PRECISION;

use super::{MeshError, TriMesh};

/// Load an STL file (ASCII or binary) as an indexed mesh
pub fn load_stl(path: impl AsRef<Path>) -> Result<TriMesh, MeshError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| MeshError::Io(format!("{}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let mesh = stl_io::read_stl(&mut reader)
        .map_err(|e| MeshError::Parse(format!("{}: {}", path.display(), e)))?;

    let (vertices, indices) = weld_vertices(&mesh);

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    Ok(TriMesh::new(name, vertices, indices))
}

/// Merge coincident STL vertices into a shared, indexed vertex list
fn weld_vertices(mesh: &stl_io::IndexedMesh) -> (Vec<[f32; 3]>, Vec<u32>) {
    let mut unique_vertices: Vec<[f32; 3]> = Vec::new();
    let mut vertex_map: HashMap<[i32; 3], u32> = HashMap::new();
    let mut indices: Vec<u32> = Vec::with_capacity(mesh.faces.len() * 3);

    for face in &mesh.faces {
        for &vertex_idx in &face.vertices {
            let vertex = mesh.vertices[vertex_idx];
            let v = [vertex[0], vertex[1], vertex[2]];

            // Quantize for comparison
            let key = [
                (v[0] * STL_VERTEX_PRECISION).round() as i32,
                (v[1] * STL_VERTEX_PRECISION).round() as i32,
                (v[2] * STL_VERTEX_PRECISION).round() as i32,
            ];

            let index = *vertex_map.entry(key).or_insert_with(|| {
                unique_vertices.push(v);
                (unique_vertices.len() - 1) as u32
            });

            indices.push(index);
        }
    }

    (unique_vertices, indices)
}
