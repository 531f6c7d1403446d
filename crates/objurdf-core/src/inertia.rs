//! Mass properties and reference centers of meshes

use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::constants::MIN_MESH_VOLUME;
use crate::mesh::{MeshError, TriMesh, load_mesh};

/// Which point of the mesh is moved to the link origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CenterMode {
    /// Leave origins untouched
    None,
    /// Volumetric center of mass
    #[default]
    Mass,
    /// Center of the bounding box
    Geometry,
    /// Bounding-box center in x/y, top face in z
    Top,
    /// Bounding-box center in x/y, bottom face in z
    Bottom,
}

impl CenterMode {
    pub const ALL: &'static [CenterMode] = &[
        CenterMode::None,
        CenterMode::Mass,
        CenterMode::Geometry,
        CenterMode::Top,
        CenterMode::Bottom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CenterMode::None => "none",
            CenterMode::Mass => "mass",
            CenterMode::Geometry => "geometry",
            CenterMode::Top => "top",
            CenterMode::Bottom => "bottom",
        }
    }

    /// Whether this mode needs the mesh to be loaded
    pub fn requires_mesh(&self) -> bool {
        !matches!(self, CenterMode::None)
    }

    /// Reference point for a loaded mesh, `None` for [`CenterMode::None`]
    pub fn reference_point(&self, mesh: &TriMesh) -> Result<Option<DVec3>, MeshError> {
        let min = DVec3::from(mesh.bbox_min.map(f64::from));
        let max = DVec3::from(mesh.bbox_max.map(f64::from));
        let middle = (min + max) * 0.5;

        let point = match self {
            CenterMode::None => return Ok(None),
            CenterMode::Mass => center_of_mass(mesh)?,
            CenterMode::Geometry => middle,
            CenterMode::Top => DVec3::new(middle.x, middle.y, max.z),
            CenterMode::Bottom => DVec3::new(middle.x, middle.y, min.z),
        };
        Ok(Some(point))
    }

    /// Load `path` if needed and compute the reference point
    pub fn reference_point_for(&self, path: impl AsRef<Path>) -> Result<Option<DVec3>, MeshError> {
        if !self.requires_mesh() {
            return Ok(None);
        }
        let mesh = load_mesh(path)?;
        self.reference_point(&mesh)
    }
}

impl std::str::FromStr for CenterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CenterMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown center mode '{}'", s))
    }
}

/// Calculate volume of a mesh using signed tetrahedron method
pub fn calculate_mesh_volume(mesh: &TriMesh) -> f64 {
    mesh.triangles()
        .map(|[a, b, c]| signed_tetrahedron_volume(to_dvec(a), to_dvec(b), to_dvec(c)))
        .sum::<f64>()
        .abs()
}

/// Volume-weighted centroid of a closed mesh.
///
/// Each triangle spans a tetrahedron with the origin; the center of mass is the
/// average of the tetrahedron centroids weighted by their signed volumes.
pub fn center_of_mass(mesh: &TriMesh) -> Result<DVec3, MeshError> {
    if mesh.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    let mut volume = 0.0;
    let mut weighted = DVec3::ZERO;
    for [a, b, c] in mesh.triangles() {
        let (a, b, c) = (to_dvec(a), to_dvec(b), to_dvec(c));
        let v = signed_tetrahedron_volume(a, b, c);
        volume += v;
        weighted += v * (a + b + c) / 4.0;
    }

    if volume.abs() < MIN_MESH_VOLUME {
        return Err(MeshError::Degenerate(volume));
    }

    Ok(weighted / volume)
}

/// Load a mesh file and compute its center of mass
pub fn compute_center_of_mass(path: impl AsRef<Path>) -> Result<DVec3, MeshError> {
    let mesh = load_mesh(path)?;
    center_of_mass(&mesh)
}

fn signed_tetrahedron_volume(v0: DVec3, v1: DVec3, v2: DVec3) -> f64 {
    // V = (1/6) * v0 . (v1 x v2)
    v0.dot(v1.cross(v2)) / 6.0
}

fn to_dvec(v: [f32; 3]) -> DVec3 {
    DVec3::new(v[0] as f64, v[1] as f64, v[2] as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_support::{box_mesh, write_box_obj};
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_cube_volume() {
        let cube = box_mesh([0.0; 3], [1.0; 3]);
        assert_relative_eq!(calculate_mesh_volume(&cube), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_center_of_mass_offset_box() {
        let mesh = box_mesh([1.0, -2.0, 0.0], [3.0, 2.0, 1.0]);
        let com = center_of_mass(&mesh).unwrap();
        assert_relative_eq!(com.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(com.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(com.z, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_center_of_mass_independent_of_winding() {
        let mut mesh = box_mesh([0.0; 3], [2.0; 3]);
        for t in mesh.indices.chunks_exact_mut(3) {
            t.swap(1, 2);
        }
        let com = center_of_mass(&mesh).unwrap();
        assert_relative_eq!(com.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(com.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_mesh_is_degenerate() {
        let mesh = TriMesh::new(
            "flat",
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2, 0, 2, 1],
        );
        assert!(matches!(center_of_mass(&mesh), Err(MeshError::Degenerate(_))));
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = TriMesh::new("empty", Vec::new(), Vec::new());
        assert!(matches!(center_of_mass(&mesh), Err(MeshError::EmptyMesh)));
    }

    #[test]
    fn test_reference_points() {
        let mesh = box_mesh([0.0, 0.0, -1.0], [2.0, 4.0, 3.0]);
        assert_eq!(CenterMode::None.reference_point(&mesh).unwrap(), None);
        assert_eq!(
            CenterMode::Geometry.reference_point(&mesh).unwrap(),
            Some(DVec3::new(1.0, 2.0, 1.0))
        );
        assert_eq!(
            CenterMode::Top.reference_point(&mesh).unwrap(),
            Some(DVec3::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            CenterMode::Bottom.reference_point(&mesh).unwrap(),
            Some(DVec3::new(1.0, 2.0, -1.0))
        );
    }

    #[test]
    fn test_compute_center_of_mass_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("box.obj");
        write_box_obj(&path, [0.0; 3], [1.0, 1.0, 2.0]);

        let com = compute_center_of_mass(&path).unwrap();
        assert_relative_eq!(com.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_none_mode_skips_loading() {
        let result = CenterMode::None.reference_point_for("/nonexistent/part.obj");
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_center_mode_from_str() {
        assert_eq!("Mass".parse::<CenterMode>().unwrap(), CenterMode::Mass);
        assert_eq!("bottom".parse::<CenterMode>().unwrap(), CenterMode::Bottom);
        assert!("middle".parse::<CenterMode>().is_err());
    }
}
