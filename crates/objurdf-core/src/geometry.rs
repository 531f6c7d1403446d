//! Origin and scale handling for URDF geometry
//!
//! URDF stores vectors as space-separated strings (`xyz="0 0 0.1"`). This
//! module converts those strings to and from `glam` vectors and computes the
//! recentered origin written back into the visual and collision elements.

use glam::{DMat3, DVec3};

use crate::xml::Element;

/// Parse a space-separated 3-vector (`"0 0 1"`)
pub fn parse_vec3(s: &str) -> Result<DVec3, GeometryError> {
    let parts: Vec<f64> = s
        .split_whitespace()
        .map(|p| p.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| GeometryError::InvalidVector(s.to_string()))?;

    match parts.as_slice() {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => Err(GeometryError::InvalidVector(s.to_string())),
    }
}

/// Format a 3-vector as a space-separated string
pub fn format_vec3(v: DVec3) -> String {
    format!("{} {} {}", clean(v.x), clean(v.y), clean(v.z))
}

// Avoids writing "-0" for negative zero
fn clean(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

/// Rotation matrix for URDF roll/pitch/yaw angles.
///
/// Rotations are about the fixed X, then Y, then Z axes, i.e.
/// `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rpy_to_matrix(rpy: DVec3) -> DMat3 {
    DMat3::from_rotation_z(rpy.z) * DMat3::from_rotation_y(rpy.y) * DMat3::from_rotation_x(rpy.x)
}

/// Existing collision geometry frame read from a URDF
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginFrame {
    /// Collision origin offset
    pub offset: DVec3,
    /// Collision origin rotation (roll, pitch, yaw)
    pub rpy: DVec3,
    /// Collision mesh scale
    pub scale: DVec3,
}

impl Default for OriginFrame {
    fn default() -> Self {
        Self {
            offset: DVec3::ZERO,
            rpy: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }
}

impl OriginFrame {
    /// Read `.//collision/origin` and `.//collision/geometry/mesh` from a URDF.
    ///
    /// Missing elements or attributes fall back to zero offset, zero rotation
    /// and unit scale.
    pub fn from_urdf(urdf: &Element) -> Result<Self, GeometryError> {
        let mut frame = Self::default();

        if let Some(origin) = urdf.find(".//collision/origin") {
            frame.offset = parse_vec3(origin.attr("xyz").unwrap_or("0 0 0"))?;
            frame.rpy = parse_vec3(origin.attr("rpy").unwrap_or("0 0 0"))?;
        }

        if let Some(mesh) = urdf.find(".//collision/geometry/mesh") {
            frame.scale = parse_vec3(mesh.attr("scale").unwrap_or("1 1 1"))?;
        }

        Ok(frame)
    }

    /// Origin that places `center` (in mesh coordinates) at the link origin.
    ///
    /// The center is negated and scaled, the existing offset is added, and the
    /// result is rotated by the existing rotation.
    pub fn recenter(&self, center: DVec3) -> DVec3 {
        let shifted = -center * self.scale + self.offset;
        rpy_to_matrix(self.rpy) * shifted
    }
}

/// Write a recentered origin onto both the visual and collision elements.
///
/// Any previous `xyz` is replaced, not composed; `rpy` is written back as-is.
/// Origins that don't exist yet are created.
pub fn apply_center(urdf: &mut Element, center: DVec3) -> Result<DVec3, GeometryError> {
    let frame = OriginFrame::from_urdf(urdf)?;
    let xyz = frame.recenter(center);

    let xyz_str = format_vec3(xyz);
    let rpy_str = format_vec3(frame.rpy);
    let attributes = [("xyz", xyz_str.as_str()), ("rpy", rpy_str.as_str())];
    urdf.set_attributes(".//visual/origin", &attributes);
    urdf.set_attributes(".//collision/origin", &attributes);

    Ok(xyz)
}

/// Geometry-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeometryError {
    #[error("Invalid vector: '{0}' (expected three numbers)")]
    InvalidVector(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_parse_vec3() {
        assert_eq!(parse_vec3("1 2.5 -3").unwrap(), DVec3::new(1.0, 2.5, -3.0));
        assert_eq!(parse_vec3("  0   0 1 ").unwrap(), DVec3::Z);
        assert!(parse_vec3("1 2").is_err());
        assert!(parse_vec3("1 2 x").is_err());
    }

    #[test]
    fn test_format_vec3() {
        assert_eq!(format_vec3(DVec3::new(0.0, -0.0, -1.0)), "0 0 -1");
        assert_eq!(format_vec3(DVec3::new(0.25, 1.5, 2.0)), "0.25 1.5 2");
    }

    #[test]
    fn test_rpy_yaw_quarter_turn() {
        let m = rpy_to_matrix(DVec3::new(0.0, 0.0, FRAC_PI_2));
        let v = m * DVec3::X;
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rpy_fixed_axis_order() {
        // roll then yaw about fixed axes: X -> X (roll) -> Y (yaw)
        // and Y -> Z (roll) -> Z (yaw)
        let m = rpy_to_matrix(DVec3::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        let y = m * DVec3::Y;
        assert_relative_eq!(y.z, 1.0, epsilon = 1e-12);
        let x = m * DVec3::X;
        assert_relative_eq!(x.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_recenter_identity_frame() {
        let frame = OriginFrame::default();
        assert_eq!(frame.recenter(DVec3::new(0.0, 0.0, 1.0)), DVec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_recenter_with_scale_and_offset() {
        let frame = OriginFrame {
            offset: DVec3::new(1.0, 0.0, 0.0),
            rpy: DVec3::ZERO,
            scale: DVec3::new(2.0, 2.0, 0.5),
        };
        let xyz = frame.recenter(DVec3::new(1.0, 1.0, 2.0));
        assert_eq!(xyz, DVec3::new(-1.0, -2.0, -1.0));
    }

    #[test]
    fn test_apply_center_writes_both_origins() {
        let mut urdf = Element::parse_str(
            r#"<robot><link>
                 <visual><geometry><mesh filename="a.obj"/></geometry></visual>
                 <collision><geometry><mesh filename="a.obj"/></geometry></collision>
               </link></robot>"#,
        )
        .unwrap();

        apply_center(&mut urdf, DVec3::new(0.0, 0.0, 1.0)).unwrap();

        for path in [".//visual/origin", ".//collision/origin"] {
            let origin = urdf.find(path).unwrap();
            assert_eq!(origin.attr("xyz"), Some("0 0 -1"));
            assert_eq!(origin.attr("rpy"), Some("0 0 0"));
        }
    }

    #[test]
    fn test_apply_center_keeps_rotation() {
        let mut urdf = Element::parse_str(
            r#"<robot><link>
                 <visual><origin xyz="5 5 5" rpy="0 0 0"/></visual>
                 <collision><origin xyz="0 0 0" rpy="0 0 1.5707963267948966"/>
                   <geometry><mesh filename="a.obj"/></geometry></collision>
               </link></robot>"#,
        )
        .unwrap();

        let xyz = apply_center(&mut urdf, DVec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(xyz.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(xyz.y, -1.0, epsilon = 1e-12);

        let visual = urdf.find(".//visual/origin").unwrap();
        assert_eq!(visual.attr("rpy"), Some("0 0 1.5707963267948966"));
        assert_ne!(visual.attr("xyz"), Some("5 5 5"));
    }

    #[test]
    fn test_invalid_scale_is_reported() {
        let urdf = Element::parse_str(
            r#"<robot><collision><geometry><mesh scale="1 1"/></geometry></collision></robot>"#,
        )
        .unwrap();
        assert!(matches!(
            OriginFrame::from_urdf(&urdf),
            Err(GeometryError::InvalidVector(_))
        ));
    }
}
