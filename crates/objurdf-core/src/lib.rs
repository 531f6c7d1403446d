//! Object library URDF generation
//!
//! This crate turns a folder of meshes into URDF files:
//! - Element: minimal XML tree used to patch the prototype URDF
//! - ObjectUrdfBuilder: per-mesh and per-library URDF generation
//! - CenterMode: reference point moved to the link origin
//! - ConvexDecomposer: collision mesh decomposition backends

pub mod builder;
pub mod constants;
pub mod decompose;
pub mod geometry;
pub mod inertia;
pub mod mesh;
pub mod overrides;
pub mod scan;
pub mod xml;

pub use builder::*;
pub use constants::*;
pub use decompose::*;
pub use geometry::*;
pub use inertia::*;
pub use mesh::*;
pub use overrides::*;
pub use scan::*;
pub use xml::*;
