//! Global constants for objurdf-core

/// Default prototype template file name, looked up inside the object folder
pub const DEFAULT_PROTOTYPE: &str = "_prototype.urdf";

/// Default decomposition log file name
pub const DEFAULT_LOG_FILE: &str = "vhacd_log.txt";

/// Suffix marking decomposed collision meshes (`part_vhacd.obj`)
pub const DECOMPOSED_SUFFIX: &str = "vhacd";

/// Extension of per-object override documents
pub const OVERRIDE_EXTENSION: &str = "ovr";

/// Extension of generated robot descriptions
pub const URDF_EXTENSION: &str = "urdf";

/// STL vertex comparison precision (multiply by this, then round to int)
pub const STL_VERTEX_PRECISION: f32 = 10000.0;

/// Enclosed volumes below this are treated as degenerate
pub const MIN_MESH_VOLUME: f64 = 1e-12;

/// Default executable for the command decomposition backend
pub const DEFAULT_VHACD_COMMAND: &str = "TestVHACD";
