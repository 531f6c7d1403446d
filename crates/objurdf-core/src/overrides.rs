//! Per-object override documents
//!
//! An override file sits next to the mesh (`mug.obj` -> `mug.ovr`). The
//! children of its root are matched by tag against every same-tag element of
//! the generated URDF:
//!
//! ```xml
//! <overrides>
//!   <inertial>
//!     <mass value="0.25"/>
//!   </inertial>
//!   <contact_coefficients mu="0.9"/>
//! </overrides>
//! ```

use std::path::{Path, PathBuf};

use crate::constants::OVERRIDE_EXTENSION;
use crate::xml::{Element, XmlError};

/// Override file location for a mesh
pub fn override_path(mesh_path: &Path) -> PathBuf {
    mesh_path.with_extension(OVERRIDE_EXTENSION)
}

/// Load the override document for a mesh, if one exists
pub fn load_overrides(mesh_path: &Path) -> Result<Option<Element>, XmlError> {
    let path = override_path(mesh_path);
    if !path.exists() {
        return Ok(None);
    }
    tracing::debug!("Using overrides from {}", path.display());
    Element::read_file(&path).map(Some)
}

/// Merge an override document into `urdf`.
///
/// For every top-level override element, each same-tag element of `urdf`
/// gets the override's attributes, loses its first child of each tag the
/// override lists, and then receives copies of the override's children.
/// Returns how many URDF elements were updated.
pub fn apply_overrides(urdf: &mut Element, overrides: &Element) -> usize {
    let mut updated = 0;

    for replacement in &overrides.children {
        let path = format!(".//{}", replacement.name);
        let count = urdf.update_all(&path, |target| merge_element(target, replacement));
        if count == 0 {
            tracing::warn!("Override <{}> matched no element", replacement.name);
        }
        updated += count;
    }

    updated
}

fn merge_element(target: &mut Element, replacement: &Element) {
    for (key, value) in &replacement.attributes {
        target.set_attr(key.as_str(), value.as_str());
    }

    // Remove fields that will be replaced
    for child in &replacement.children {
        target.remove_child(&child.name);
    }

    target.children.extend(replacement.children.iter().cloned());

    if replacement.text.is_some() {
        target.text.clone_from(&replacement.text);
    }
}
