//! Recursive mesh discovery

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A mesh file found during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshEntry {
    /// Absolute path of the containing directory
    pub directory: PathBuf,
    /// File name including extension
    pub file_name: String,
    /// Absolute path of the file
    pub path: PathBuf,
}

/// Lazily walk `root` for files whose lowercase name ends with `extension`
/// (e.g. `".obj"`).
///
/// Files ending with `exclude_suffix + extension` are skipped, which keeps
/// decomposed collision meshes out of library builds. Entries come back in
/// filesystem traversal order. Traversal errors are yielded, not swallowed.
pub fn scan_meshes(
    root: impl AsRef<Path>,
    extension: &str,
    exclude_suffix: Option<&str>,
) -> impl Iterator<Item = Result<MeshEntry, ScanError>> {
    let extension = extension.to_lowercase();
    let excluded = exclude_suffix.map(|suffix| format!("{}{}", suffix.to_lowercase(), extension));

    WalkDir::new(root.as_ref())
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(ScanError::Walk(e.to_string()))),
            };
            if entry.file_type().is_dir() {
                return None;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let lower = file_name.to_lowercase();
            if !lower.ends_with(&extension) {
                return None;
            }
            if excluded.as_deref().is_some_and(|ex| lower.ends_with(ex)) {
                return None;
            }

            Some(mesh_entry(entry.path(), file_name))
        })
}

fn mesh_entry(path: &Path, file_name: String) -> Result<MeshEntry, ScanError> {
    let path = std::path::absolute(path)
        .map_err(|e| ScanError::Io(format!("{}: {}", path.display(), e)))?;
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    Ok(MeshEntry {
        directory,
        file_name,
        path,
    })
}

/// Scan-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("Directory walk failed: {0}")]
    Walk(String),
    #[error("IO error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(entries: Vec<MeshEntry>) -> Vec<String> {
        let mut names: Vec<String> = entries.into_iter().map(|e| e.file_name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_scan_filters_extension_and_suffix() {
        let temp = tempdir().unwrap();
        let mug = temp.path().join("mug");
        let bowl = temp.path().join("kitchen").join("bowl");
        fs::create_dir_all(&mug).unwrap();
        fs::create_dir_all(&bowl).unwrap();
        fs::write(mug.join("mug.obj"), "").unwrap();
        fs::write(mug.join("mug_vhacd.obj"), "").unwrap();
        fs::write(mug.join("mug.ovr"), "").unwrap();
        fs::write(bowl.join("Bowl.OBJ"), "").unwrap();
        fs::write(bowl.join("bowl.stl"), "").unwrap();

        let entries: Vec<MeshEntry> = scan_meshes(temp.path(), ".obj", Some("vhacd"))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(names(entries.clone()), vec!["Bowl.OBJ", "mug.obj"]);
        for entry in &entries {
            assert!(entry.path.is_absolute());
            assert_eq!(entry.path.parent().unwrap(), entry.directory);
        }
    }

    #[test]
    fn test_scan_without_exclusion() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.obj"), "").unwrap();
        fs::write(temp.path().join("a_vhacd.obj"), "").unwrap();

        let entries: Vec<MeshEntry> = scan_meshes(temp.path(), ".obj", None)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(names(entries), vec!["a.obj", "a_vhacd.obj"]);
    }

    #[test]
    fn test_scan_missing_root_yields_error() {
        let mut scan = scan_meshes("/nonexistent/objects", ".obj", None);
        assert!(matches!(scan.next(), Some(Err(ScanError::Walk(_)))));
    }
}
