use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::format::SourceKind;

/// List regular files directly inside `dir` whose extension is one of `recognized`.
///
/// Paths are absolute and come back in directory-iteration order. Symlinks and
/// subdirectories are skipped. An empty result means there is nothing to do;
/// only a missing or unreadable directory is an error.
pub fn scan(dir: &Path, recognized: &[SourceKind]) -> Result<Vec<PathBuf>, ScanError> {
    let not_found = |source| ScanError::DirectoryNotFound {
        path: dir.to_path_buf(),
        source,
    };

    let root = fs::canonicalize(dir).map_err(|e| not_found(Some(e)))?;
    if !root.is_dir() {
        return Err(not_found(None));
    }
    // walkdir reports an unreadable root lazily; probe it up front
    fs::read_dir(&root).map_err(|e| not_found(Some(e)))?;

    let files = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(dir = %root.display(), error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| SourceKind::from_path(p).is_some_and(|kind| recognized.contains(&kind)))
        .collect();
    Ok(files)
}

/// [`scan`] with every kind the converter knows about.
pub fn scan_recognized(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    scan(dir, &SourceKind::ALL)
}
