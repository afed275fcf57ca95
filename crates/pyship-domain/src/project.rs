use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::DocumentMut;

use crate::metadata::MetadataError;

pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// Walks up from `start` to the first directory holding a `pyproject.toml`.
pub fn discover_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(PYPROJECT_FILE).is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

pub fn read_pyproject(root: &Path) -> Result<DocumentMut, MetadataError> {
    let path = root.join(PYPROJECT_FILE);
    let contents = fs::read_to_string(&path).map_err(|source| MetadataError::Missing {
        path: path.clone(),
        source,
    })?;
    contents
        .parse::<DocumentMut>()
        .map_err(|err| MetadataError::Invalid {
            path,
            reason: err.to_string(),
        })
}
