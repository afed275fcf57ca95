use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::relative_path_str;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BuildTargets {
    pub(crate) sdist: bool,
    pub(crate) wheel: bool,
}

impl BuildTargets {
    pub(crate) const BOTH: Self = Self {
        sdist: true,
        wheel: true,
    };

    pub(crate) fn label(self) -> &'static str {
        match (self.sdist, self.wheel) {
            (true, true) => "both",
            (true, false) => "sdist",
            (false, true) => "wheel",
            (false, false) => "none",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ArtifactSummary {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

/// Regular files directly inside `dir`, sorted by name. A missing directory
/// yields nothing.
pub(crate) fn list_dist_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading dir {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn collect_artifact_summaries(dir: &Path, root: &Path) -> Result<Vec<ArtifactSummary>> {
    summarize_selected_artifacts(&list_dist_files(dir)?, root)
}

pub(crate) fn summarize_selected_artifacts(
    paths: &[PathBuf],
    root: &Path,
) -> Result<Vec<ArtifactSummary>> {
    let mut entries = Vec::new();
    for path in paths {
        let bytes = fs::metadata(path)
            .with_context(|| format!("metadata for {}", path.display()))?
            .len();
        let sha256 = compute_file_sha256(path)?;
        entries.push(ArtifactSummary {
            path: relative_path_str(path, root),
            bytes,
            sha256,
        });
    }
    Ok(entries)
}

pub(crate) fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    fn format_scaled(value: u64, unit: u64, suffix: &str) -> String {
        let whole = value / unit;
        let remainder = value % unit;
        let tenths = (remainder * 10) / unit;
        format!("{whole}.{tenths} {suffix}")
    }

    if bytes >= MB {
        format_scaled(bytes, MB, "MB")
    } else if bytes >= KB {
        format_scaled(bytes, KB, "KB")
    } else {
        format!("{bytes} B")
    }
}
