use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::effects::FileSystem;
use crate::{relative_path_str, CommandContext, ExecutionOutcome};

use super::plan::lenient_output_dir;

#[derive(Clone, Debug, Serialize)]
pub(crate) struct SkippedEntry {
    pub path: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct CleanReport {
    pub removed: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct CleanRequest {
    pub out: Option<PathBuf>,
}

/// Empties the output directory. Never fails on filesystem problems; they are
/// logged and reported as skipped entries.
///
/// # Errors
/// Returns an error only when the project root cannot be located.
pub fn clean_project(ctx: &CommandContext, request: &CleanRequest) -> Result<ExecutionOutcome> {
    let root = ctx.project_root()?;
    let dir = lenient_output_dir(ctx, &root, request.out.as_ref())?;
    let report = clean_dist_dir(ctx.fs(), &dir, &root);
    Ok(clean_outcome(&dir, &root, &report))
}

pub(crate) fn clean_outcome(dir: &Path, root: &Path, report: &CleanReport) -> ExecutionOutcome {
    let shown = relative_path_str(dir, root);
    let message = match (report.removed.len(), report.skipped.len()) {
        (0, 0) => format!("{shown} already empty"),
        (removed, 0) => format!("removed {removed} entries from {shown}"),
        (removed, skipped) => {
            format!("removed {removed} entries from {shown} ({skipped} could not be removed)")
        }
    };
    ExecutionOutcome::success(
        message,
        json!({
            "dist_dir": shown,
            "removed": report.removed,
            "skipped": report.skipped,
        }),
    )
}

pub(crate) fn clean_dist_dir(fs: &dyn FileSystem, dir: &Path, root: &Path) -> CleanReport {
    let mut report = CleanReport::default();
    if !fs.is_dir(dir) {
        debug!(dir = %dir.display(), "output directory missing; nothing to clean");
        return report;
    }
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "could not list output directory");
            report.skipped.push(SkippedEntry {
                path: relative_path_str(dir, root),
                error: format!("{err:#}"),
            });
            return report;
        }
    };
    for entry in entries {
        let result = if fs.is_dir(&entry) {
            fs.remove_dir_all(&entry)
        } else {
            fs.remove_file(&entry)
        };
        let shown = relative_path_str(&entry, root);
        match result {
            Ok(()) => {
                debug!(path = %shown, "removed");
                report.removed.push(shown);
            }
            Err(err) => {
                warn!(path = %shown, error = %err, "could not remove stale artifact");
                report.skipped.push(SkippedEntry {
                    path: shown,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    info!(
        removed = report.removed.len(),
        skipped = report.skipped.len(),
        "cleaned output directory"
    );
    report
}
