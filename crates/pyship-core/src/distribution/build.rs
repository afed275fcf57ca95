use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use pyship_domain::{discover_packages, PackageLayout, ProjectMetadata};
use serde_json::json;
use tracing::info;

use crate::errors::metadata_user_error;
use crate::{relative_path_str, CommandContext, ExecutionOutcome};

use super::artifacts::{format_bytes, summarize_selected_artifacts};
use super::clean::clean_dist_dir;
use super::plan::{load_project, plan_build, BuildPlan, BuildRequest};
use super::sdist::write_sdist;
use super::wheel::write_wheel;

/// Validated inputs shared by the sdist and wheel builders.
pub(crate) struct PreparedBuild {
    pub(crate) meta: ProjectMetadata,
    pub(crate) layout: PackageLayout,
    pub(crate) plan: BuildPlan,
}

impl PreparedBuild {
    pub(crate) fn root(&self) -> &Path {
        &self.meta.root
    }
}

/// Builds the configured project artifacts.
///
/// # Errors
/// Returns an error if metadata is invalid or an archive cannot be written.
pub fn build_project(ctx: &CommandContext, request: &BuildRequest) -> Result<ExecutionOutcome> {
    let prepared = prepare_build(ctx, request)?;
    if request.clean {
        clean_dist_dir(ctx.fs(), &prepared.plan.out_dir, prepared.root());
    }
    let mut produced = Vec::new();
    if prepared.plan.targets.sdist {
        produced.push(build_sdist(ctx, &prepared)?);
    }
    if prepared.plan.targets.wheel {
        produced.push(build_wheel(ctx, &prepared)?);
    }
    build_outcome(&prepared, &produced)
}

pub(crate) fn prepare_build(ctx: &CommandContext, request: &BuildRequest) -> Result<PreparedBuild> {
    let meta = load_project(ctx)?;
    let layout =
        discover_packages(&meta.root, &meta.options).map_err(|err| metadata_user_error(&err))?;
    let plan = plan_build(ctx, &meta, request)?;
    Ok(PreparedBuild { meta, layout, plan })
}

pub(crate) fn build_sdist(ctx: &CommandContext, prepared: &PreparedBuild) -> Result<PathBuf> {
    ensure_out_dir(ctx, &prepared.plan.out_dir)?;
    let mtime = prepared.plan.source_date_epoch.unwrap_or_else(now_epoch);
    let path = write_sdist(&prepared.meta, &prepared.layout, &prepared.plan.out_dir, mtime)?;
    info!(artifact = %path.display(), "built source distribution");
    Ok(path)
}

pub(crate) fn build_wheel(ctx: &CommandContext, prepared: &PreparedBuild) -> Result<PathBuf> {
    ensure_out_dir(ctx, &prepared.plan.out_dir)?;
    let path = write_wheel(
        &prepared.meta,
        &prepared.layout,
        &prepared.plan.out_dir,
        prepared.plan.source_date_epoch,
    )?;
    info!(artifact = %path.display(), "built wheel");
    Ok(path)
}

pub(crate) fn build_outcome(
    prepared: &PreparedBuild,
    produced: &[PathBuf],
) -> Result<ExecutionOutcome> {
    let root = prepared.root();
    let artifacts = summarize_selected_artifacts(produced, root)?;
    let out_dir = relative_path_str(&prepared.plan.out_dir, root);
    let Some(first) = artifacts.first() else {
        return Ok(ExecutionOutcome::user_error(
            "build completed but produced no artifacts",
            json!({ "out_dir": out_dir, "format": prepared.plan.targets.label() }),
        ));
    };
    let sha_short: String = first.sha256.chars().take(12).collect();
    let message = if artifacts.len() == 1 {
        format!(
            "wrote {} ({}, sha256={}…)",
            first.path,
            format_bytes(first.bytes),
            sha_short
        )
    } else {
        format!(
            "wrote {} artifacts to {} ({} {})",
            artifacts.len(),
            out_dir,
            prepared.meta.name,
            prepared.meta.version_str()
        )
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "artifacts": artifacts,
            "out_dir": out_dir,
            "format": prepared.plan.targets.label(),
            "name": prepared.meta.name,
            "version": prepared.meta.version_str(),
        }),
    ))
}

fn ensure_out_dir(ctx: &CommandContext, out_dir: &Path) -> Result<()> {
    ctx.fs()
        .create_dir_all(out_dir)
        .with_context(|| format!("creating output directory at {}", out_dir.display()))
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
