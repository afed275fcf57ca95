use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use pyship_domain::{ProjectMetadata, ShipOptions, DEFAULT_DIST_DIR};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::DistConfig;
use crate::errors::metadata_user_error;
use crate::{CommandContext, UserError};

use super::artifacts::BuildTargets;

#[derive(Clone, Debug, Default)]
pub struct BuildRequest {
    pub include_sdist: bool,
    pub include_wheel: bool,
    pub out: Option<PathBuf>,
    /// Empty the output directory before building.
    pub clean: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct BuildPlan {
    pub(crate) targets: BuildTargets,
    pub(crate) out_dir: PathBuf,
    pub(crate) source_date_epoch: Option<u64>,
}

pub(crate) fn plan_build(
    ctx: &CommandContext,
    project: &ProjectMetadata,
    request: &BuildRequest,
) -> Result<BuildPlan, UserError> {
    Ok(BuildPlan {
        targets: build_targets_from_request(request),
        out_dir: resolve_output_dir(
            &project.root,
            request.out.as_ref(),
            ctx.config().dist(),
            &project.options,
        )?,
        source_date_epoch: ctx.config().dist().source_date_epoch,
    })
}

pub(crate) fn build_targets_from_request(request: &BuildRequest) -> BuildTargets {
    let targets = BuildTargets {
        sdist: request.include_sdist,
        wheel: request.include_wheel,
    };
    if !targets.sdist && !targets.wheel {
        return BuildTargets::BOTH;
    }
    targets
}

/// Output directory precedence: `--out`, `PYSHIP_DIST_DIR`,
/// `[tool.pyship].dist-dir`, then `dist`. Relative paths hang off the project root.
///
/// The directory is emptied before builds, so the project root and its
/// ancestors are refused.
pub(crate) fn resolve_output_dir(
    root: &Path,
    out: Option<&PathBuf>,
    dist: &DistConfig,
    options: &ShipOptions,
) -> Result<PathBuf, UserError> {
    let selected = out
        .cloned()
        .or_else(|| dist.dir_override.clone())
        .or_else(|| options.dist_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIST_DIR));
    let dir = if selected.is_absolute() {
        selected
    } else {
        root.join(selected)
    };
    if contains_project(&dir, root) {
        return Err(UserError::new(
            format!(
                "output directory {} would contain the project itself",
                dir.display()
            ),
            json!({
                "reason": "invalid_dist_dir",
                "dist_dir": dir.display().to_string(),
                "hint": "Point --out, PYSHIP_DIST_DIR or [tool.pyship].dist-dir at a subdirectory such as dist.",
            }),
        ));
    }
    Ok(dir)
}

fn contains_project(dir: &Path, root: &Path) -> bool {
    if let (Ok(dir), Ok(root)) = (dir.canonicalize(), root.canonicalize()) {
        return root.starts_with(dir);
    }
    normalize_lexically(root).starts_with(normalize_lexically(dir))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Loads and validates project metadata, mapping problems to user errors.
pub(crate) fn load_project(ctx: &CommandContext) -> Result<ProjectMetadata> {
    let root = ctx.project_root()?;
    ProjectMetadata::load(&root).map_err(|err| metadata_user_error(&err).into())
}

/// Output directory under `root` for commands that must work even with
/// broken or missing metadata.
pub(crate) fn lenient_output_dir(
    ctx: &CommandContext,
    root: &Path,
    out: Option<&PathBuf>,
) -> Result<PathBuf> {
    let options = match ProjectMetadata::load(root) {
        Ok(meta) => meta.options,
        Err(err) => {
            debug!(%err, "metadata unavailable; using default output directory");
            ShipOptions::default()
        }
    };
    Ok(resolve_output_dir(root, out, ctx.config().dist(), &options)?)
}

#[derive(Clone, Debug)]
pub struct PublishRequest {
    pub registry: Option<String>,
    pub token_env: Option<String>,
    pub dry_run: bool,
    /// Never prompt for credentials.
    pub no_input: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct PublishRegistry {
    pub(crate) label: String,
    pub(crate) url: String,
}

const PYPI_UPLOAD_URL: &str = "https://upload.pypi.org/legacy/";
const TEST_PYPI_UPLOAD_URL: &str = "https://test.pypi.org/legacy/";

pub(crate) fn resolve_publish_registry(
    selection: Option<&str>,
) -> Result<PublishRegistry, UserError> {
    let trimmed = selection.map(str::trim).filter(|value| !value.is_empty());
    let registry = match trimmed {
        None => PublishRegistry {
            label: "pypi".to_string(),
            url: PYPI_UPLOAD_URL.to_string(),
        },
        Some(value) if value.starts_with("http://") || value.starts_with("https://") => {
            PublishRegistry {
                label: value.to_string(),
                url: value.to_string(),
            }
        }
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "pypi" => PublishRegistry {
                label: "pypi".to_string(),
                url: PYPI_UPLOAD_URL.to_string(),
            },
            "testpypi" | "test-pypi" => PublishRegistry {
                label: value.to_string(),
                url: TEST_PYPI_UPLOAD_URL.to_string(),
            },
            _ => PublishRegistry {
                label: value.to_string(),
                url: format!("https://{value}/legacy/"),
            },
        },
    };
    match Url::parse(&registry.url) {
        Ok(url) if url.host_str().is_some() => Ok(registry),
        Ok(_) | Err(_) => Err(UserError::new(
            format!("invalid registry `{}`", registry.label),
            json!({
                "reason": "invalid_registry",
                "registry": registry.label,
                "hint": "Use pypi, testpypi, a hostname, or a full https:// upload URL.",
            }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn output_dir_precedence() -> anyhow::Result<()> {
        let root = tempdir()?;
        let mut dist = DistConfig {
            dir_override: None,
            source_date_epoch: None,
        };
        let mut options = ShipOptions::default();
        assert_eq!(
            resolve_output_dir(root.path(), None, &dist, &options)?,
            root.path().join("dist")
        );

        options.dist_dir = Some("wheelhouse".into());
        assert_eq!(
            resolve_output_dir(root.path(), None, &dist, &options)?,
            root.path().join("wheelhouse")
        );

        dist.dir_override = Some(PathBuf::from("env-dist"));
        assert_eq!(
            resolve_output_dir(root.path(), None, &dist, &options)?,
            root.path().join("env-dist")
        );

        let abs = root.path().join("abs/dist");
        assert_eq!(
            resolve_output_dir(root.path(), Some(&abs), &dist, &options)?,
            abs
        );
        let rel = PathBuf::from("custom/dist");
        assert_eq!(
            resolve_output_dir(root.path(), Some(&rel), &dist, &options)?,
            root.path().join("custom/dist")
        );
        Ok(())
    }

    #[test]
    fn output_dir_may_not_contain_the_project() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("pycebes");
        std::fs::create_dir_all(&root)?;
        let options = ShipOptions::default();
        for selected in [".", "..", "dist/..", "../..", "./"] {
            let dist = DistConfig {
                dir_override: Some(PathBuf::from(selected)),
                source_date_epoch: None,
            };
            let err = resolve_output_dir(&root, None, &dist, &options)
                .expect_err("project root must be refused");
            assert_eq!(err.details()["reason"], "invalid_dist_dir", "{selected}");
        }
        let absolute = root.clone();
        let dist = DistConfig {
            dir_override: None,
            source_date_epoch: None,
        };
        assert!(resolve_output_dir(&root, Some(&absolute), &dist, &options).is_err());

        let sibling = PathBuf::from("../pycebes-dist");
        assert_eq!(
            resolve_output_dir(&root, Some(&sibling), &dist, &options)?,
            root.join("../pycebes-dist")
        );
        Ok(())
    }

    #[test]
    fn build_targets_default_to_both_when_not_selected() {
        let targets = build_targets_from_request(&BuildRequest::default());
        assert!(targets.sdist, "sdist should be selected by default");
        assert!(targets.wheel, "wheel should be selected by default");

        let sdist_only = build_targets_from_request(&BuildRequest {
            include_sdist: true,
            ..BuildRequest::default()
        });
        assert_eq!(sdist_only.label(), "sdist");
    }

    #[test]
    fn resolve_publish_registry_handles_aliases_and_urls() {
        let default = resolve_publish_registry(None).unwrap();
        assert_eq!(default.label, "pypi");
        assert_eq!(default.url, PYPI_UPLOAD_URL);

        let testpypi = resolve_publish_registry(Some("test-pypi")).unwrap();
        assert_eq!(testpypi.label, "test-pypi");
        assert_eq!(testpypi.url, TEST_PYPI_UPLOAD_URL);

        let host = resolve_publish_registry(Some("packages.example.com")).unwrap();
        assert_eq!(host.url, "https://packages.example.com/legacy/");

        let url = resolve_publish_registry(Some("https://upload.example.invalid/simple/")).unwrap();
        assert_eq!(url.url, "https://upload.example.invalid/simple/");

        let err = resolve_publish_registry(Some("not a host")).expect_err("invalid");
        assert_eq!(err.details()["reason"], "invalid_registry");
    }
}
