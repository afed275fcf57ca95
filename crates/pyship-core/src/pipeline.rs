//! The sequential release: clean, sdist, wheel, publish.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::distribution::build::{build_outcome, build_sdist, build_wheel, prepare_build};
use crate::distribution::clean::{clean_dist_dir, clean_outcome};
use crate::distribution::credentials::{Prompter, TerminalPrompter};
use crate::distribution::plan::lenient_output_dir;
use crate::distribution::publish::publish_dist_dir;
use crate::distribution::{BuildRequest, PublishRequest};
use crate::errors::outcome_from_error;
use crate::{relative_path_str, CommandContext, ExecutionOutcome};

const STEPS: [&str; 4] = ["clean", "sdist", "wheel", "publish"];

#[derive(Clone, Debug, Default)]
pub struct ReleaseRequest {
    /// Stop after the builds.
    pub skip_upload: bool,
    pub dry_run: bool,
    pub registry: Option<String>,
    pub token_env: Option<String>,
    pub no_input: bool,
}

impl ReleaseRequest {
    fn publish_request(&self) -> PublishRequest {
        PublishRequest {
            registry: self.registry.clone(),
            token_env: self.token_env.clone(),
            dry_run: self.dry_run,
            no_input: self.no_input,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StepStatus {
    Ok,
    Failed,
    Skipped,
    NotRun,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct StepReport {
    pub(crate) step: &'static str,
    pub(crate) status: StepStatus,
    pub(crate) message: String,
}

struct Steps(Vec<StepReport>);

impl Steps {
    fn record(&mut self, step: &'static str, status: StepStatus, message: impl Into<String>) {
        let message = message.into();
        match status {
            StepStatus::Failed => warn!(step, %message, "release step failed"),
            _ => info!(step, ?status, %message, "release step"),
        }
        self.0.push(StepReport {
            step,
            status,
            message,
        });
    }

    /// Marks `step` failed and every later step not run.
    fn abort(mut self, step: &'static str, err: &anyhow::Error) -> ExecutionOutcome {
        let cause = outcome_from_error(err);
        self.record(step, StepStatus::Failed, cause.message.clone());
        let done = self.0.len();
        for later in STEPS.iter().copied().skip(done) {
            self.0.push(StepReport {
                step: later,
                status: StepStatus::NotRun,
                message: String::new(),
            });
        }
        let mut details = match cause.details {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        details.insert("failed_step".into(), json!(step));
        details.insert("steps".into(), json!(self.0));
        ExecutionOutcome {
            status: cause.status,
            message: format!("{step} failed: {}", cause.message),
            details: Value::Object(details),
        }
    }
}

/// Runs the full release for the current project.
///
/// Clean never stops the release; the first failing later step does, and the
/// steps after it are reported as not run.
///
/// Without a `pyproject.toml` the clean still runs against the starting
/// directory and the sdist step reports the missing project.
///
/// # Errors
/// Returns an error only when the working directory cannot be read.
pub fn release(ctx: &CommandContext, request: &ReleaseRequest) -> Result<ExecutionOutcome> {
    release_with(ctx, request, &TerminalPrompter)
}

pub(crate) fn release_with(
    ctx: &CommandContext,
    request: &ReleaseRequest,
    prompter: &dyn Prompter,
) -> Result<ExecutionOutcome> {
    let root = ctx.project_root_or_start()?;
    let mut steps = Steps(Vec::with_capacity(STEPS.len()));

    let dist_dir = match lenient_output_dir(ctx, &root, None) {
        Ok(dir) => dir,
        Err(err) => return Ok(steps.abort("clean", &err)),
    };
    let report = clean_dist_dir(ctx.fs(), &dist_dir, &root);
    steps.record(
        "clean",
        StepStatus::Ok,
        clean_outcome(&dist_dir, &root, &report).message,
    );

    let build_request = BuildRequest {
        include_sdist: true,
        include_wheel: true,
        out: None,
        clean: false,
    };
    let prepared = match prepare_build(ctx, &build_request) {
        Ok(prepared) => prepared,
        Err(err) => return Ok(steps.abort("sdist", &err)),
    };
    let sdist = match build_sdist(ctx, &prepared) {
        Ok(path) => path,
        Err(err) => return Ok(steps.abort("sdist", &err)),
    };
    steps.record("sdist", StepStatus::Ok, built_message(&sdist, &root));
    let wheel = match build_wheel(ctx, &prepared) {
        Ok(path) => path,
        Err(err) => return Ok(steps.abort("wheel", &err)),
    };
    steps.record("wheel", StepStatus::Ok, built_message(&wheel, &root));
    let built = build_outcome(&prepared, &[sdist, wheel])?;

    let name = prepared.meta.name.clone();
    let version = prepared.meta.version_str();
    let (message, registry) = if request.skip_upload {
        steps.record("publish", StepStatus::Skipped, "upload skipped");
        (format!("built {name} {version}; upload skipped"), Value::Null)
    } else {
        let publish = publish_dist_dir(
            ctx,
            &prepared.meta,
            &prepared.plan.out_dir,
            &request.publish_request(),
            prompter,
        );
        match publish {
            Ok(outcome) => {
                steps.record("publish", StepStatus::Ok, outcome.message.clone());
                let registry = outcome.details["registry"].clone();
                let message = if request.dry_run {
                    format!("built {name} {version}; {}", outcome.message)
                } else {
                    format!("released {name} {version}; {}", outcome.message)
                };
                (message, registry)
            }
            Err(err) => return Ok(steps.abort("publish", &err)),
        }
    };

    Ok(ExecutionOutcome::success(
        message,
        json!({
            "name": name,
            "version": version,
            "artifacts": built.details["artifacts"],
            "out_dir": built.details["out_dir"],
            "registry": registry,
            "dry_run": request.dry_run,
            "steps": steps.0,
        }),
    ))
}

fn built_message(path: &Path, root: &Path) -> String {
    format!("wrote {}", relative_path_str(path, root))
}
