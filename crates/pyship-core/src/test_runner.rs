use anyhow::Result;
use pyship_domain::{discover_packages, PackageLayout, ProjectMetadata, TestOptions};
use serde_json::json;
use tracing::{debug, info};

use crate::distribution::plan::load_project;
use crate::errors::metadata_user_error;
use crate::{CommandContext, ExecutionOutcome, UserError};

#[derive(Clone, Debug, Default)]
pub struct TestRequest {
    /// Extra arguments appended to the `unittest discover` invocation.
    pub args: Vec<String>,
}

/// Runs the project's unittest suite, under coverage when enabled.
///
/// # Errors
/// Returns an error if metadata is invalid or no interpreter can be started.
pub fn test_project(ctx: &CommandContext, request: &TestRequest) -> Result<ExecutionOutcome> {
    let meta = load_project(ctx)?;
    let options = &meta.options.test;
    let runtime = ctx.python_runtime();
    let python = runtime.detect_interpreter(ctx.config().test().python.as_deref())?;
    let layout = discover_packages(&meta.root, &meta.options)
        .map_err(|err| metadata_user_error(&err))?;
    let source = coverage_source(&meta, &layout);
    let envs = test_env(ctx, &meta, &layout);
    debug!(%python, %source, "running tests");

    if options.coverage {
        let check = runtime.run_command(
            &python,
            &["-c".to_string(), "import coverage".to_string()],
            &envs,
            &meta.root,
        )?;
        if check.code != 0 {
            return Err(UserError::new(
                "coverage is not installed for the selected interpreter",
                json!({
                    "reason": "missing_coverage",
                    "python": python,
                    "stderr": check.stderr,
                    "hint": "Install coverage or set [tool.pyship.test] coverage = false.",
                }),
            )
            .into());
        }
    }

    let commands = test_commands(options, &source, &request.args);
    for args in &commands {
        info!(command = %args.join(" "), "running");
        let output = runtime.run_command_passthrough(&python, args, &envs, &meta.root)?;
        if output.code != 0 {
            return Ok(ExecutionOutcome::failure(
                format!("tests failed (exit {})", output.code),
                json!({
                    "code": output.code,
                    "python": python,
                    "command": args,
                }),
            ));
        }
    }
    Ok(ExecutionOutcome::success(
        format!("tests passed for {} {}", meta.name, meta.version_str()),
        json!({
            "python": python,
            "coverage": options.coverage,
            "commands": commands,
        }),
    ))
}

/// Interpreter argument lists for the configured runner.
pub(crate) fn test_commands(
    options: &TestOptions,
    source: &str,
    extra: &[String],
) -> Vec<Vec<String>> {
    let mut discover: Vec<String> = [
        "-m",
        "unittest",
        "discover",
        "-s",
        options.tests.as_str(),
        "-p",
        options.pattern.as_str(),
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    discover.extend(extra.iter().cloned());
    if !options.coverage {
        return vec![discover];
    }
    let mut run: Vec<String> = ["-m", "coverage", "run", "--source", source]
        .iter()
        .map(ToString::to_string)
        .collect();
    run.extend(discover);
    vec![
        run,
        vec!["-m".to_string(), "coverage".to_string(), "report".to_string()],
    ]
}

fn coverage_source(meta: &ProjectMetadata, layout: &PackageLayout) -> String {
    if let Some(source) = meta.options.test.source.as_deref() {
        return source.to_string();
    }
    layout
        .top_level()
        .into_iter()
        .next()
        .unwrap_or_else(|| meta.dist_name())
}

/// Puts `src/` layouts on `PYTHONPATH` ahead of any inherited value.
fn test_env(
    ctx: &CommandContext,
    meta: &ProjectMetadata,
    layout: &PackageLayout,
) -> Vec<(String, String)> {
    if layout.base == meta.root {
        return Vec::new();
    }
    let base = layout.base.display().to_string();
    let separator = if cfg!(windows) { ';' } else { ':' };
    let value = match ctx.env_var("PYTHONPATH") {
        Some(existing) => format!("{base}{separator}{existing}"),
        None => base,
    };
    vec![("PYTHONPATH".to_string(), value)]
}
