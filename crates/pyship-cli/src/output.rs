use atty::Stream;
use color_eyre::Result;
use pyship_core::{CommandGroup, CommandInfo, CommandStatus, ExecutionOutcome};
use serde_json::Value;

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Prints the outcome and returns the process exit code.
pub fn emit_output(
    opts: &OutputOptions,
    info: CommandInfo,
    outcome: &ExecutionOutcome,
) -> Result<i32> {
    let mut code = outcome.status.exit_code();
    if info.group == CommandGroup::Test && outcome.status == CommandStatus::Failure {
        if let Some(exit_code) = outcome
            .details
            .as_object()
            .and_then(|map| map.get("code"))
            .and_then(Value::as_i64)
        {
            code = i32::try_from(exit_code).unwrap_or(code);
        }
    }

    if opts.json {
        let payload = pyship_core::to_json_response(info, outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let message = pyship_core::format_status_message(info, &outcome.message);
    if opts.quiet {
        if outcome.status != CommandStatus::Ok {
            eprintln!("{message}");
        }
        return Ok(code);
    }

    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));
    println!("{}", style.status(outcome.status, &message));
    for line in step_lines(&style, &outcome.details) {
        println!("{line}");
    }
    if outcome.status == CommandStatus::Ok {
        for line in artifact_lines(&outcome.details) {
            println!("{line}");
        }
    } else if let Some(error) = error_detail(&outcome.details, &outcome.message) {
        println!("  Why: {error}");
    }
    if let Some(hint) = hint_from_details(&outcome.details) {
        println!("{}", style.info(&format!("Tip: {hint}")));
    }
    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

/// The underlying error when it adds something beyond the headline.
fn error_detail<'a>(details: &'a Value, message: &str) -> Option<&'a str> {
    let error = details.get("error").and_then(Value::as_str)?;
    (!message.contains(error)).then_some(error)
}

fn step_lines(style: &Style, details: &Value) -> Vec<String> {
    let Some(steps) = details.get("steps").and_then(Value::as_array) else {
        return Vec::new();
    };
    steps
        .iter()
        .filter_map(|step| {
            let name = step.get("step")?.as_str()?;
            let status = step.get("status")?.as_str()?;
            let message = step.get("message").and_then(Value::as_str).unwrap_or("");
            Some(style.step(status, name, message))
        })
        .collect()
}

fn artifact_lines(details: &Value) -> Vec<String> {
    let Some(artifacts) = details.get("artifacts").and_then(Value::as_array) else {
        return Vec::new();
    };
    if artifacts.len() < 2 {
        return Vec::new();
    }
    artifacts
        .iter()
        .filter_map(|artifact| {
            let path = artifact.get("path")?.as_str()?;
            let sha: String = artifact
                .get("sha256")?
                .as_str()?
                .chars()
                .take(12)
                .collect();
            Some(format!("  {path}  sha256={sha}…"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn step_table_renders_every_step() {
        let details = json!({
            "steps": [
                {"step": "clean", "status": "ok", "message": "dist already empty"},
                {"step": "sdist", "status": "failed", "message": "bad version"},
                {"step": "wheel", "status": "not_run", "message": ""},
            ]
        });
        let lines = step_lines(&Style::new(true, false), &details);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("clean") && lines[0].contains("dist already empty"));
        assert!(lines[1].starts_with("  ✖ sdist"));
    }

    #[test]
    fn single_artifacts_are_not_repeated() {
        let one = json!({"artifacts": [{"path": "dist/a.tar.gz", "sha256": "0".repeat(64)}]});
        assert!(artifact_lines(&one).is_empty());
        let two = json!({"artifacts": [
            {"path": "dist/a.tar.gz", "sha256": "a".repeat(64)},
            {"path": "dist/a.whl", "sha256": "b".repeat(64)},
        ]});
        assert_eq!(
            artifact_lines(&two),
            vec![
                format!("  dist/a.tar.gz  sha256={}…", "a".repeat(12)),
                format!("  dist/a.whl  sha256={}…", "b".repeat(12)),
            ]
        );
    }

    #[test]
    fn error_detail_skips_repeats() {
        let details = json!({"error": "boom"});
        assert_eq!(error_detail(&details, "upload failed"), Some("boom"));
        assert_eq!(error_detail(&details, "upload failed: boom"), None);
    }
}
