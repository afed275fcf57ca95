use pyship_domain::MetadataError;
use serde_json::{json, Value};

use crate::context::CommandInfo;
use crate::outcome::{CommandStatus, ExecutionOutcome, UserError};

pub(crate) fn metadata_user_error(err: &MetadataError) -> UserError {
    UserError::new(
        format!("invalid project metadata: {err}"),
        json!({
            "reason": err.reason(),
            "error": err.to_string(),
            "hint": err.hint(),
        }),
    )
}

/// Converts an error escaping a command into an outcome.
///
/// [`UserError`]s keep their message and details; everything else is an
/// internal failure carrying the full error chain.
#[must_use]
pub fn outcome_from_error(err: &anyhow::Error) -> ExecutionOutcome {
    if let Some(user) = err.downcast_ref::<UserError>() {
        return ExecutionOutcome::user_error(user.message().to_string(), user.details().clone());
    }
    if let Some(metadata) = err.downcast_ref::<MetadataError>() {
        return metadata_user_error(metadata).into();
    }
    let issues: Vec<String> = err.chain().map(ToString::to_string).collect();
    ExecutionOutcome::failure(
        err.to_string(),
        json!({
            "reason": "internal_error",
            "error": err.to_string(),
            "issues": issues,
            "hint": "Re-run with `-v` or `--trace` for more detail.",
        }),
    )
}

pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome, _code: i32) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let group_name = info.group.to_string();
    let prefix = if group_name == info.name {
        format!("pyship {}", info.name)
    } else {
        format!("pyship {} {}", group_name, info.name)
    };
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}
